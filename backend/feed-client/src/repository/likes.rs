use futures::future::try_join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::clients::{ClientResult, DocumentStore, Query};
use crate::domain::LikeRecord;

pub const LIKES: &str = "likes";

/// Maximum number of values accepted by one `in` filter
const IN_FILTER_LIMIT: usize = 30;

/// Repository for like records. A record keyed `{post}_{user}` exists
/// exactly when the user likes the post.
#[derive(Clone)]
pub struct LikeRepository {
    store: Arc<dyn DocumentStore>,
}

impl LikeRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn exists(&self, post_id: &str, user_id: &str) -> ClientResult<bool> {
        let id = LikeRecord::document_id(post_id, user_id);
        Ok(self.store.get(LIKES, &id).await?.is_some())
    }

    /// Returns true when the record was written, false when it already existed
    pub async fn create(&self, post_id: &str, user_id: &str) -> ClientResult<bool> {
        let id = LikeRecord::document_id(post_id, user_id);
        self.store
            .create(LIKES, &id, LikeRecord::new_document(post_id, user_id))
            .await
    }

    /// Returns true when a record was removed
    pub async fn delete(&self, post_id: &str, user_id: &str) -> ClientResult<bool> {
        let id = LikeRecord::document_id(post_id, user_id);
        self.store.delete(LIKES, &id).await
    }

    /// Batch check which of `post_ids` the user has liked
    pub async fn batch_check_liked(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> ClientResult<HashMap<String, bool>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let queries = post_ids.chunks(IN_FILTER_LIMIT).map(|chunk| {
            let values = chunk.iter().cloned().map(Value::from).collect();
            let query = Query::collection(LIKES)
                .where_eq("userId", user_id)
                .where_in("postId", values);
            async move { self.store.query(&query).await }
        });
        let results = try_join_all(queries).await?;

        let liked: HashSet<String> = results
            .into_iter()
            .flatten()
            .filter_map(|doc| doc.data.get("postId").and_then(Value::as_str).map(String::from))
            .collect();

        Ok(post_ids
            .iter()
            .map(|id| (id.clone(), liked.contains(id)))
            .collect())
    }
}

use std::sync::Arc;

use crate::clients::{ClientError, ClientResult, Direction, DocumentStore, Query};
use crate::domain::{AuthorSnapshot, Comment};

/// Repository for comments, stored under each post
#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn DocumentStore>,
}

fn collection(post_id: &str) -> String {
    format!("posts/{}/comments", post_id)
}

impl CommentRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn add(
        &self,
        post_id: &str,
        author: &AuthorSnapshot,
        text: &str,
    ) -> ClientResult<Comment> {
        let path = collection(post_id);
        let doc = self
            .store
            .add(&path, Comment::new_document(author, text))
            .await?;

        Comment::from_document(post_id, &doc.id, &doc.data)
            .ok_or_else(|| ClientError::Malformed(format!("{}/{}", path, doc.id)))
    }

    /// All comments of a post, oldest first
    pub async fn list(&self, post_id: &str) -> ClientResult<Vec<Comment>> {
        let query = Query::collection(collection(post_id)).order_by("createdAt", Direction::Ascending);
        let docs = self.store.query(&query).await?;

        Ok(docs
            .iter()
            .filter_map(|doc| Comment::from_document(post_id, &doc.id, &doc.data))
            .collect())
    }
}

use std::sync::Arc;
use tracing::warn;

use crate::clients::{ClientError, ClientResult, Direction, DocumentStore, Query};
use crate::domain::{AuthorSnapshot, FeedCursor, FeedPage, Post, PostDocument};
use crate::domain::models::parse_like_count;

pub const POSTS: &str = "posts";
const CREATED_AT: &str = "createdAt";
const AUTHOR_ID: &str = "authorId";
const LIKES: &str = "likes";

/// Repository for post documents
#[derive(Clone)]
pub struct PostRepository {
    store: Arc<dyn DocumentStore>,
}

impl PostRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch one page of the global feed, newest first
    pub async fn list_page(
        &self,
        cursor: Option<&FeedCursor>,
        page_size: usize,
    ) -> ClientResult<FeedPage> {
        self.page(Query::collection(POSTS), cursor, page_size).await
    }

    /// Fetch one page of posts written by `author_id`, newest first
    pub async fn list_by_author(
        &self,
        author_id: &str,
        cursor: Option<&FeedCursor>,
        page_size: usize,
    ) -> ClientResult<FeedPage> {
        let base = Query::collection(POSTS).where_eq(AUTHOR_ID, author_id);
        self.page(base, cursor, page_size).await
    }

    /// Asks for one post more than the page holds: a cursor is only handed
    /// out when that extra post exists.
    async fn page(
        &self,
        base: Query,
        cursor: Option<&FeedCursor>,
        page_size: usize,
    ) -> ClientResult<FeedPage> {
        let page_size = page_size.max(1);
        let mut query = base
            .order_by(CREATED_AT, Direction::Descending)
            .limit(page_size + 1);
        if let Some(cursor) = cursor {
            query = query.start_after(cursor.post_id.clone(), cursor.created_at_micros);
        }

        let docs = self.store.query(&query).await?;
        let has_more = docs.len() > page_size;

        let posts: Vec<Post> = docs
            .iter()
            .take(page_size)
            .filter_map(|doc| {
                let post = Post::from_document(&doc.id, &doc.data);
                if post.is_none() {
                    warn!(post_id = %doc.id, "Skipping post document without a valid timestamp");
                }
                post
            })
            .collect();

        // Anchored on the last stored document of the window, which may be
        // one that was skipped above
        let next_cursor = if has_more {
            docs.iter().take(page_size).last().map(|doc| {
                FeedCursor::new(
                    doc.data[CREATED_AT].as_i64().unwrap_or_default(),
                    doc.id.clone(),
                )
            })
        } else {
            None
        };

        Ok(FeedPage { posts, next_cursor })
    }

    pub async fn get(&self, post_id: &str) -> ClientResult<Option<Post>> {
        let doc = self.store.get(POSTS, post_id).await?;
        Ok(doc.and_then(|doc| Post::from_document(&doc.id, &doc.data)))
    }

    pub async fn exists(&self, post_id: &str) -> ClientResult<bool> {
        Ok(self.store.get(POSTS, post_id).await?.is_some())
    }

    pub async fn create(
        &self,
        author: &AuthorSnapshot,
        content: &str,
        image_urls: &[String],
    ) -> ClientResult<Post> {
        let doc = self
            .store
            .add(POSTS, PostDocument::new_post(author, content, image_urls))
            .await?;

        Post::from_document(&doc.id, &doc.data)
            .ok_or_else(|| ClientError::Malformed(format!("{}/{}", POSTS, doc.id)))
    }

    /// Stored like counter, read as zero when missing or negative
    pub async fn like_count(&self, post_id: &str) -> ClientResult<u64> {
        let doc = self
            .store
            .get(POSTS, post_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("{}/{}", POSTS, post_id)))?;
        Ok(parse_like_count(doc.data.get(LIKES)))
    }

    pub async fn increment_likes(&self, post_id: &str) -> ClientResult<u64> {
        let count = self.store.increment(POSTS, post_id, LIKES, 1).await?;
        Ok(count.max(0) as u64)
    }

    /// Decrement the like counter, never below zero
    pub async fn decrement_likes(&self, post_id: &str) -> ClientResult<u64> {
        let current = self.like_count(post_id).await?;

        if current > 0 {
            let count = self.store.increment(POSTS, post_id, LIKES, -1).await?;
            Ok(count.max(0) as u64)
        } else {
            Ok(0)
        }
    }
}

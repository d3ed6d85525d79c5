use tracing::info;

use crate::domain::{AuthUser, Comment};
use crate::error::{FeedError, FeedResult};
use crate::repository::{CommentRepository, PostRepository};

#[derive(Clone)]
pub struct CommentService {
    comments: CommentRepository,
    posts: PostRepository,
}

impl CommentService {
    pub fn new(comments: CommentRepository, posts: PostRepository) -> Self {
        Self { comments, posts }
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        user: Option<&AuthUser>,
        text: &str,
    ) -> FeedResult<Comment> {
        let user = user.ok_or(FeedError::Unauthenticated)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedError::InvalidInput("Comment cannot be empty".to_string()));
        }
        if !self.posts.exists(post_id).await? {
            return Err(FeedError::NotFound(format!("Post {}", post_id)));
        }

        let comment = self
            .comments
            .add(post_id, &user.author_snapshot(), text)
            .await?;
        info!(post_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Oldest first
    pub async fn list_comments(&self, post_id: &str) -> FeedResult<Vec<Comment>> {
        Ok(self.comments.list(post_id).await?)
    }
}

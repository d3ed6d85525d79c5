use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{MediaClient, UploadRequest};
use crate::domain::{AuthUser, ImageSource, Post};
use crate::error::{FeedError, FeedResult};
use crate::repository::PostRepository;
use crate::services::feed::FeedStore;

/// Creates posts: uploads the images, writes the post, puts it on top of the feed
#[derive(Clone)]
pub struct PostComposer {
    posts: PostRepository,
    media: Arc<dyn MediaClient>,
    feed: FeedStore,
    upload_folder: String,
}

impl PostComposer {
    pub fn new(
        posts: PostRepository,
        media: Arc<dyn MediaClient>,
        feed: FeedStore,
        upload_folder: impl Into<String>,
    ) -> Self {
        Self {
            posts,
            media,
            feed,
            upload_folder: upload_folder.into(),
        }
    }

    pub async fn submit(
        &self,
        user: Option<&AuthUser>,
        caption: &str,
        images: Vec<ImageSource>,
    ) -> FeedResult<Post> {
        let user = user.ok_or(FeedError::Unauthenticated)?;

        let images: Vec<ImageSource> = images.into_iter().filter(ImageSource::is_valid).collect();
        if images.is_empty() {
            return Err(FeedError::InvalidInput(
                "Please add at least one image".to_string(),
            ));
        }

        let image_urls = upload_all(self.media.as_ref(), &self.upload_folder, images).await?;

        let post = self
            .posts
            .create(&user.author_snapshot(), caption.trim(), &image_urls)
            .await?;
        self.feed.prepend(post.clone());

        info!(post_id = %post.id, author_id = %user.uid, images = image_urls.len(), "Post created");
        Ok(post)
    }
}

/// Upload images concurrently, keeping their order. Fails as a whole when
/// any single upload fails.
///
/// Object names are `{folder}/{millis}_{id}_{file name}` with a fresh id per
/// image, so images sharing a file name never overwrite each other.
pub(crate) async fn upload_all(
    media: &dyn MediaClient,
    folder: &str,
    images: Vec<ImageSource>,
) -> FeedResult<Vec<String>> {
    let millis = Utc::now().timestamp_millis();
    let uploads = images.into_iter().map(|source| {
        let request = UploadRequest {
            object_name: format!(
                "{}/{}_{}_{}",
                folder,
                millis,
                Uuid::new_v4().simple(),
                source.file_name()
            ),
            source,
        };
        media.upload(request)
    });

    try_join_all(uploads).await.map_err(|err| {
        warn!(error = %err, "Image upload failed");
        FeedError::from(err)
    })
}

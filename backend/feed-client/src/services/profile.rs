use futures::future::OptionFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::MediaClient;
use crate::domain::{AuthUser, FeedCursor, FeedPage, ImageSource, ProfileUpdate, UserProfile};
use crate::error::{FeedError, FeedResult};
use crate::repository::ProfileRepository;
use crate::services::composer::upload_all;
use crate::services::feed::FeedStore;
use crate::services::session::SessionContext;

const PROFILE_FOLDER: &str = "profiles";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Loads and saves the signed-in user's profile
#[derive(Clone)]
pub struct ProfileEditor {
    profiles: ProfileRepository,
    media: Arc<dyn MediaClient>,
    session: SessionContext,
    feed: FeedStore,
}

impl ProfileEditor {
    pub fn new(
        profiles: ProfileRepository,
        media: Arc<dyn MediaClient>,
        session: SessionContext,
        feed: FeedStore,
    ) -> Self {
        Self {
            profiles,
            media,
            session,
            feed,
        }
    }

    /// Stored profile, or one derived from the session user before the first save
    pub async fn load(&self, user: &AuthUser) -> FeedResult<UserProfile> {
        Ok(self
            .profiles
            .get(user)
            .await?
            .unwrap_or_else(|| UserProfile::from_session(user)))
    }

    /// Posts shown on a profile page
    pub async fn posts(
        &self,
        user_id: &str,
        cursor: Option<&FeedCursor>,
    ) -> FeedResult<FeedPage> {
        self.feed
            .posts_by_author(user_id, cursor, self.feed.page_size())
            .await
    }

    pub async fn save(&self, user: Option<&AuthUser>, update: ProfileUpdate) -> FeedResult<UserProfile> {
        let user = user.ok_or(FeedError::Unauthenticated)?;
        let current = self.load(user).await?;

        let display_name = non_blank(update.display_name).unwrap_or(current.display_name.clone());
        let bio = non_blank(update.bio);
        let folder = format!("{}/{}", PROFILE_FOLDER, user.uid);

        // Uploads complete before any profile write
        let photo: OptionFuture<_> = update
            .photo
            .filter(ImageSource::is_valid)
            .map(|image| upload_all(self.media.as_ref(), &folder, vec![image]))
            .into();
        let cover: OptionFuture<_> = update
            .cover_photo
            .filter(ImageSource::is_valid)
            .map(|image| upload_all(self.media.as_ref(), &folder, vec![image]))
            .into();
        let (photo, cover) = futures::join!(photo, cover);
        let photo_url = photo.transpose()?.and_then(|urls| urls.into_iter().next());
        let cover_url = cover.transpose()?.and_then(|urls| urls.into_iter().next());

        let previous = self.profiles.get_raw(&user.uid).await?;

        let mut fields = Map::new();
        fields.insert("displayName".to_string(), Value::from(display_name.clone()));
        if let Some(bio) = &bio {
            fields.insert("bio".to_string(), Value::from(bio.clone()));
        }
        if let Some(url) = &photo_url {
            fields.insert("photoURL".to_string(), Value::from(url.clone()));
        }
        if let Some(url) = &cover_url {
            fields.insert("coverPhotoURL".to_string(), Value::from(url.clone()));
        }
        self.profiles.upsert(&user.uid, fields).await?;

        if user.display_name.as_deref() != Some(display_name.as_str()) {
            if let Err(err) = self.session.update_display_name(&display_name).await {
                warn!(uid = %user.uid, error = %err, "Identity update failed, restoring profile");
                if let Err(restore_err) = self.profiles.restore(&user.uid, previous).await {
                    warn!(uid = %user.uid, error = %restore_err, "Failed to restore profile");
                }
                return Err(err);
            }
        }

        let mut updated_user = user.clone();
        updated_user.display_name = Some(display_name);
        if photo_url.is_some() {
            updated_user.photo_url = photo_url;
        }
        self.session.replace_user(updated_user.clone());
        self.feed.apply_author_profile(&updated_user.author_snapshot());

        let profile = self.load(&updated_user).await?;
        info!(uid = %user.uid, "Profile saved");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{MemoryDocumentStore, MemoryIdentity, MemoryMediaClient};
    use crate::clients::{ClientError, DocumentStore};
    use crate::repository::{LikeRepository, PostRepository};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        identity: Arc<MemoryIdentity>,
        media: Arc<MemoryMediaClient>,
        session: SessionContext,
        feed: FeedStore,
        editor: ProfileEditor,
    }

    fn fixture() -> Fixture {
        let mut account = AuthUser::new("u1");
        account.display_name = Some("Ada".into());

        let store = Arc::new(MemoryDocumentStore::new());
        let identity = Arc::new(MemoryIdentity::signed_in(account));
        let media = Arc::new(MemoryMediaClient::new("https://media.test"));
        let session = SessionContext::new(identity.clone(), "/placeholder-avatar.png");
        session.start();

        let dyn_store: Arc<dyn DocumentStore> = store.clone();
        let feed = FeedStore::new(
            PostRepository::new(dyn_store.clone()),
            LikeRepository::new(dyn_store.clone()),
            20,
        );
        feed.set_viewer(session.current_user());
        let editor = ProfileEditor::new(
            ProfileRepository::new(dyn_store),
            media.clone(),
            session.clone(),
            feed.clone(),
        );
        Fixture {
            store,
            identity,
            media,
            session,
            feed,
            editor,
        }
    }

    #[tokio::test]
    async fn test_load_without_document_uses_session() {
        let f = fixture();
        let user = f.session.current_user().unwrap();
        let profile = f.editor.load(&user).await.unwrap();
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.bio, "");
        assert!(profile.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_save_renames_everywhere() {
        let f = fixture();
        f.store.seed(
            "posts",
            "p1",
            json!({ "authorId": "u1", "authorName": "Ada", "createdAt": 1_700_000_000_000_000i64 }),
        );
        f.feed.refresh().await.unwrap();

        let user = f.session.current_user().unwrap();
        let update = ProfileUpdate {
            display_name: Some(" Ada L. ".into()),
            bio: Some("   ".into()),
            photo: Some(ImageSource::File {
                name: "me.png".into(),
                bytes: vec![1],
            }),
            cover_photo: None,
        };
        let profile = f.editor.save(Some(&user), update).await.unwrap();

        assert_eq!(profile.display_name, "Ada L.");
        assert_eq!(profile.bio, "");
        assert!(profile.photo_url.unwrap().contains("/profiles/u1/"));
        assert!(profile.updated_at.is_some());
        assert_eq!(
            f.identity.current_user().unwrap().display_name.as_deref(),
            Some("Ada L.")
        );
        assert_eq!(
            f.session.current_user().unwrap().display_name.as_deref(),
            Some("Ada L.")
        );
        assert_eq!(f.feed.get("p1").unwrap().post.author_name, "Ada L.");
    }

    #[tokio::test]
    async fn test_rejected_photo_leaves_profile_untouched() {
        let f = fixture();
        let user = f.session.current_user().unwrap();
        f.media.reject_next(413);

        let update = ProfileUpdate {
            display_name: Some("Other".into()),
            photo: Some(ImageSource::Url("https://x.test/huge.png".into())),
            ..Default::default()
        };
        assert!(matches!(
            f.editor.save(Some(&user), update).await,
            Err(FeedError::Upload(_))
        ));
        assert!(f.store.document("users", "u1").is_none());
        assert_eq!(
            f.identity.current_user().unwrap().display_name.as_deref(),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn test_identity_failure_restores_previous_document() {
        let f = fixture();
        f.store.seed("users", "u1", json!({ "displayName": "Ada", "bio": "before" }));
        f.identity
            .fail_next_profile_update(ClientError::Unavailable("offline".into()));

        let user = f.session.current_user().unwrap();
        let update = ProfileUpdate {
            display_name: Some("Renamed".into()),
            bio: Some("after".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.editor.save(Some(&user), update).await,
            Err(FeedError::Network(_))
        ));
        assert_eq!(
            f.store.document("users", "u1").unwrap(),
            json!({ "displayName": "Ada", "bio": "before" })
        );
        assert_eq!(
            f.session.current_user().unwrap().display_name.as_deref(),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn test_photo_and_cover_with_one_file_name_stay_distinct() {
        let f = fixture();
        let user = f.session.current_user().unwrap();
        let picked = || ImageSource::File {
            name: "image.jpg".into(),
            bytes: vec![1],
        };
        let update = ProfileUpdate {
            photo: Some(picked()),
            cover_photo: Some(picked()),
            ..Default::default()
        };

        let profile = f.editor.save(Some(&user), update).await.unwrap();
        let photo = profile.photo_url.unwrap();
        let cover = profile.cover_photo_url.unwrap();
        assert_ne!(photo, cover);
        assert!(cover.contains("/profiles/u1/"));
    }
}

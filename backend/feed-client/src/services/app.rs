use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clients::{DocumentStore, IdentityClient, MediaClient};
use crate::config::Config;
use crate::repository::{CommentRepository, LikeRepository, PostRepository, ProfileRepository};
use crate::services::comments::CommentService;
use crate::services::composer::PostComposer;
use crate::services::feed::FeedStore;
use crate::services::likes::LikeCoordinator;
use crate::services::navigation::{Navigator, Route};
use crate::services::profile::ProfileEditor;
use crate::services::session::{AuthState, SessionContext};

/// External services the app talks to
#[derive(Clone)]
pub struct Clients {
    pub identity: Arc<dyn IdentityClient>,
    pub store: Arc<dyn DocumentStore>,
    pub media: Arc<dyn MediaClient>,
}

/// Every service of one app instance, wired to the same session and feed cache
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub session: SessionContext,
    pub feed: FeedStore,
    pub likes: LikeCoordinator,
    pub composer: PostComposer,
    pub profile: ProfileEditor,
    pub comments: CommentService,
}

impl AppContext {
    pub fn new(config: Config, clients: Clients) -> Self {
        let posts = PostRepository::new(clients.store.clone());
        let likes = LikeRepository::new(clients.store.clone());
        let profiles = ProfileRepository::new(clients.store.clone());
        let comments = CommentRepository::new(clients.store.clone());

        let session = SessionContext::new(
            clients.identity.clone(),
            config.app.placeholder_avatar_url.clone(),
        );
        let feed = FeedStore::new(posts.clone(), likes.clone(), config.feed.page_size);

        Self {
            likes: LikeCoordinator::new(likes, posts.clone(), feed.clone()),
            composer: PostComposer::new(
                posts.clone(),
                clients.media.clone(),
                feed.clone(),
                config.media.upload_folder.clone(),
            ),
            profile: ProfileEditor::new(profiles, clients.media, session.clone(), feed.clone()),
            comments: CommentService::new(comments, posts),
            session,
            feed,
            config,
        }
    }

    /// Subscribe to the identity service and keep the feed's viewer in step
    /// with the session. The returned task ends after `stop`.
    pub fn start(&self) -> JoinHandle<()> {
        self.session.start();
        self.apply_auth_state(&self.session.state());
        self.follow_session()
    }

    pub fn stop(&self) {
        self.session.stop();
    }

    pub fn navigator(&self, initial: Route) -> Navigator {
        Navigator::new(&self.session, initial)
    }

    pub fn apply_auth_state(&self, state: &AuthState) {
        apply_to_feed(&self.feed, state);
    }

    fn follow_session(&self) -> JoinHandle<()> {
        let mut rx = self.session.watch();
        let feed = self.feed.clone();
        let stopped = self.session.stopped();
        tokio::spawn(async move {
            tokio::pin!(stopped);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow_and_update().clone();
                        apply_to_feed(&feed, &state);
                    }
                }
            }
            info!("Session closed");
        })
    }
}

fn apply_to_feed(feed: &FeedStore, state: &AuthState) {
    match state {
        AuthState::Unknown => {}
        AuthState::Authenticated(user) => feed.set_viewer(Some(user.clone())),
        AuthState::Unauthenticated => feed.set_viewer(None),
    }
}

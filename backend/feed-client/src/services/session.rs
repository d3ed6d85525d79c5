/// Auth session context
///
/// Holds the session state derived from the identity service's change
/// notifications and hands it to whoever needs it. One context is created
/// per app instance and passed explicitly.
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clients::{ClientError, IdentityClient, Subscription};
use crate::domain::AuthUser;
use crate::error::{FeedError, FeedResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Session check has not completed yet
    #[default]
    Unknown,
    Authenticated(AuthUser),
    Unauthenticated,
}

impl AuthState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthState::Unknown)
    }
}

#[derive(Clone)]
pub struct SessionContext {
    identity: Arc<dyn IdentityClient>,
    state: Arc<watch::Sender<AuthState>>,
    placeholder_avatar: String,
    subscription: Arc<Mutex<Option<Subscription>>>,
    /// True between `start` and `stop`
    running: Arc<watch::Sender<bool>>,
}

/// Apply a notification; unchanged states are not re-broadcast
fn publish(state: &watch::Sender<AuthState>, next: AuthState) -> bool {
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    })
}

impl SessionContext {
    pub fn new(identity: Arc<dyn IdentityClient>, placeholder_avatar: impl Into<String>) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self {
            identity,
            state: Arc::new(state),
            placeholder_avatar: placeholder_avatar.into(),
            subscription: Arc::new(Mutex::new(None)),
            running: Arc::new(watch::channel(false).0),
        }
    }

    /// Subscribe to the identity service. Calling it again is a no-op.
    pub fn start(&self) {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return;
        }

        let state = self.state.clone();
        let placeholder = self.placeholder_avatar.clone();
        *subscription = Some(self.identity.subscribe(Box::new(move |user| {
            let next = match user {
                Some(user) => AuthState::Authenticated(user.with_placeholder_photo(&placeholder)),
                None => AuthState::Unauthenticated,
            };
            if publish(&state, next) {
                info!(
                    authenticated = state.borrow().user().is_some(),
                    "Auth state changed"
                );
            }
        })));
        self.running.send_replace(true);
    }

    /// Stop listening for identity changes
    pub fn stop(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.running.send_replace(false);
    }

    /// Resolves once the session is not listening for identity changes
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut running = self.running.subscribe();
        async move {
            let _ = running.wait_for(|running| !*running).await;
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait until the session check has completed
    pub async fn resolved(&self) -> AuthState {
        let mut rx = self.watch();
        let resolved = rx
            .wait_for(AuthState::is_resolved)
            .await
            .map(|state| state.clone());
        resolved.unwrap_or_else(|_| self.state())
    }

    pub async fn sign_in(&self) -> FeedResult<AuthUser> {
        let user = self.identity.sign_in().await.map_err(|err| match err {
            ClientError::Cancelled => FeedError::Cancelled,
            other => FeedError::Network(other.to_string()),
        })?;

        let user = user.with_placeholder_photo(&self.placeholder_avatar);
        publish(&self.state, AuthState::Authenticated(user.clone()));
        info!(uid = %user.uid, "Signed in");
        Ok(user)
    }

    pub async fn sign_out(&self) -> FeedResult<()> {
        self.identity
            .sign_out()
            .await
            .map_err(|err| FeedError::Network(err.to_string()))?;
        publish(&self.state, AuthState::Unauthenticated);
        info!("Signed out");
        Ok(())
    }

    /// Push a new display name to the identity service
    pub async fn update_display_name(&self, display_name: &str) -> FeedResult<()> {
        Ok(self.identity.update_display_name(display_name).await?)
    }

    /// Replace the signed-in user after a profile edit. Ignored when the
    /// session has moved on to another user.
    pub fn replace_user(&self, user: AuthUser) {
        let user = user.with_placeholder_photo(&self.placeholder_avatar);
        let replaced = self.state.send_if_modified(|current| match current {
            AuthState::Authenticated(existing) if existing.uid == user.uid => {
                if *existing == user {
                    false
                } else {
                    *existing = user.clone();
                    true
                }
            }
            _ => false,
        });
        if !replaced {
            warn!(uid = %user.uid, "Session user not replaced");
        }
    }
}

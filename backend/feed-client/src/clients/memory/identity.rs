use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::clients::{AuthListener, ClientError, ClientResult, IdentityClient, Subscription};
use crate::domain::AuthUser;

type SharedListener = Arc<dyn Fn(Option<AuthUser>) + Send + Sync>;

struct IdentityState {
    /// Account returned by `sign_in`
    account: AuthUser,
    current: Option<AuthUser>,
    /// False until the session check has completed
    resolved: bool,
    listeners: HashMap<u64, SharedListener>,
    next_listener_id: u64,
    sign_in_faults: VecDeque<ClientError>,
    profile_faults: VecDeque<ClientError>,
}

/// In-process identity service holding a single account
#[derive(Clone)]
pub struct MemoryIdentity {
    state: Arc<Mutex<IdentityState>>,
}

impl MemoryIdentity {
    fn build(account: AuthUser, current: Option<AuthUser>, resolved: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(IdentityState {
                account,
                current,
                resolved,
                listeners: HashMap::new(),
                next_listener_id: 0,
                sign_in_faults: VecDeque::new(),
                profile_faults: VecDeque::new(),
            })),
        }
    }

    /// Resolved session, signed out
    pub fn new(account: AuthUser) -> Self {
        Self::build(account, None, true)
    }

    /// Resolved session, already signed in as `account`
    pub fn signed_in(account: AuthUser) -> Self {
        Self::build(account.clone(), Some(account), true)
    }

    /// Session check still in flight; listeners hear nothing until
    /// `resolve_session` is called.
    pub fn deferred(account: AuthUser) -> Self {
        Self::build(account, None, false)
    }

    pub fn resolve_session(&self, signed_in: bool) {
        let mut state = self.state.lock();
        let current = signed_in.then(|| state.account.clone());
        state.resolved = true;
        state.current = current;
        Self::notify(state);
    }

    /// Session changed outside this client (expiry, another tab)
    pub fn set_external_user(&self, user: Option<AuthUser>) {
        let mut state = self.state.lock();
        state.resolved = true;
        if let Some(user) = &user {
            state.account = user.clone();
        }
        state.current = user;
        Self::notify(state);
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.lock().current.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn fail_next_sign_in(&self, err: ClientError) {
        self.state.lock().sign_in_faults.push_back(err);
    }

    pub fn fail_next_profile_update(&self, err: ClientError) {
        self.state.lock().profile_faults.push_back(err);
    }

    /// Deliver the current user to every listener. Listeners run after the
    /// lock is released so they may call back into the client.
    fn notify(state: parking_lot::MutexGuard<'_, IdentityState>) {
        if !state.resolved {
            return;
        }
        let user = state.current.clone();
        let listeners: Vec<SharedListener> = state.listeners.values().cloned().collect();
        drop(state);

        debug!(
            signed_in = user.is_some(),
            listeners = listeners.len(),
            "Auth state notification"
        );
        for listener in listeners {
            listener(user.clone());
        }
    }
}

#[async_trait]
impl IdentityClient for MemoryIdentity {
    fn subscribe(&self, listener: AuthListener) -> Subscription {
        let listener: SharedListener = Arc::from(listener);

        let (id, initial) = {
            let mut state = self.state.lock();
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.insert(id, listener.clone());
            (id, state.resolved.then(|| state.current.clone()))
        };

        if let Some(user) = initial {
            listener(user);
        }

        let weak: Weak<Mutex<IdentityState>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().listeners.remove(&id);
            }
        })
    }

    async fn sign_in(&self) -> ClientResult<AuthUser> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        if let Some(err) = state.sign_in_faults.pop_front() {
            return Err(err);
        }
        let user = state.account.clone();
        state.resolved = true;
        state.current = Some(user.clone());
        Self::notify(state);
        Ok(user)
    }

    async fn sign_out(&self) -> ClientResult<()> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        state.resolved = true;
        state.current = None;
        Self::notify(state);
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> ClientResult<()> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        if let Some(err) = state.profile_faults.pop_front() {
            return Err(err);
        }
        let current = state
            .current
            .as_mut()
            .ok_or_else(|| ClientError::NotFound("signed-in user".to_string()))?;
        current.display_name = Some(display_name.to_string());
        state.account.display_name = Some(display_name.to_string());
        Ok(())
    }
}

/// Auth-gated navigation
///
/// Protected routes show a blocking loader while the session is `Unknown`
/// and navigation is refused. Losing the session while a protected route is
/// mounted redirects to the login route. Signing in never navigates by
/// itself.
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::services::session::{AuthState, SessionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    Login,
    Feed,
    Profile,
    CreatePost,
}

impl Route {
    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Feed => "/",
            Route::Profile => "/profile",
            Route::CreatePost => "/create",
        }
    }
}

/// What the current route renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    Page(Route),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Session is still being resolved")]
    SessionPending,

    #[error("No previous route")]
    NoHistory,
}

pub struct Navigator {
    auth: watch::Receiver<AuthState>,
    current: Route,
    history: Vec<Route>,
}

impl Navigator {
    pub fn new(session: &SessionContext, initial: Route) -> Self {
        let mut navigator = Self {
            auth: session.watch(),
            current: initial,
            history: Vec::new(),
        };
        navigator.on_auth_change();
        navigator
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn view(&self) -> View {
        match &*self.auth.borrow() {
            AuthState::Unknown if self.current.is_protected() => View::Loading,
            _ => View::Page(self.current),
        }
    }

    /// Go to `route`. Protected routes land on login without a session.
    pub fn navigate(&mut self, route: Route) -> Result<Route, NavigationError> {
        let target = match &*self.auth.borrow() {
            AuthState::Unknown => return Err(NavigationError::SessionPending),
            AuthState::Unauthenticated if route.is_protected() => Route::Login,
            _ => route,
        };

        if target != self.current {
            self.history.push(self.current);
            self.current = target;
        }
        debug!(route = target.path(), "Navigated");
        Ok(target)
    }

    pub fn back(&mut self) -> Result<Route, NavigationError> {
        if !self.auth.borrow().is_resolved() {
            return Err(NavigationError::SessionPending);
        }
        let previous = self.history.pop().ok_or(NavigationError::NoHistory)?;
        self.current = previous;
        // The previous route may need a session that is gone
        self.on_auth_change();
        Ok(self.current)
    }

    /// Re-evaluate the mounted route against the latest session state.
    /// Returns the route redirected to, if any.
    pub fn on_auth_change(&mut self) -> Option<Route> {
        let redirect = matches!(*self.auth.borrow_and_update(), AuthState::Unauthenticated)
            && self.current.is_protected();
        if !redirect {
            return None;
        }

        info!(from = self.current.path(), "Session lost, redirecting to login");
        self.history.clear();
        self.current = Route::Login;
        Some(Route::Login)
    }

    /// Wait for the next session change and apply it. `None` when it
    /// caused no redirect or the session context is gone.
    pub async fn changed(&mut self) -> Option<Route> {
        self.auth.changed().await.ok()?;
        self.on_auth_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::MemoryIdentity;
    use crate::domain::AuthUser;
    use std::sync::Arc;

    fn session(identity: &Arc<MemoryIdentity>) -> SessionContext {
        let session = SessionContext::new(identity.clone(), "/placeholder-avatar.png");
        session.start();
        session
    }

    #[tokio::test]
    async fn test_unknown_blocks_protected_views() {
        let identity = Arc::new(MemoryIdentity::deferred(AuthUser::new("u1")));
        let session = session(&identity);
        let mut nav = Navigator::new(&session, Route::Feed);

        assert_eq!(nav.view(), View::Loading);
        assert_eq!(nav.navigate(Route::Profile), Err(NavigationError::SessionPending));

        identity.resolve_session(true);
        assert_eq!(nav.changed().await, None);
        assert_eq!(nav.view(), View::Page(Route::Feed));
        assert_eq!(nav.navigate(Route::Profile), Ok(Route::Profile));
    }

    #[tokio::test]
    async fn test_unauthenticated_redirects_mounted_protected_view() {
        let identity = Arc::new(MemoryIdentity::deferred(AuthUser::new("u1")));
        let session = session(&identity);
        let mut nav = Navigator::new(&session, Route::Profile);

        identity.resolve_session(false);
        assert_eq!(nav.changed().await, Some(Route::Login));
        assert_eq!(nav.view(), View::Page(Route::Login));
    }

    #[tokio::test]
    async fn test_sign_in_does_not_navigate() {
        let identity = Arc::new(MemoryIdentity::new(AuthUser::new("u1")));
        let session = session(&identity);
        let mut nav = Navigator::new(&session, Route::Login);
        assert_eq!(nav.navigate(Route::Feed), Ok(Route::Login));

        session.sign_in().await.unwrap();
        assert_eq!(nav.changed().await, None);
        assert_eq!(nav.current(), Route::Login);

        assert_eq!(nav.navigate(Route::CreatePost), Ok(Route::CreatePost));
        assert_eq!(nav.back(), Ok(Route::Login));
    }

    #[tokio::test]
    async fn test_sign_out_redirects_and_clears_history() {
        let identity = Arc::new(MemoryIdentity::signed_in(AuthUser::new("u1")));
        let session = session(&identity);
        let mut nav = Navigator::new(&session, Route::Feed);
        nav.navigate(Route::Profile).unwrap();

        session.sign_out().await.unwrap();
        assert_eq!(nav.changed().await, Some(Route::Login));
        assert_eq!(nav.back(), Err(NavigationError::NoHistory));
    }
}

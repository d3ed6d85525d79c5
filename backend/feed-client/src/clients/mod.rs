//! Clients for the managed backend services the feed depends on.
//!
//! The identity service, document store and media host are external; only
//! their request/response contracts live here. `memory` holds in-process
//! implementations used by the binary and by tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{AuthUser, ImageSource};

pub mod memory;

/// Sentinel replaced by the store with its commit time (microseconds since epoch)
pub const SERVER_TIMESTAMP: &str = "__server_timestamp__";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

// ============================================================================
// Document store
// ============================================================================

/// Stored document: server-assigned id plus its JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Resume point for a query: the anchor document and its ordering value
#[derive(Debug, Clone, PartialEq)]
pub struct StartAfter {
    pub id: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub start_after: Option<StartAfter>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
            start_after: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_in(mut self, field: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(field.to_string(), values));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.start_after = Some(StartAfter {
            id: id.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Replace,
    Merge,
}

/// Generic document database. Collections are addressed by path
/// (`posts`, `posts/{id}/comments`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, query: &Query) -> ClientResult<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> ClientResult<Option<Document>>;

    /// Insert with a server-assigned id
    async fn add(&self, collection: &str, data: Value) -> ClientResult<Document>;

    /// Insert under `id` only if absent. Returns true when a document was written.
    async fn create(&self, collection: &str, id: &str, data: Value) -> ClientResult<bool>;

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode)
        -> ClientResult<()>;

    /// Merge fields into an existing document; `NotFound` when absent
    async fn update(&self, collection: &str, id: &str, data: Value) -> ClientResult<()>;

    /// Returns true when a document was removed
    async fn delete(&self, collection: &str, id: &str) -> ClientResult<bool>;

    /// Add `delta` to an integer field and return the new value
    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64)
        -> ClientResult<i64>;
}

// ============================================================================
// Identity
// ============================================================================

pub type AuthListener = Box<dyn Fn(Option<AuthUser>) + Send + Sync>;

/// Handle returned by `IdentityClient::subscribe`; notifications stop when
/// it is dropped or explicitly unsubscribed.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription with nothing to cancel
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Register for auth state changes. The current state is delivered once
    /// the service has resolved the session.
    fn subscribe(&self, listener: AuthListener) -> Subscription;

    /// `Cancelled` when the user aborts, `Unavailable` otherwise
    async fn sign_in(&self) -> ClientResult<AuthUser>;

    async fn sign_out(&self) -> ClientResult<()>;

    async fn update_display_name(&self, display_name: &str) -> ClientResult<()>;
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub object_name: String,
    pub source: ImageSource,
}

#[async_trait]
pub trait MediaClient: Send + Sync {
    /// Upload a file or remote URL and return its secure URL.
    /// `Rejected` carries the status of a non-2xx response.
    async fn upload(&self, request: UploadRequest) -> ClientResult<String>;
}

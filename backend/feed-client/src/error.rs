/// Error types for feed-client
use thiserror::Error;

use crate::clients::ClientError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected: {0}")]
    Upload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    /// Transient failures the user may retry by hand.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Network(_))
    }

    /// Text for the dismissible notification shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            FeedError::Unauthenticated => "Please sign in to continue".to_string(),
            FeedError::Network(_) => "Connection problem. Please try again.".to_string(),
            FeedError::Upload(_) => "Image upload failed. Please try another image.".to_string(),
            FeedError::NotFound(what) => format!("{} is no longer available", what),
            FeedError::Cancelled => "Sign-in cancelled".to_string(),
            FeedError::InvalidInput(msg) => msg.clone(),
            FeedError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Classify transport errors so raw client failures never reach a view.
impl From<ClientError> for FeedError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unavailable(msg) => FeedError::Network(msg),
            ClientError::Conflict(msg) => FeedError::Network(format!("conflict: {}", msg)),
            ClientError::NotFound(what) => FeedError::NotFound(what),
            ClientError::Rejected { status, message } => {
                FeedError::Upload(format!("status {}: {}", status, message))
            }
            ClientError::Cancelled => FeedError::Cancelled,
            ClientError::Malformed(msg) => FeedError::Internal(format!("malformed document: {}", msg)),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Internal(format!("serialization error: {}", err))
    }
}

/// Result type alias for feed-client operations
pub type FeedResult<T> = Result<T, FeedError>;

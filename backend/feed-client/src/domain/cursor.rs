use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FeedError, FeedResult};

/// Opaque pagination cursor pointing at the last post of a page.
///
/// Encoded as base64 of `"{created_at_micros}:{post_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedCursor {
    pub created_at_micros: i64,
    pub post_id: String,
}

impl FeedCursor {
    pub fn new(created_at_micros: i64, post_id: impl Into<String>) -> Self {
        Self {
            created_at_micros,
            post_id: post_id.into(),
        }
    }

    pub fn encode(&self) -> String {
        let cursor_str = format!("{}:{}", self.created_at_micros, self.post_id);
        general_purpose::STANDARD.encode(cursor_str)
    }

    pub fn decode(cursor: &str) -> FeedResult<Self> {
        let decoded = general_purpose::STANDARD
            .decode(cursor)
            .map_err(|_| FeedError::InvalidInput("Invalid cursor format".to_string()))?;
        let cursor_str = String::from_utf8(decoded)
            .map_err(|_| FeedError::InvalidInput("Invalid cursor encoding".to_string()))?;

        let (ts_str, post_id) = cursor_str
            .split_once(':')
            .ok_or_else(|| FeedError::InvalidInput("Invalid cursor value".to_string()))?;
        let created_at_micros = ts_str
            .parse::<i64>()
            .map_err(|_| FeedError::InvalidInput("Invalid cursor timestamp".to_string()))?;
        if post_id.is_empty() {
            return Err(FeedError::InvalidInput("Invalid cursor post id".to_string()));
        }

        Ok(Self::new(created_at_micros, post_id))
    }
}

impl fmt::Display for FeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<FeedCursor> for String {
    fn from(cursor: FeedCursor) -> Self {
        cursor.encode()
    }
}

impl TryFrom<String> for FeedCursor {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FeedCursor::decode(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_may_contain_separator() {
        let cursor = FeedCursor::new(1_700_000_000_000_001, "abc:def");
        let decoded = FeedCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.post_id, "abc:def");
        assert_eq!(decoded.created_at_micros, 1_700_000_000_000_001);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            FeedCursor::decode("not base64!!"),
            Err(FeedError::InvalidInput(_))
        ));
        let no_separator = general_purpose::STANDARD.encode("12345");
        assert!(FeedCursor::decode(&no_separator).is_err());
        let bad_timestamp = general_purpose::STANDARD.encode("abc:p1");
        assert!(FeedCursor::decode(&bad_timestamp).is_err());
    }

    #[test]
    fn test_serializes_as_opaque_string() {
        let cursor = FeedCursor::new(42, "p9");
        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, format!("\"{}\"", cursor.encode()));
    }
}

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::clients::SERVER_TIMESTAMP;
use crate::domain::cursor::FeedCursor;

/// Display name used when a post carries no author name
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

pub(crate) fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(micros).single()
}

// ============================================================================
// Session user
// ============================================================================

/// Signed-in user as reported by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }

    /// Fill a missing photo with the placeholder avatar
    pub fn with_placeholder_photo(mut self, placeholder: &str) -> Self {
        if self.photo_url.as_deref().map_or(true, str::is_empty) {
            self.photo_url = Some(placeholder.to_string());
        }
        self
    }

    pub fn author_snapshot(&self) -> AuthorSnapshot {
        AuthorSnapshot {
            author_id: self.uid.clone(),
            author_name: self
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            author_photo_url: self.photo_url.clone(),
        }
    }
}

/// Author fields copied onto posts and comments at write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSnapshot {
    pub author_id: String,
    pub author_name: String,
    #[serde(rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
}

// ============================================================================
// Posts
// ============================================================================

/// Post as seen by the client. `like_count` is unsigned so a negative
/// counter can never be observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub content: String,
    pub image_urls: Vec<String>,
    pub like_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Build a post from a raw stored document, applying the defaulting rules.
    /// Documents without a creation timestamp cannot be ordered and are rejected.
    pub fn from_document(id: &str, data: &Value) -> Option<Post> {
        let doc: PostDocument = serde_json::from_value(data.clone()).ok()?;
        let created_at = from_micros(doc.created_at?)?;

        Some(Post {
            id: id.to_string(),
            author_id: doc.author_id.unwrap_or_default(),
            author_name: doc
                .author_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            author_photo_url: doc.author_photo_url,
            content: doc.content.unwrap_or_default(),
            image_urls: doc.image_urls.unwrap_or_default(),
            like_count: parse_like_count(doc.likes.as_ref()),
            created_at,
        })
    }

    pub fn apply_author(&mut self, author: &AuthorSnapshot) {
        if self.author_id == author.author_id {
            self.author_name = author.author_name.clone();
            self.author_photo_url = author.author_photo_url.clone();
        }
    }
}

/// Stored shape of a post document. Every field is optional because the
/// backend accepts arbitrary documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDocument {
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default, rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "imageURLs")]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub likes: Option<Value>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl PostDocument {
    /// Document written for a freshly composed post
    pub fn new_post(author: &AuthorSnapshot, content: &str, image_urls: &[String]) -> Value {
        json!({
            "authorId": author.author_id,
            "authorName": author.author_name,
            "authorPhotoURL": author.author_photo_url,
            "content": content,
            "imageURLs": image_urls,
            "likes": 0,
            "createdAt": SERVER_TIMESTAMP,
        })
    }
}

pub(crate) fn parse_like_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.max(0) as u64
            } else if let Some(u) = n.as_u64() {
                u
            } else {
                n.as_f64().map(|f| f.max(0.0).floor() as u64).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

/// Post plus the viewer's like flag, as held by the feed cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub liked: bool,
}

/// One page of the feed, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<FeedCursor>,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

// ============================================================================
// Likes
// ============================================================================

/// Existence of a record for (post, user) means the user likes the post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    pub post_id: String,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl LikeRecord {
    pub fn document_id(post_id: &str, user_id: &str) -> String {
        format!("{}_{}", post_id, user_id)
    }

    pub fn new_document(post_id: &str, user_id: &str) -> Value {
        json!({
            "postId": post_id,
            "userId": user_id,
            "createdAt": SERVER_TIMESTAMP,
        })
    }
}

/// Local like state of one cached post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub liked: bool,
    pub like_count: u64,
}

impl LikeSnapshot {
    /// State after flipping the like flag, with the count floored at zero
    pub fn toggled(self) -> Self {
        if self.liked {
            Self {
                liked: false,
                like_count: self.like_count.saturating_sub(1),
            }
        } else {
            Self {
                liked: true,
                like_count: self.like_count + 1,
            }
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "coverPhotoURL")]
    pub cover_photo_url: Option<String>,
    pub bio: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile for a user who never saved one
    pub fn from_session(user: &AuthUser) -> Self {
        Self {
            id: user.uid.clone(),
            display_name: user.author_snapshot().author_name,
            photo_url: user.photo_url.clone(),
            cover_photo_url: None,
            bio: String::new(),
            updated_at: None,
        }
    }

    pub fn from_document(user: &AuthUser, data: &Value) -> Self {
        let doc: ProfileDocument = serde_json::from_value(data.clone()).unwrap_or_default();
        let fallback = Self::from_session(user);
        Self {
            id: user.uid.clone(),
            display_name: doc
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(fallback.display_name),
            photo_url: doc.photo_url.or(fallback.photo_url),
            cover_photo_url: doc.cover_photo_url,
            bio: doc.bio.unwrap_or_default(),
            updated_at: doc.updated_at.and_then(from_micros),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default, rename = "coverPhotoURL")]
    pub cover_photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Edits collected by the profile view. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<ImageSource>,
    pub cover_photo: Option<ImageSource>,
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File { name: String, bytes: Vec<u8> },
    Url(String),
}

impl ImageSource {
    pub fn is_valid(&self) -> bool {
        match self {
            ImageSource::File { bytes, .. } => !bytes.is_empty(),
            ImageSource::Url(url) => !url.trim().is_empty(),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            ImageSource::File { name, .. } => name.clone(),
            ImageSource::Url(url) => url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|segment| segment.split('?').next())
                .filter(|segment| !segment.is_empty())
                .unwrap_or("image")
                .to_string(),
        }
    }
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDocument {
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default, rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Comment {
    pub fn from_document(post_id: &str, id: &str, data: &Value) -> Option<Comment> {
        let doc: CommentDocument = serde_json::from_value(data.clone()).ok()?;
        Some(Comment {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author_id: doc.author_id.unwrap_or_default(),
            author_name: doc
                .author_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            author_photo_url: doc.author_photo_url,
            text: doc.text.unwrap_or_default(),
            created_at: from_micros(doc.created_at?)?,
        })
    }

    pub fn new_document(author: &AuthorSnapshot, text: &str) -> Value {
        json!({
            "authorId": author.author_id,
            "authorName": author.author_name,
            "authorPhotoURL": author.author_photo_url,
            "text": text,
            "createdAt": SERVER_TIMESTAMP,
        })
    }
}

pub mod cursor;
pub mod models;
pub mod pending;

pub use cursor::FeedCursor;
pub use models::{
    AuthUser, AuthorSnapshot, Comment, FeedItem, FeedPage, ImageSource, LikeRecord, LikeSnapshot,
    Post, PostDocument, ProfileUpdate, UserProfile,
};
pub use pending::PendingOp;

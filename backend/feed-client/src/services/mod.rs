pub mod app;
pub mod comments;
pub mod composer;
pub mod feed;
pub mod likes;
pub mod navigation;
pub mod profile;
pub mod session;

pub use app::{AppContext, Clients};
pub use comments::CommentService;
pub use composer::PostComposer;
pub use feed::{FeedStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use likes::LikeCoordinator;
pub use navigation::{NavigationError, Navigator, Route, View};
pub use profile::ProfileEditor;
pub use session::{AuthState, SessionContext};

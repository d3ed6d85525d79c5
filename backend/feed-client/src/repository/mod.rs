pub mod comments;
pub mod likes;
pub mod posts;
pub mod profiles;

pub use comments::CommentRepository;
pub use likes::LikeRepository;
pub use posts::PostRepository;
pub use profiles::ProfileRepository;

//! In-process backends with injectable failures, used by the demo binary
//! and by tests.

mod identity;
mod media;
mod store;

pub use identity::MemoryIdentity;
pub use media::MemoryMediaClient;
pub use store::{MemoryDocumentStore, StoreOp};

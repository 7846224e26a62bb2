pub mod config;
pub mod filter;
pub mod image;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use filter::{Direction, Filter, FilterError, FilterParams};
pub use image::{ImageStore, SavedImage, StorageError};
pub use session::{
    ConversationId, MemorySessionStore, PendingImage, Reply, SessionError, SessionStore,
    SessionTracker,
};

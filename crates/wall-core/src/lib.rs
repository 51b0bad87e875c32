//! wall-core
//!
//! Domain logic and interface definitions for the discussion wall: the
//! interval-encoded message forest, thread reconstruction and the
//! visibility policy.

pub mod directory;
pub mod encoder;
pub mod error;
pub mod events;
pub mod lock;
pub mod models;
pub mod service;
pub mod thread;
pub mod traits;
pub mod visibility;

// Re-exporting for easier access in other crates
pub use error::*;
pub use events::*;
pub use models::*;
pub use service::{WallPage, WallService, WallSettings};
pub use thread::{assemble, ThreadNode};
pub use traits::*;
pub use visibility::{MessageView, StubPolicy};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_message_creation_v7() {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();
        let message = Message {
            id,
            parent_id: None,
            author_id: Uuid::now_v7(),
            content: "Hello Rust!".to_string(),
            created_at: now,
            modified_at: now,
            hidden: false,
            bounds: Bounds::new(1, 2),
        };
        assert_eq!(message.id, id);
        assert!(message.is_root());
        assert_eq!(message.last_touched(), now);
    }
}

//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::ReplyCreated;
use crate::models::{Message, MessageId, UserId, UserProfile};

/// The tree store: durable messages plus exclusive ownership of the
/// interval encoding.
///
/// Every structural mutation is all-or-nothing. An error means no bound in
/// the forest changed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepo: Send + Sync {
    // Structural writes
    async fn create_root(&self, author_id: UserId, content: String) -> Result<Message>;
    async fn create_reply(
        &self,
        parent_id: MessageId,
        author_id: UserId,
        content: String,
    ) -> Result<Message>;
    /// Returns the number of rows removed, the target included.
    async fn delete_subtree(&self, id: MessageId) -> Result<u64>;

    // In-place writes; bounds untouched
    async fn edit(&self, id: MessageId, content: String) -> Result<Message>;
    async fn set_hidden(&self, id: MessageId, hidden: bool) -> Result<Message>;

    // Reads
    async fn get_by_id(&self, id: MessageId) -> Result<Message>;
    /// The message and its descendants, `left` ascending (pre-order).
    async fn get_subtree(&self, id: MessageId) -> Result<Vec<Message>>;
    /// The whole thread, from its root, that contains `id`.
    async fn get_thread_containing(&self, id: MessageId) -> Result<Vec<Message>>;
    /// Roots by last activity anywhere in their tree, most recent first.
    async fn list_roots(&self, limit: i64, offset: i64) -> Result<Vec<Message>>;
    /// Pre-order rows of several threads in one round trip. Unknown ids are skipped.
    async fn get_threads(&self, root_ids: &[MessageId]) -> Result<Vec<Message>>;
    async fn count_roots(&self) -> Result<i64>;
    /// Most recently created messages, newest first.
    async fn latest(&self, limit: i64) -> Result<Vec<Message>>;
    async fn list_by_author(&self, author_id: UserId, limit: i64, offset: i64) -> Result<Vec<Message>>;
}

/// Delivery of domain events (mail, push...). Failures never undo a write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: ReplyCreated) -> anyhow::Result<()>;
}

/// Resolves display attributes; the wall only ever stores author ids.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profiles(&self, ids: &[UserId]) -> anyhow::Result<HashMap<UserId, UserProfile>>;
}

//! Domain events emitted after a committed write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Message, UserId};
use crate::traits::NotificationDispatcher;

/// A reply was stored. Delivery is the dispatcher's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCreated {
    pub message: Message,
    pub parent_author_id: UserId,
}

/// Dispatcher that only writes the event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, event: ReplyCreated) -> anyhow::Result<()> {
        log::info!(
            "reply {} by {} to a message of {}",
            event.message.id,
            event.message.author_id,
            event.parent_author_id
        );
        Ok(())
    }
}

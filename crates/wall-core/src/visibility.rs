//! # Visibility Filter
//!
//! The whole permission policy of the wall as pure functions over a message
//! and an explicit [`Viewer`]. Handlers and the service ask [`decide`]; they
//! never inspect roles or ownership themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageId, UserId, Viewer};
use crate::thread::ThreadNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Reply,
    Edit,
    Hide,
    Delete,
}

/// Closed set of policy outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Full,
    /// Only meaningful for [`Action::Read`]: the node stays, its content goes.
    Stub,
    Forbidden,
}

impl Verdict {
    pub fn allowed(&self) -> bool {
        matches!(self, Verdict::Full)
    }
}

/// Which fields a stub still exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StubPolicy {
    pub show_author: bool,
    pub show_timestamps: bool,
}

/// Affordances attached to a full message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub can_reply: bool,
    pub can_edit: bool,
    pub can_hide: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullMessage {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub hidden: bool,
    pub permissions: Permissions,
}

/// Placeholder keeping the thread shape around a message the viewer may not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStub {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageView {
    Full(FullMessage),
    Stub(MessageStub),
}

impl MessageView {
    pub fn id(&self) -> MessageId {
        match self {
            MessageView::Full(m) => m.id,
            MessageView::Stub(s) => s.id,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, MessageView::Stub(_))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            MessageView::Full(m) => Some(&m.content),
            MessageView::Stub(_) => None,
        }
    }

    pub fn author_id(&self) -> Option<UserId> {
        match self {
            MessageView::Full(m) => Some(m.author_id),
            MessageView::Stub(s) => s.author_id,
        }
    }
}

/// The policy itself.
pub fn decide(message: &Message, viewer: &Viewer, action: Action) -> Verdict {
    let privileged = viewer.owns(message) || viewer.is_admin();
    match action {
        Action::Read => {
            if message.hidden && !privileged {
                Verdict::Stub
            } else {
                Verdict::Full
            }
        }
        Action::Reply => {
            if viewer.is_authenticated() && decide(message, viewer, Action::Read).allowed() {
                Verdict::Full
            } else {
                Verdict::Forbidden
            }
        }
        Action::Edit | Action::Delete => {
            if privileged {
                Verdict::Full
            } else {
                Verdict::Forbidden
            }
        }
        Action::Hide => {
            if viewer.is_admin() {
                Verdict::Full
            } else {
                Verdict::Forbidden
            }
        }
    }
}

pub fn permissions(message: &Message, viewer: &Viewer) -> Permissions {
    Permissions {
        can_reply: decide(message, viewer, Action::Reply).allowed(),
        can_edit: decide(message, viewer, Action::Edit).allowed(),
        can_hide: decide(message, viewer, Action::Hide).allowed(),
        can_delete: decide(message, viewer, Action::Delete).allowed(),
    }
}

/// Redacts one message for `viewer`.
pub fn project(message: Message, viewer: &Viewer, policy: &StubPolicy) -> MessageView {
    match decide(&message, viewer, Action::Read) {
        Verdict::Full => {
            let permissions = permissions(&message, viewer);
            MessageView::Full(FullMessage {
                id: message.id,
                parent_id: message.parent_id,
                author_id: message.author_id,
                content: message.content,
                created_at: message.created_at,
                modified_at: message.modified_at,
                hidden: message.hidden,
                permissions,
            })
        }
        Verdict::Stub | Verdict::Forbidden => MessageView::Stub(MessageStub {
            id: message.id,
            parent_id: message.parent_id,
            author_id: policy.show_author.then_some(message.author_id),
            created_at: policy.show_timestamps.then_some(message.created_at),
        }),
    }
}

pub fn project_all(messages: Vec<Message>, viewer: &Viewer, policy: &StubPolicy) -> Vec<MessageView> {
    messages.into_iter().map(|m| project(m, viewer, policy)).collect()
}

/// Redacts a whole thread without dropping any node.
pub fn project_thread(
    thread: ThreadNode<Message>,
    viewer: &Viewer,
    policy: &StubPolicy,
) -> ThreadNode<MessageView> {
    thread.map(&mut |m| project(m, viewer, policy))
}

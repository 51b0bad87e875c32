//! # Domain Models
//!
//! These structs represent the core entities of the wall.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;
pub type UserId = Uuid;

/// The interval encoding of one message.
///
/// `left < right` always holds. A message B lies inside A's subtree exactly
/// when `A.left < B.left` and `B.right < A.right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
}

impl Bounds {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Strict containment: a node never contains itself.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Inclusive containment, used for subtree selection.
    pub fn encloses(&self, other: &Bounds) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    /// Number of positions the subtree occupies (always even).
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// Rows in the subtree, this node included.
    pub fn subtree_size(&self) -> i64 {
        self.width() / 2
    }

    /// True when the two intervals neither nest nor touch.
    pub fn is_disjoint(&self, other: &Bounds) -> bool {
        self.right < other.left || other.right < self.left
    }
}

/// The fundamental unit of conversation on the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// `None` for a thread root.
    pub parent_id: Option<MessageId>,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Bumped on every save, including hide/unhide.
    pub modified_at: DateTime<Utc>,
    /// Hidden messages stay in the tree but are only readable by their
    /// author and administrators.
    pub hidden: bool,
    /// Owned by the tree store; never written by anything else.
    pub bounds: Bounds,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Most recent of the creation and modification timestamps.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.modified_at.max(self.created_at)
    }
}

/// User groups of the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    TrustedUser,
    #[default]
    User,
    Inactive,
    Spammer,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "trusted_user" => Ok(Role::TrustedUser),
            "user" => Ok(Role::User),
            "inactive" => Ok(Role::Inactive),
            "spammer" => Ok(Role::Spammer),
            other => Err(crate::error::AppError::ValidationError(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Who is looking. Supplied by the identity provider, never fetched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: Option<UserId>,
    pub role: Role,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { user_id: None, role: Role::User }
    }

    pub fn user(user_id: UserId, role: Role) -> Self {
        Self { user_id: Some(user_id), role }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.role.is_admin()
    }

    pub fn owns(&self, message: &Message) -> bool {
        self.user_id == Some(message.author_id)
    }
}

/// Display attributes resolved by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
}

//! # Wall Service
//!
//! Orchestrates the tree store, the visibility filter and the notification
//! dispatcher. Every permission question goes through [`visibility::decide`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::events::ReplyCreated;
use crate::models::{Message, MessageId, UserId, Viewer};
use crate::thread::{assemble, ThreadNode};
use crate::traits::{MessageRepo, NotificationDispatcher};
use crate::visibility::{self, Action, MessageView, StubPolicy, Verdict};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallSettings {
    /// Threads per wall page.
    pub page_size: i64,
    /// Size of the "latest messages" list.
    pub latest_count: i64,
    /// Messages per page on a user's message list.
    pub author_page_size: i64,
    pub stub: StubPolicy,
}

impl Default for WallSettings {
    fn default() -> Self {
        Self { page_size: 10, latest_count: 10, author_page_size: 20, stub: StubPolicy::default() }
    }
}

/// One page of the wall's front page.
#[derive(Debug, Clone, Serialize)]
pub struct WallPage {
    pub page: i64,
    pub per_page: i64,
    pub total_threads: i64,
    pub threads: Vec<ThreadNode<MessageView>>,
}

impl WallPage {
    pub fn page_count(&self) -> i64 {
        if self.per_page <= 0 {
            return 0;
        }
        (self.total_threads + self.per_page - 1) / self.per_page
    }
}

pub struct WallService {
    repo: Arc<dyn MessageRepo>,
    notifier: Arc<dyn NotificationDispatcher>,
    settings: WallSettings,
}

/// Trims content and rejects blank messages.
pub fn normalize_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::ValidationError("message content cannot be empty".into()));
    }
    Ok(content.to_string())
}

/// Rows to skip before `page`. Pages past what an `i64` offset can address
/// are rejected.
fn page_offset(page: i64, per_page: i64) -> Result<i64> {
    (page.max(1) - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::ValidationError(format!("page {page} is out of range")))
}

impl WallService {
    pub fn new(
        repo: Arc<dyn MessageRepo>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: WallSettings,
    ) -> Self {
        Self { repo, notifier, settings }
    }

    pub fn settings(&self) -> &WallSettings {
        &self.settings
    }

    /// Starts a new thread.
    pub async fn post(&self, viewer: &Viewer, content: &str) -> Result<Message> {
        let author = viewer
            .user_id
            .ok_or_else(|| AppError::Unauthorized("sign in to post on the wall".into()))?;
        let content = normalize_content(content)?;
        let message = self.repo.create_root(author, content).await?;
        log::info!("thread {} started by {}", message.id, author);
        Ok(message)
    }

    /// Replies to `parent_id` and notifies the parent's author.
    pub async fn reply(&self, viewer: &Viewer, parent_id: MessageId, content: &str) -> Result<Message> {
        let author = viewer
            .user_id
            .ok_or_else(|| AppError::Unauthorized("sign in to reply".into()))?;
        let content = normalize_content(content)?;
        let parent = self.repo.get_by_id(parent_id).await?;
        if visibility::decide(&parent, viewer, Action::Reply) != Verdict::Full {
            return Err(AppError::Forbidden("you cannot reply to this message".into()));
        }

        let message = self.repo.create_reply(parent_id, author, content).await?;
        log::info!("reply {} under {} by {}", message.id, parent_id, author);

        let event = ReplyCreated { message: message.clone(), parent_author_id: parent.author_id };
        if let Err(err) = self.notifier.dispatch(event).await {
            log::warn!("reply {} stored but notification failed: {err:#}", message.id);
        }
        Ok(message)
    }

    pub async fn edit(&self, viewer: &Viewer, id: MessageId, content: &str) -> Result<Message> {
        let content = normalize_content(content)?;
        let message = self.repo.get_by_id(id).await?;
        if visibility::decide(&message, viewer, Action::Edit) != Verdict::Full {
            return Err(AppError::Forbidden("you do not have permission to edit this message".into()));
        }
        self.repo.edit(id, content).await
    }

    pub async fn set_hidden(&self, viewer: &Viewer, id: MessageId, hidden: bool) -> Result<Message> {
        // Hiding is admin-only whatever the message, so no lookup is needed first.
        if !viewer.is_admin() {
            return Err(AppError::Forbidden("only administrators can hide messages".into()));
        }
        let message = self.repo.set_hidden(id, hidden).await?;
        log::info!("message {id} hidden={hidden}");
        Ok(message)
    }

    /// Deletes the message and every reply below it.
    pub async fn delete(&self, viewer: &Viewer, id: MessageId) -> Result<u64> {
        let message = self.repo.get_by_id(id).await?;
        if visibility::decide(&message, viewer, Action::Delete) != Verdict::Full {
            return Err(AppError::Forbidden("you do not have permission to delete this message".into()));
        }
        let removed = self.repo.delete_subtree(id).await?;
        log::info!("deleted {removed} message(s) under {id}");
        Ok(removed)
    }

    /// The whole thread containing `id`, redacted for `viewer`.
    pub async fn thread(&self, viewer: &Viewer, id: MessageId) -> Result<ThreadNode<MessageView>> {
        let rows = self.repo.get_thread_containing(id).await?;
        let root = assemble(rows)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::message_not_found(id))?;
        Ok(visibility::project_thread(root, viewer, &self.settings.stub))
    }

    /// A page of threads, most recently active first.
    pub async fn page(&self, viewer: &Viewer, page: i64) -> Result<WallPage> {
        let per_page = self.settings.page_size;
        let page = page.max(1);
        let roots = self.repo.list_roots(per_page, page_offset(page, per_page)?).await?;
        let total_threads = self.repo.count_roots().await?;

        let order: Vec<MessageId> = roots.iter().map(|m| m.id).collect();
        let rows = if order.is_empty() { Vec::new() } else { self.repo.get_threads(&order).await? };

        // Rows arrive in bounds order; the page wants activity order.
        let mut by_root: HashMap<MessageId, ThreadNode<Message>> =
            assemble(rows).into_iter().map(|t| (t.message.id, t)).collect();
        let threads = order
            .iter()
            .filter_map(|id| by_root.remove(id))
            .map(|t| visibility::project_thread(t, viewer, &self.settings.stub))
            .collect();

        Ok(WallPage { page, per_page, total_threads, threads })
    }

    pub async fn latest(&self, viewer: &Viewer) -> Result<Vec<MessageView>> {
        let messages = self.repo.latest(self.settings.latest_count).await?;
        Ok(visibility::project_all(messages, viewer, &self.settings.stub))
    }

    pub async fn by_author(&self, viewer: &Viewer, author_id: UserId, page: i64) -> Result<Vec<MessageView>> {
        let per_page = self.settings.author_page_size;
        let messages = self
            .repo
            .list_by_author(author_id, per_page, page_offset(page, per_page)?)
            .await?;
        Ok(visibility::project_all(messages, viewer, &self.settings.stub))
    }
}

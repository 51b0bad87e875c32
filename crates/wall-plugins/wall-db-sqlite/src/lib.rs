//! # wall-db-sqlite Implementation
//!
//! This module implements the tree store on SQLite: the mapping between the
//! `wall_messages` table and the `wall-core` models, and the transactional
//! execution of the interval encoder's plans.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;
use wall_core::encoder::{self, Shift};
use wall_core::error::{AppError, Result};
use wall_core::lock::{LockKey, TreeLocks};
use wall_core::models::{Bounds, Message, MessageId, UserId};
use wall_core::traits::MessageRepo;

const COLUMNS: &str = "id, parent_id, author_id, content, created_at, modified_at, hidden, lft, rght";
const M_COLUMNS: &str =
    "m.id, m.parent_id, m.author_id, m.content, m.created_at, m.modified_at, m.hidden, m.lft, m.rght";

// SQLITE_BUSY, SQLITE_LOCKED and their extended variants
const BUSY_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

pub struct SqliteMessageRepo {
    pool: SqlitePool,
    locks: TreeLocks,
}

/// Maps driver failures onto the wall taxonomy. Lock contention is retryable.
fn db_err(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().is_some_and(|c| BUSY_CODES.contains(&c.as_ref())) => {
            log::warn!("sqlite lock contention: {db}");
            AppError::Busy("the wall is busy, try again".into())
        }
        sqlx::Error::PoolTimedOut => AppError::Busy("no database connection available".into()),
        _ => {
            log::error!("storage failure: {err}");
            AppError::Storage(err.to_string())
        }
    }
}

fn message_from_row(row: &SqliteRow) -> std::result::Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        parent_id: row.try_get("parent_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        modified_at: row.try_get("modified_at")?,
        hidden: row.try_get("hidden")?,
        bounds: Bounds::new(row.try_get("lft")?, row.try_get("rght")?),
    })
}

fn messages_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<Message>> {
    rows.iter().map(message_from_row).collect::<std::result::Result<_, _>>().map_err(db_err)
}

async fn find<'e, E>(executor: E, id: MessageId) -> Result<Option<Message>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM wall_messages WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(db_err)?;
    row.as_ref().map(message_from_row).transpose().map_err(db_err)
}

/// Takes SQLite's write lock before any bound is read in this transaction,
/// so the bounds read afterwards cannot go stale before the shift runs.
async fn claim_write(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("UPDATE wall_messages SET lft = lft WHERE id IS NULL")
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// One statement so the `lft < rght` check only ever sees final values.
async fn apply_shift(conn: &mut SqliteConnection, shift: Shift) -> Result<u64> {
    let done = sqlx::query(
        "UPDATE wall_messages SET \
             lft = CASE WHEN lft >= ?2 THEN lft + ?1 ELSE lft END, \
             rght = rght + ?1 \
         WHERE rght >= ?2",
    )
    .bind(shift.delta)
    .bind(shift.from)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(done.rows_affected())
}

async fn insert(conn: &mut SqliteConnection, message: &Message) -> Result<()> {
    sqlx::query(&format!("INSERT INTO wall_messages ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"))
        .bind(message.id)
        .bind(message.parent_id)
        .bind(message.author_id)
        .bind(&message.content)
        .bind(message.created_at)
        .bind(message.modified_at)
        .bind(message.hidden)
        .bind(message.bounds.left)
        .bind(message.bounds.right)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

impl SqliteMessageRepo {
    /// Connects and runs the embedded migrations.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        Self::with_lock_timeout(url, Duration::from_secs(5)).await
    }

    /// `lock_timeout` bounds both the per-tree lock wait and SQLite's own busy wait.
    pub async fn with_lock_timeout(url: &str, lock_timeout: Duration) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(lock_timeout);

        // An in-memory database lives and dies with its only connection.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("wall store ready at {url}");
        Ok(Self::from_pool(pool, TreeLocks::new(lock_timeout)))
    }

    pub fn from_pool(pool: SqlitePool, locks: TreeLocks) -> Self {
        Self { pool, locks }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks the whole forest's encoding. Meant for startup and tests.
    pub async fn check_integrity(&self) -> Result<usize> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM wall_messages ORDER BY lft"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let messages = messages_from_rows(rows)?;
        encoder::verify_forest(&messages).map_err(AppError::Storage)?;
        Ok(messages.len())
    }

    /// Resolves the tree `id` belongs to, from outside any transaction.
    ///
    /// One statement, so the message and its root are read from the same
    /// snapshot even while other trees are being renumbered.
    async fn tree_of(&self, id: MessageId) -> Result<MessageId> {
        sqlx::query_scalar(
            "SELECT r.id FROM wall_messages r \
             JOIN wall_messages t ON t.lft BETWEEN r.lft AND r.rght \
             WHERE t.id = ? AND r.parent_id IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::message_not_found(id))
    }
}

#[async_trait]
impl MessageRepo for SqliteMessageRepo {
    /// Appends a new thread after every existing root.
    async fn create_root(&self, author_id: UserId, content: String) -> Result<Message> {
        let _guard = self.locks.acquire(LockKey::Forest).await?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        claim_write(&mut tx).await?;

        let max_right: Option<i64> = sqlx::query_scalar("SELECT MAX(rght) FROM wall_messages")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        let now = Utc::now();
        let message = Message {
            id: Uuid::now_v7(),
            parent_id: None,
            author_id,
            content,
            created_at: now,
            modified_at: now,
            hidden: false,
            bounds: encoder::place_root(max_right),
        };
        insert(&mut tx, &message).await?;
        tx.commit().await.map_err(db_err)?;

        log::debug!("root {} placed at {:?}", message.id, message.bounds);
        Ok(message)
    }

    /// Inserts a last child under `parent_id`, shifting everything after it.
    ///
    /// # Developer Note
    /// The parent is read twice: once to find which tree to lock, and again
    /// inside the transaction, because its bounds may have moved while we
    /// waited for the lock.
    async fn create_reply(&self, parent_id: MessageId, author_id: UserId, content: String) -> Result<Message> {
        let tree = self.tree_of(parent_id).await?;
        let _guard = self.locks.acquire(LockKey::Tree(tree)).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        claim_write(&mut tx).await?;
        let parent = find(&mut *tx, parent_id)
            .await?
            .ok_or_else(|| AppError::message_not_found(parent_id))?;

        let plan = encoder::place_child(parent.bounds);
        let shifted = apply_shift(&mut tx, plan.shift).await?;

        let now = Utc::now();
        let message = Message {
            id: Uuid::now_v7(),
            parent_id: Some(parent_id),
            author_id,
            content,
            created_at: now,
            modified_at: now,
            hidden: false,
            bounds: plan.bounds,
        };
        insert(&mut tx, &message).await?;
        tx.commit().await.map_err(db_err)?;

        log::debug!(
            "reply {} placed at {:?} under {parent_id}, {shifted} row(s) shifted",
            message.id,
            message.bounds
        );
        Ok(message)
    }

    async fn delete_subtree(&self, id: MessageId) -> Result<u64> {
        let tree = self.tree_of(id).await?;
        let guard = self.locks.acquire(LockKey::Tree(tree)).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        claim_write(&mut tx).await?;
        let node = find(&mut *tx, id).await?.ok_or_else(|| AppError::message_not_found(id))?;
        let plan = encoder::remove_subtree(node.bounds);

        let removed = sqlx::query("DELETE FROM wall_messages WHERE lft >= ? AND rght <= ?")
            .bind(plan.span.left)
            .bind(plan.span.right)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        if removed as i64 != plan.row_count() {
            // Dropping the transaction rolls the delete back.
            log::error!("subtree {id} {:?} held {removed} rows, expected {}", plan.span, plan.row_count());
            return Err(AppError::Storage(format!("interval encoding of {id} is inconsistent")));
        }
        apply_shift(&mut tx, plan.shift).await?;
        tx.commit().await.map_err(db_err)?;

        drop(guard);
        if node.is_root() {
            self.locks.forget(LockKey::Tree(tree));
        }
        log::debug!("removed {removed} row(s) at {:?}", plan.span);
        Ok(removed)
    }

    async fn edit(&self, id: MessageId, content: String) -> Result<Message> {
        let row = sqlx::query(&format!(
            "UPDATE wall_messages SET content = ?, modified_at = ? WHERE id = ? RETURNING {COLUMNS}"
        ))
        .bind(content)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(row) => message_from_row(&row).map_err(db_err),
            None => Err(AppError::message_not_found(id)),
        }
    }

    async fn set_hidden(&self, id: MessageId, hidden: bool) -> Result<Message> {
        let row = sqlx::query(&format!(
            "UPDATE wall_messages SET hidden = ?, modified_at = ? WHERE id = ? RETURNING {COLUMNS}"
        ))
        .bind(hidden)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(row) => message_from_row(&row).map_err(db_err),
            None => Err(AppError::message_not_found(id)),
        }
    }

    async fn get_by_id(&self, id: MessageId) -> Result<Message> {
        find(&self.pool, id).await?.ok_or_else(|| AppError::message_not_found(id))
    }

    /// Single statement, so the target's bounds and the rows they select come
    /// from the same snapshot.
    async fn get_subtree(&self, id: MessageId) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {M_COLUMNS} FROM wall_messages m \
             JOIN wall_messages t ON m.lft BETWEEN t.lft AND t.rght \
             WHERE t.id = ? ORDER BY m.lft"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        if rows.is_empty() {
            return Err(AppError::message_not_found(id));
        }
        messages_from_rows(rows)
    }

    async fn get_thread_containing(&self, id: MessageId) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {M_COLUMNS} FROM wall_messages m \
             JOIN wall_messages r ON m.lft BETWEEN r.lft AND r.rght \
             JOIN wall_messages t ON t.lft BETWEEN r.lft AND r.rght \
             WHERE t.id = ? AND r.parent_id IS NULL ORDER BY m.lft"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        if rows.is_empty() {
            return Err(AppError::message_not_found(id));
        }
        messages_from_rows(rows)
    }

    /// Last activity is recomputed per request: `modified_at` is set on
    /// creation and bumped on every save, so its maximum over the subtree
    /// covers both timestamps.
    async fn list_roots(&self, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS}, \
                 (SELECT MAX(d.modified_at) FROM wall_messages d \
                  WHERE d.lft BETWEEN r.lft AND r.rght) AS last_activity \
             FROM wall_messages r WHERE r.parent_id IS NULL \
             ORDER BY last_activity DESC, r.lft DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        messages_from_rows(rows)
    }

    async fn get_threads(&self, root_ids: &[MessageId]) -> Result<Vec<Message>> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {M_COLUMNS} FROM wall_messages m \
             JOIN wall_messages r ON m.lft BETWEEN r.lft AND r.rght \
             WHERE r.parent_id IS NULL AND r.id IN ("
        ));
        let mut ids = builder.separated(", ");
        for id in root_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY m.lft");

        let rows = builder.build().fetch_all(&self.pool).await.map_err(db_err)?;
        messages_from_rows(rows)
    }

    async fn count_roots(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM wall_messages WHERE parent_id IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn latest(&self, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM wall_messages ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        messages_from_rows(rows)
    }

    async fn list_by_author(&self, author_id: UserId, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM wall_messages WHERE author_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        messages_from_rows(rows)
    }
}

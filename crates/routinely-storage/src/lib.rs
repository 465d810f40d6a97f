//! routinely-storage: SQLite-based persistence for tasks and chat history.
//!
//! All operations go through `spawn_blocking` so the async runtime never
//! blocks on SQLite I/O.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use routinely_types::{Category, ChatMessage, NewTask, Priority, RepeatKind, Task, TaskPatch};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Task not found: {0}")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, StorageError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        time TEXT NOT NULL,
        date TEXT NOT NULL,
        repeat TEXT NOT NULL DEFAULT 'once',
        priority TEXT NOT NULL DEFAULT 'medium',
        category TEXT NOT NULL DEFAULT 'other',
        completed INTEGER NOT NULL DEFAULT 0,
        reminder_sent INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message TEXT NOT NULL,
        response TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );";

const TASK_COLUMNS: &str =
    "id, title, time, date, repeat, priority, category, completed, reminder_sent, created_at, updated_at";

/// SQLite-based store for tasks and chat messages.
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let date: String = row.get(3)?;
    let date = date.parse::<NaiveDate>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    // Enum columns fall back to defaults rather than failing the whole row.
    let repeat = row
        .get::<_, String>(4)?
        .parse::<RepeatKind>()
        .unwrap_or(RepeatKind::Once);
    let priority = row
        .get::<_, String>(5)?
        .parse::<Priority>()
        .unwrap_or_default();
    let category = row
        .get::<_, String>(6)?
        .parse::<Category>()
        .unwrap_or_default();

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        time: row.get(2)?,
        date,
        repeat,
        priority,
        category,
        completed: row.get::<_, i64>(7)? != 0,
        reminder_sent: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TaskStore {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Task store opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ─── Tasks ──────────────────────────────────────────────

    /// Insert a new task and return it with its assigned id.
    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let conn = self.conn.clone();
        let now = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO tasks (title, time, date, repeat, priority, category, completed, reminder_sent, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?7)",
                rusqlite::params![
                    new_task.title,
                    new_task.time,
                    new_task.date.to_string(),
                    new_task.repeat.as_str(),
                    new_task.priority.as_str(),
                    new_task.category.as_str(),
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            let task = conn.query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                rusqlite::params![id],
                row_to_task,
            )?;
            Ok(task)
        })
        .await?
    }

    /// Get a task by id.
    pub async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let task = conn
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    rusqlite::params![id],
                    row_to_task,
                )
                .optional()?;
            Ok(task)
        })
        .await?
    }

    /// List all tasks, newest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"))?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await?
    }

    /// List tasks that are candidates for scheduling as of `today`.
    ///
    /// The filter is intentionally loose: recurring tasks are admitted even
    /// when their anchor date is in the past, because the job compiler applies
    /// the per-kind rules. One-off tasks dated before today are excluded here.
    pub async fn list_schedulable(&self, today: NaiveDate) -> Result<Vec<Task>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE completed = 0
                   AND (date >= ?1 OR repeat IN ('daily', 'weekly', 'monthly'))
                 ORDER BY id"
            ))?;
            let tasks = stmt
                .query_map(rusqlite::params![today.to_string()], row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await?
    }

    /// Apply a partial update. Returns the updated task.
    pub async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        let conn = self.conn.clone();
        let now = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let existing = conn
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    rusqlite::params![id],
                    row_to_task,
                )
                .optional()?
                .ok_or(StorageError::NotFound(id))?;

            let title = patch.title.unwrap_or(existing.title);
            let time = patch.time.unwrap_or(existing.time);
            let date = patch.date.unwrap_or(existing.date);
            let repeat = patch.repeat.unwrap_or(existing.repeat);
            let priority = patch.priority.unwrap_or(existing.priority);
            let category = patch.category.unwrap_or(existing.category);
            let completed = patch.completed.unwrap_or(existing.completed);

            conn.execute(
                "UPDATE tasks SET title = ?1, time = ?2, date = ?3, repeat = ?4,
                    priority = ?5, category = ?6, completed = ?7, updated_at = ?8
                 WHERE id = ?9",
                rusqlite::params![
                    title,
                    time,
                    date.to_string(),
                    repeat.as_str(),
                    priority.as_str(),
                    category.as_str(),
                    completed as i64,
                    now,
                    id,
                ],
            )?;

            let task = conn.query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                rusqlite::params![id],
                row_to_task,
            )?;
            Ok(task)
        })
        .await?
    }

    /// Delete a task. Returns true if a row was removed.
    pub async fn delete_task(&self, id: i64) -> Result<bool> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
            Ok(count > 0)
        })
        .await?
    }

    /// Mark a task completed (or not).
    pub async fn set_completed(&self, id: i64, completed: bool) -> Result<()> {
        let conn = self.conn.clone();
        let now = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let count = conn.execute(
                "UPDATE tasks SET completed = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![completed as i64, now, id],
            )?;
            if count == 0 {
                return Err(StorageError::NotFound(id));
            }
            Ok(())
        })
        .await?
    }

    /// Record that a reminder was delivered for this task.
    pub async fn mark_reminder_sent(&self, id: i64) -> Result<()> {
        let conn = self.conn.clone();
        let now = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "UPDATE tasks SET reminder_sent = 1, updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now, id],
            )?;
            Ok(())
        })
        .await?
    }

    // ─── Chat History ───────────────────────────────────────

    /// Save one chat exchange and return it with its assigned id.
    pub async fn save_chat(&self, message: &str, response: &str) -> Result<ChatMessage> {
        let conn = self.conn.clone();
        let message = message.to_string();
        let response = response.to_string();
        let now = now_millis();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO chat_messages (message, response, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![message, response, now],
            )?;
            Ok(ChatMessage {
                id: conn.last_insert_rowid(),
                message,
                response,
                created_at: now,
            })
        })
        .await?
    }

    /// List the most recent chat exchanges, newest first.
    pub async fn list_chats(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT id, message, response, created_at FROM chat_messages
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let chats = stmt
                .query_map(rusqlite::params![limit as i64], |row| {
                    Ok(ChatMessage {
                        id: row.get(0)?,
                        message: row.get(1)?,
                        response: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(chats)
        })
        .await?
    }

    /// Count tasks: (total, not yet completed).
    pub async fn task_counts(&self) -> Result<(i64, i64)> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            let active: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE completed = 0",
                [],
                |row| row.get(0),
            )?;
            Ok((total, active))
        })
        .await?
    }
}

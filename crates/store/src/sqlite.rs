//! SQLite thread store.
//!
//! Two tables:
//! - `threads`: one row per thread with its owning tenant
//! - `messages`: the append-only log, one JSON-encoded [`Message`] per row
//!
//! `append_messages` and `create_thread_with_messages` each run inside one
//! transaction.

use async_trait::async_trait;
use chrono::Utc;
use souschef_core::error::StoreError;
use souschef_core::message::{Message, TenantId, Thread, ThreadId};
use souschef_core::store::ConversationStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database; the pool is then
    /// limited to one connection so every query sees the same data.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite thread store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin transaction: {e}")))
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                id          TEXT PRIMARY KEY,
                tenant_id   TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("threads table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id   TEXT NOT NULL REFERENCES threads(id),
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, seq)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_threads_tenant ON threads(tenant_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("threads index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError> {
        let row = sqlx::query("SELECT tenant_id, created_at FROM threads WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load thread: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tenant: String = row
            .try_get("tenant_id")
            .map_err(|e| StoreError::QueryFailed(format!("tenant_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let rows = sqlx::query("SELECT body FROM messages WHERE thread_id = ? ORDER BY seq ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load messages: {e}")))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let body: String = row
                .try_get("body")
                .map_err(|e| StoreError::QueryFailed(format!("body column: {e}")))?;
            let message: Message = serde_json::from_str(&body)
                .map_err(|e| StoreError::QueryFailed(format!("corrupt message in {id}: {e}")))?;
            messages.push(message);
        }

        Ok(Some(Thread {
            id: id.clone(),
            tenant: TenantId(tenant),
            messages,
            created_at,
        }))
    }

    async fn create_thread(&self, tenant: &TenantId) -> Result<Thread, StoreError> {
        let thread = Thread::new(tenant.clone());
        sqlx::query("INSERT INTO threads (id, tenant_id, created_at) VALUES (?, ?, ?)")
            .bind(thread.id.as_str())
            .bind(tenant.as_str())
            .bind(thread.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("create thread: {e}")))?;

        debug!(thread_id = %thread.id, tenant = %tenant, "Created thread");
        Ok(thread)
    }

    async fn create_thread_with_messages(
        &self,
        tenant: &TenantId,
        messages: &[Message],
    ) -> Result<Thread, StoreError> {
        let mut thread = Thread::new(tenant.clone());
        let mut tx = self.begin().await?;

        sqlx::query("INSERT INTO threads (id, tenant_id, created_at) VALUES (?, ?, ?)")
            .bind(thread.id.as_str())
            .bind(tenant.as_str())
            .bind(thread.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("create thread: {e}")))?;
        insert_messages(&mut tx, &thread.id, messages).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;

        thread.messages.extend_from_slice(messages);
        debug!(thread_id = %thread.id, tenant = %tenant, count = messages.len(), "Created thread with messages");
        Ok(thread)
    }

    async fn append_messages(&self, id: &ThreadId, messages: &[Message]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        insert_messages(&mut tx, id, messages).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;

        debug!(thread_id = %id, count = messages.len(), "Appended messages");
        Ok(())
    }
}

/// On error the caller drops `tx`, which rolls it back.
async fn insert_messages(
    tx: &mut Transaction<'static, Sqlite>,
    id: &ThreadId,
    messages: &[Message],
) -> Result<(), StoreError> {
    for message in messages {
        let body = serde_json::to_string(message)
            .map_err(|e| StoreError::Storage(format!("encode message: {e}")))?;
        sqlx::query("INSERT INTO messages (thread_id, body, created_at) VALUES (?, ?, ?)")
            .bind(id.as_str())
            .bind(body)
            .bind(message.timestamp.to_rfc3339())
            .execute(&mut **tx)
            .await
            .map_err(|e| StoreError::Storage(format!("append message to {id}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_load_thread() {
        let store = test_store().await;
        let thread = store.create_thread(&TenantId::from("42")).await.unwrap();

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.tenant, TenantId::from("42"));
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn append_pair_roundtrips_multipart_content() {
        let store = test_store().await;
        let thread = store.create_thread(&TenantId::from("42")).await.unwrap();

        let user = Message::user("What is this?").with_image("data:image/jpeg;base64,AAAA");
        let assistant = Message::assistant("Looks like focaccia.");
        store.append_messages(&thread.id, &[user, assistant]).await.unwrap();

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].images.len(), 1);
        assert_eq!(loaded.messages[1].content, "Looks like focaccia.");
    }

    #[tokio::test]
    async fn append_to_unknown_thread_writes_nothing() {
        let store = test_store().await;
        let ghost = ThreadId::from("ghost");
        let result = store
            .append_messages(&ghost, &[Message::user("a"), Message::assistant("b")])
            .await;
        assert!(result.is_err());

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM messages")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("threads.db").display());

        let id = {
            let store = SqliteStore::new(&url).await.unwrap();
            let thread = store.create_thread(&TenantId::from("7")).await.unwrap();
            store
                .append_messages(&thread.id, &[Message::user("hi"), Message::assistant("hello")])
                .await
                .unwrap();
            store.pool.close().await;
            thread.id
        };

        let store = SqliteStore::new(&url).await.unwrap();
        let loaded = store.get_thread(&id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
    }

    async fn count_rows(store: &SqliteStore, table: &str) -> i64 {
        sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn create_with_messages_loads_back() {
        let store = test_store().await;
        let thread = store
            .create_thread_with_messages(&TenantId::from("42"), &[Message::user("hi"), Message::assistant("hello")])
            .await
            .unwrap();
        assert_eq!(thread.messages.len(), 2);

        let loaded = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(loaded.tenant, TenantId::from("42"));
        assert_eq!(loaded.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn failed_message_insert_leaves_no_thread() {
        let store = test_store().await;
        sqlx::query(
            "CREATE TRIGGER reject_second_message BEFORE INSERT ON messages \
             WHEN (SELECT COUNT(*) FROM messages) >= 1 \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store
            .create_thread_with_messages(&TenantId::from("42"), &[Message::user("hi"), Message::assistant("hello")])
            .await;
        assert!(result.is_err());
        assert_eq!(count_rows(&store, "threads").await, 0);
        assert_eq!(count_rows(&store, "messages").await, 0);
    }

    #[tokio::test]
    async fn missing_thread_is_none() {
        let store = test_store().await;
        assert!(store.get_thread(&ThreadId::from("nope")).await.unwrap().is_none());
    }
}

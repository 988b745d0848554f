use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the SQLite store. Cloning is cheap (shared pool).
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Migration` if the schema could not be applied.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let in_memory = path == ":memory:";

        // SEC-010: Pre-create the DB file with owner-only permissions
        #[cfg(unix)]
        if !in_memory {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                if let Some(parent) = db_path.parent() {
                    if parent.as_os_str().is_empty() || parent.exists() {
                        let _file = std::fs::OpenOptions::new()
                            .write(true)
                            .create_new(true)
                            .mode(0o600)
                            .open(db_path)
                            .ok(); // SQLite reports the real error at connect time
                    }
                }
            }
        }

        // busy_timeout=5000: wait up to 5s for concurrent writers before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");

        // A shared-cache in-memory database reports table locks instead of
        // waiting on busy_timeout, so it gets a single connection.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::InstanceLocked => DatabaseError::InstanceLocked,
            other => DatabaseError::Migration(other.to_string()),
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                feed_url TEXT UNIQUE NOT NULL,
                site_url TEXT,
                summary TEXT,
                last_updated INTEGER,
                favicon_url TEXT,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                last_refresh_error TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // guid is nullable: SQLite treats NULLs as distinct in UNIQUE, so
        // dedup only applies to items that carry a guid.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                guid TEXT,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                content TEXT,
                link TEXT,
                author TEXT,
                published INTEGER NOT NULL,
                feed_id TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                feed_title TEXT NOT NULL,
                image_url TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_saved INTEGER NOT NULL DEFAULT 0,
                UNIQUE(feed_id, guid)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_feed_published ON articles(feed_id, published DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_read ON articles(is_read)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_saved ON articles(is_saved)")
            .execute(&mut *tx)
            .await?;

        // Background selection orders by staleness within each favorite bucket
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feeds_favorite_updated ON feeds(is_favorite, last_updated)",
        )
        .execute(&mut *tx)
        .await?;

        // Key/value preferences. Keys use dotted convention: refresh.wifi_only, etc.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

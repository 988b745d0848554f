use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another feedline process appears to be using the database. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed.
///
/// `feed_url` is the natural key: the schema rejects two rows with the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: String,
    pub title: String,
    pub feed_url: String,
    pub site_url: Option<String>,
    pub summary: Option<String>,
    /// Epoch millis of the last successful refresh
    pub last_updated: Option<i64>,
    pub favicon_url: Option<String>,
    pub is_favorite: bool,
    pub last_refresh_error: Option<String>,
}

impl Feed {
    /// Builds a never-refreshed feed with a fresh id.
    pub fn new(title: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            feed_url: feed_url.into(),
            site_url: None,
            summary: None,
            last_updated: None,
            favicon_url: None,
            is_favorite: false,
            last_refresh_error: None,
        }
    }
}

/// An article belonging to a feed.
///
/// `id` is generated when the item is parsed. Dedup happens on
/// `(feed_id, guid)`; rows without a guid are never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: String,
    pub guid: Option<String>,
    pub title: String,
    /// Plain text, markup already stripped
    pub summary: String,
    /// Raw HTML body as published by the source
    pub content: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    /// Epoch millis
    pub published: i64,
    pub feed_id: String,
    /// Denormalized so lists can render without a join
    pub feed_title: String,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub is_saved: bool,
}

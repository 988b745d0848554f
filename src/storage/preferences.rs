use super::schema::Database;
use super::types::DatabaseError;

pub const KEY_BACKGROUND_ENABLED: &str = "refresh.background_enabled";
pub const KEY_WIFI_ONLY: &str = "refresh.wifi_only";
pub const KEY_LAST_REFRESH_TIME: &str = "refresh.last_refresh_time";

impl Database {
    // ========================================================================
    // User Preferences Operations
    // ========================================================================

    /// Get a single preference value by key.
    ///
    /// Keys use dotted convention: `refresh.wifi_only`, `refresh.last_refresh_time`, etc.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a preference value (UPSERT).
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Typed Refresh Preferences
// ============================================================================

/// Typed view over the refresh-related preference keys.
///
/// Values that are missing or fail to parse read as their defaults.
#[derive(Clone)]
pub struct Preferences {
    db: Database,
}

impl Preferences {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether the periodic background refresh should be scheduled. Default off.
    pub async fn background_refresh_enabled(&self) -> Result<bool, DatabaseError> {
        self.get_bool(KEY_BACKGROUND_ENABLED, false).await
    }

    pub async fn set_background_refresh_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.db
            .set_preference(KEY_BACKGROUND_ENABLED, bool_str(enabled))
            .await
    }

    /// Restrict background refresh to unmetered networks. Default on.
    pub async fn wifi_only(&self) -> Result<bool, DatabaseError> {
        self.get_bool(KEY_WIFI_ONLY, true).await
    }

    pub async fn set_wifi_only(&self, wifi_only: bool) -> Result<(), DatabaseError> {
        self.db.set_preference(KEY_WIFI_ONLY, bool_str(wifi_only)).await
    }

    /// Epoch millis of the last completed background refresh.
    pub async fn last_refresh_time(&self) -> Result<Option<i64>, DatabaseError> {
        Ok(self
            .db
            .get_preference(KEY_LAST_REFRESH_TIME)
            .await?
            .and_then(|v| v.parse().ok()))
    }

    pub async fn set_last_refresh_time(&self, millis: i64) -> Result<(), DatabaseError> {
        self.db
            .set_preference(KEY_LAST_REFRESH_TIME, &millis.to_string())
            .await
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, DatabaseError> {
        let value = self.db.get_preference(key).await?;
        Ok(match value.as_deref() {
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                tracing::warn!(key, value = other, "Ignoring malformed boolean preference");
                default
            }
            None => default,
        })
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

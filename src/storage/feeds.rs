use super::schema::Database;
use super::types::{DatabaseError, Feed};

const FEED_COLUMNS: &str = "id, title, feed_url, site_url, summary, last_updated, \
     favicon_url, is_favorite, last_refresh_error";

impl Database {
    // ========================================================================
    // Feed Queries
    // ========================================================================

    /// All feeds, favorites first, then alphabetical by title.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY is_favorite DESC, title ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, feed_url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE feed_url = ?"
        ))
        .bind(feed_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Favorite feeds, least recently refreshed first (never-refreshed lead).
    pub async fn favorite_feeds_for_refresh(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE is_favorite = 1 \
             ORDER BY last_updated ASC NULLS FIRST"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The `limit` stalest non-favorite feeds (never-refreshed lead).
    pub async fn oldest_non_favorite_feeds(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE is_favorite = 0 \
             ORDER BY last_updated ASC NULLS FIRST LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ========================================================================
    // Feed Mutations
    // ========================================================================

    /// Insert a feed, replacing every column of an existing row with the same id.
    ///
    /// A different id with an already-stored `feed_url` violates the UNIQUE
    /// constraint and is returned as an error.
    pub async fn upsert_feed(&self, feed: &Feed) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO feeds (id, title, feed_url, site_url, summary, last_updated,
                               favicon_url, is_favorite, last_refresh_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                feed_url = excluded.feed_url,
                site_url = excluded.site_url,
                summary = excluded.summary,
                last_updated = excluded.last_updated,
                favicon_url = excluded.favicon_url,
                is_favorite = excluded.is_favorite,
                last_refresh_error = excluded.last_refresh_error
        "#,
        )
        .bind(&feed.id)
        .bind(&feed.title)
        .bind(&feed.feed_url)
        .bind(&feed.site_url)
        .bind(&feed.summary)
        .bind(feed.last_updated)
        .bind(&feed.favicon_url)
        .bind(feed.is_favorite)
        .bind(&feed.last_refresh_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the stored row for `feed.id`. Returns false if no such feed.
    pub async fn update_feed(&self, feed: &Feed) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds SET
                title = ?, feed_url = ?, site_url = ?, summary = ?, last_updated = ?,
                favicon_url = ?, is_favorite = ?, last_refresh_error = ?
            WHERE id = ?
        "#,
        )
        .bind(&feed.title)
        .bind(&feed.feed_url)
        .bind(&feed.site_url)
        .bind(&feed.summary)
        .bind(feed.last_updated)
        .bind(&feed.favicon_url)
        .bind(feed.is_favorite)
        .bind(&feed.last_refresh_error)
        .bind(&feed.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a feed. Articles go with it (ON DELETE CASCADE).
    pub async fn delete_feed(&self, feed_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful refresh and clear any previous error.
    pub async fn mark_refresh_success(
        &self,
        feed_id: &str,
        timestamp: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET last_updated = ?, last_refresh_error = NULL WHERE id = ?")
            .bind(timestamp)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a refresh failure. `last_updated` keeps the last good refresh.
    pub async fn mark_refresh_error(&self, feed_id: &str, error: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET last_refresh_error = ? WHERE id = ?")
            .bind(error)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_favorite(&self, feed_id: &str, is_favorite: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET is_favorite = ? WHERE id = ?")
            .bind(is_favorite)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Feed};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_feed(n: usize) -> Feed {
        Feed::new(
            format!("Test Feed {}", n),
            format!("https://feed{}.example.com/rss", n),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_get_feed() {
        let db = test_db().await;
        let feed = test_feed(1);
        db.upsert_feed(&feed).await.unwrap();

        assert_eq!(db.get_feed(&feed.id).await.unwrap(), Some(feed.clone()));
        assert_eq!(
            db.get_feed_by_url("https://feed1.example.com/rss")
                .await
                .unwrap()
                .map(|f| f.id),
            Some(feed.id)
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let db = test_db().await;
        let mut feed = test_feed(1);
        db.upsert_feed(&feed).await.unwrap();

        feed.title = "Renamed".to_string();
        feed.favicon_url = Some("https://feed1.example.com/favicon.ico".to_string());
        db.upsert_feed(&feed).await.unwrap();

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Renamed");
        assert!(feeds[0].favicon_url.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_rejected() {
        let db = test_db().await;
        db.upsert_feed(&test_feed(1)).await.unwrap();

        let twin = Feed::new("Twin", "https://feed1.example.com/rss");
        assert!(db.upsert_feed(&twin).await.is_err());
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_feeds_favorites_first_then_title() {
        let db = test_db().await;
        let mut zebra = Feed::new("Zebra", "https://z.example.com/rss");
        zebra.is_favorite = true;
        db.upsert_feed(&Feed::new("Beta", "https://b.example.com/rss"))
            .await
            .unwrap();
        db.upsert_feed(&Feed::new("Alpha", "https://a.example.com/rss"))
            .await
            .unwrap();
        db.upsert_feed(&zebra).await.unwrap();

        let titles: Vec<_> = db
            .list_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["Zebra", "Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_refresh_success_clears_error() {
        let db = test_db().await;
        let feed = test_feed(1);
        db.upsert_feed(&feed).await.unwrap();

        db.mark_refresh_error(&feed.id, "HTTP 500").await.unwrap();
        let stored = db.get_feed(&feed.id).await.unwrap().unwrap();
        assert_eq!(stored.last_refresh_error.as_deref(), Some("HTTP 500"));
        assert_eq!(stored.last_updated, None);

        db.mark_refresh_success(&feed.id, 1_700_000_000_000)
            .await
            .unwrap();
        let stored = db.get_feed(&feed.id).await.unwrap().unwrap();
        assert_eq!(stored.last_refresh_error, None);
        assert_eq!(stored.last_updated, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_favorites_for_refresh_oldest_first() {
        let db = test_db().await;
        for (n, updated) in [(1, Some(300)), (2, None), (3, Some(100))] {
            let mut feed = test_feed(n);
            feed.is_favorite = true;
            feed.last_updated = updated;
            db.upsert_feed(&feed).await.unwrap();
        }
        db.upsert_feed(&test_feed(4)).await.unwrap();

        let order: Vec<_> = db
            .favorite_feeds_for_refresh()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.last_updated)
            .collect();
        assert_eq!(order, vec![None, Some(100), Some(300)]);
    }

    #[tokio::test]
    async fn test_oldest_non_favorites_respects_limit() {
        let db = test_db().await;
        for n in 0..6 {
            let mut feed = test_feed(n);
            feed.last_updated = if n % 2 == 0 { Some(n as i64 * 10) } else { None };
            db.upsert_feed(&feed).await.unwrap();
        }

        let oldest = db.oldest_non_favorite_feeds(4).await.unwrap();
        assert_eq!(oldest.len(), 4);
        // Three never-refreshed feeds, then the oldest refreshed one
        assert!(oldest[..3].iter().all(|f| f.last_updated.is_none()));
        assert_eq!(oldest[3].last_updated, Some(0));
    }

    #[tokio::test]
    async fn test_set_favorite_and_delete() {
        let db = test_db().await;
        let feed = test_feed(1);
        db.upsert_feed(&feed).await.unwrap();

        db.set_favorite(&feed.id, true).await.unwrap();
        assert!(db.get_feed(&feed.id).await.unwrap().unwrap().is_favorite);

        assert!(db.delete_feed(&feed.id).await.unwrap());
        assert!(!db.delete_feed(&feed.id).await.unwrap());
        assert!(db.get_feed(&feed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_feed_missing_returns_false() {
        let db = test_db().await;
        assert!(!db.update_feed(&test_feed(9)).await.unwrap());
    }
}

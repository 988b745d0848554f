use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Article, DatabaseError};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 2000;

/// 13 columns * 50 rows stays well under SQLite's bound-parameter limit
const INSERT_BATCH_SIZE: usize = 50;

const ARTICLE_COLUMNS: &str = "id, guid, title, summary, content, link, author, published, \
     feed_id, feed_title, image_url, is_read, is_saved";

impl Database {
    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert articles whose `(feed_id, guid)` is not stored yet.
    ///
    /// Conflicting rows are ignored, never overwritten: read/saved state and
    /// the first-seen title and content survive any later re-fetch. Returns
    /// the number of rows actually inserted.
    pub async fn insert_articles_if_absent(
        &self,
        articles: &[Article],
    ) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut total_inserted: usize = 0;

        for chunk in articles.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
                "INSERT OR IGNORE INTO articles ({ARTICLE_COLUMNS}) "
            ));

            builder.push_values(chunk, |mut b, article| {
                b.push_bind(&article.id)
                    .push_bind(&article.guid)
                    .push_bind(&article.title)
                    .push_bind(&article.summary)
                    .push_bind(&article.content)
                    .push_bind(&article.link)
                    .push_bind(&article.author)
                    .push_bind(article.published)
                    .push_bind(&article.feed_id)
                    .push_bind(&article.feed_title)
                    .push_bind(&article.image_url)
                    .push_bind(article.is_read)
                    .push_bind(article.is_saved);
            });

            let result = builder.build().execute(&mut *tx).await?;
            total_inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Overwrite the stored row for `article.id`. Returns false if no such article.
    pub async fn update_article(&self, article: &Article) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET
                guid = ?, title = ?, summary = ?, content = ?, link = ?, author = ?,
                published = ?, feed_id = ?, feed_title = ?, image_url = ?,
                is_read = ?, is_saved = ?
            WHERE id = ?
        "#,
        )
        .bind(&article.guid)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(&article.link)
        .bind(&article.author)
        .bind(article.published)
        .bind(&article.feed_id)
        .bind(&article.feed_title)
        .bind(&article.image_url)
        .bind(article.is_read)
        .bind(article.is_saved)
        .bind(&article.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_article(&self, article_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every article of a feed, returning how many were removed.
    pub async fn delete_articles_for_feed(&self, feed_id: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM articles WHERE feed_id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_read(&self, article_id: &str, is_read: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE articles SET is_read = ? WHERE id = ?")
            .bind(is_read)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_saved(&self, article_id: &str, is_saved: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE articles SET is_saved = ? WHERE id = ?")
            .bind(is_saved)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Article Queries
    // ========================================================================
    //
    // Every list is ordered newest-published first and capped at MAX_ARTICLES.

    pub async fn list_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        self.query_articles("1 = 1", None).await
    }

    pub async fn articles_for_feed(&self, feed_id: &str) -> Result<Vec<Article>, DatabaseError> {
        self.query_articles("feed_id = ?", Some(feed_id)).await
    }

    pub async fn saved_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        self.query_articles("is_saved = 1", None).await
    }

    pub async fn unread_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        self.query_articles("is_read = 0", None).await
    }

    async fn query_articles(
        &self,
        filter: &str,
        bind: Option<&str>,
    ) -> Result<Vec<Article>, DatabaseError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} \
             ORDER BY published DESC LIMIT {MAX_ARTICLES}"
        );
        let mut query = sqlx::query_as::<_, Article>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn get_article(&self, article_id: &str) -> Result<Option<Article>, DatabaseError> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    pub async fn get_article_by_guid(
        &self,
        feed_id: &str,
        guid: &str,
    ) -> Result<Option<Article>, DatabaseError> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE feed_id = ? AND guid = ?"
        ))
        .bind(feed_id)
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    pub async fn unread_count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE is_read = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

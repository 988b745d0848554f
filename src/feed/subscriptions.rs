use thiserror::Error;

use crate::feed::discovery::FeedDiscoverer;
use crate::feed::favicon::FaviconResolver;
use crate::feed::fetcher::FeedFetcher;
use crate::http::HttpTransport;
use crate::storage::{Database, DatabaseError, Feed};
use crate::util::normalize_url;

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Already subscribed to {0}")]
    AlreadySubscribed(String),
    #[error("No RSS or Atom feed found at {0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// User-facing subscription and article-state operations.
#[derive(Clone)]
pub struct Subscriptions<T> {
    db: Database,
    discoverer: FeedDiscoverer<T>,
    favicons: FaviconResolver<T>,
    fetcher: FeedFetcher<T>,
}

impl<T: HttpTransport> Subscriptions<T> {
    pub fn new(
        db: Database,
        discoverer: FeedDiscoverer<T>,
        favicons: FaviconResolver<T>,
        fetcher: FeedFetcher<T>,
    ) -> Self {
        Self {
            db,
            discoverer,
            favicons,
            fetcher,
        }
    }

    /// Subscribe to the feed at (or advertised by) `url`.
    ///
    /// Both the typed URL and the discovered feed URL are checked against
    /// existing subscriptions. The first refresh runs before returning; its
    /// failure is recorded on the feed rather than returned.
    pub async fn add_feed(&self, url: &str) -> Result<Feed, SubscribeError> {
        let normalized = normalize_url(url);
        if self.db.get_feed_by_url(&normalized).await?.is_some() {
            return Err(SubscribeError::AlreadySubscribed(normalized));
        }

        let discovered = self
            .discoverer
            .discover(url)
            .await
            .ok_or_else(|| SubscribeError::NotFound(url.trim().to_string()))?;

        if self
            .db
            .get_feed_by_url(&discovered.feed_url)
            .await?
            .is_some()
        {
            return Err(SubscribeError::AlreadySubscribed(discovered.feed_url));
        }

        let icon_source = discovered.site_url.as_deref().unwrap_or(&normalized);
        let favicon_url = self.favicons.resolve_favicon(icon_source).await;

        let mut feed = Feed::new(discovered.title, discovered.feed_url);
        feed.site_url = discovered.site_url;
        feed.favicon_url = favicon_url;
        self.db.upsert_feed(&feed).await?;
        tracing::info!(feed_id = %feed.id, url = %feed.feed_url, "Subscribed to feed");

        let first = self.fetcher.refresh_feed(&feed).await;
        if !first.success {
            tracing::warn!(
                feed_id = %feed.id,
                error = first.error.as_deref().unwrap_or_default(),
                "Initial refresh failed"
            );
        }

        Ok(self.db.get_feed(&feed.id).await?.unwrap_or(feed))
    }

    /// Unsubscribe, dropping the feed's articles. Returns false if unknown.
    pub async fn remove_feed(&self, feed_id: &str) -> Result<bool, DatabaseError> {
        let removed_articles = self.db.delete_articles_for_feed(feed_id).await?;
        let removed = self.db.delete_feed(feed_id).await?;
        if removed {
            tracing::info!(feed_id, removed_articles, "Unsubscribed from feed");
        }
        Ok(removed)
    }

    pub async fn set_favorite(&self, feed_id: &str, is_favorite: bool) -> Result<(), DatabaseError> {
        self.db.set_favorite(feed_id, is_favorite).await
    }

    pub async fn mark_read(&self, article_id: &str, is_read: bool) -> Result<(), DatabaseError> {
        self.db.set_read(article_id, is_read).await
    }

    pub async fn set_saved(&self, article_id: &str, is_saved: bool) -> Result<(), DatabaseError> {
        self.db.set_saved(article_id, is_saved).await
    }
}

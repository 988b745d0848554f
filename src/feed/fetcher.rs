use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::config::RefreshConfig;
use crate::feed::parser::{parse_feed, ParseError};
use crate::http::{HttpTransport, TransportError};
use crate::storage::{Database, DatabaseError, Feed};

/// Errors that can occur while refreshing one feed.
///
/// Never escapes [`FeedFetcher::refresh_feed`]: the message is recorded on
/// the feed and reported in the [`FeedRefreshResult`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP response with non-2xx status code
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("{0}")]
    Transport(#[from] TransportError),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Database(#[from] DatabaseError),
}

/// Outcome of refreshing a single feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRefreshResult {
    pub feed_id: String,
    pub success: bool,
    pub error: Option<String>,
    /// Epoch millis when the refresh finished (or failed)
    pub timestamp: i64,
    /// Articles that were new to the store
    pub inserted: usize,
}

/// Fan-out limits for batch refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshLimits {
    pub concurrency: usize,
    pub background_concurrency: usize,
    pub background_max_feeds: usize,
}

impl Default for RefreshLimits {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RefreshLimits {
    fn from(config: &RefreshConfig) -> Self {
        // A zero limit would stall buffer_unordered forever
        Self {
            concurrency: config.concurrency.max(1),
            background_concurrency: config.background_concurrency.max(1),
            background_max_feeds: config.background_max_feeds,
        }
    }
}

/// Fetches feeds, parses them and stores new articles.
#[derive(Clone)]
pub struct FeedFetcher<T> {
    db: Database,
    transport: T,
    limits: RefreshLimits,
}

impl<T: HttpTransport> FeedFetcher<T> {
    pub fn new(db: Database, transport: T, limits: RefreshLimits) -> Self {
        Self {
            db,
            transport,
            limits,
        }
    }

    pub fn limits(&self) -> RefreshLimits {
        self.limits
    }

    /// Refresh one feed.
    ///
    /// On success new articles are inserted (existing ones are left alone),
    /// title/site/summary are synced when they changed upstream, and the
    /// refresh time is recorded with any previous error cleared. On failure
    /// the error message is recorded on the feed. Never returns an error.
    pub async fn refresh_feed(&self, feed: &Feed) -> FeedRefreshResult {
        match self.fetch_and_store(feed).await {
            Ok((inserted, timestamp)) => {
                tracing::debug!(feed_id = %feed.id, inserted, "Feed refreshed");
                FeedRefreshResult {
                    feed_id: feed.id.clone(),
                    success: true,
                    error: None,
                    timestamp,
                    inserted,
                }
            }
            Err(e) => {
                let timestamp = Utc::now().timestamp_millis();
                let message = error_message(&e);
                tracing::warn!(feed_id = %feed.id, url = %feed.feed_url, error = %message, "Feed refresh failed");
                if let Err(db_err) = self.db.mark_refresh_error(&feed.id, &message).await {
                    tracing::warn!(feed_id = %feed.id, error = %db_err, "Failed to record refresh error");
                }
                FeedRefreshResult {
                    feed_id: feed.id.clone(),
                    success: false,
                    error: Some(message),
                    timestamp,
                    inserted: 0,
                }
            }
        }
    }

    /// Returns the inserted count and the completion time recorded on the feed.
    async fn fetch_and_store(&self, feed: &Feed) -> Result<(usize, i64), FetchError> {
        let response = self.transport.get(&feed.feed_url).await?;
        if !response.is_success() {
            return Err(FetchError::HttpStatus(response.status));
        }

        let parsed = parse_feed(response.body.as_slice(), &feed.id, &feed.feed_url)?;

        if parsed.title != feed.title || parsed.site_url != feed.site_url {
            // Re-read so a favorite toggle made during the fetch isn't clobbered
            if let Some(mut current) = self.db.get_feed(&feed.id).await? {
                current.title = parsed.title.clone();
                current.site_url = parsed.site_url.clone().or(current.site_url);
                current.summary = parsed.description.clone().or(current.summary);
                self.db.update_feed(&current).await?;
            }
        }

        let inserted = self.db.insert_articles_if_absent(&parsed.articles).await?;
        let completed_at = Utc::now().timestamp_millis();
        self.db.mark_refresh_success(&feed.id, completed_at).await?;
        Ok((inserted, completed_at))
    }

    /// Refresh every stored feed, at most `concurrency` at a time.
    ///
    /// The feed list is read once up front. Returns after every refresh has
    /// finished, in completion order. Only failing to read the list is an error.
    pub async fn refresh_all(&self) -> Result<Vec<FeedRefreshResult>, DatabaseError> {
        let feeds = self.db.list_feeds().await?;
        Ok(self
            .refresh_batch(feeds, self.limits.concurrency, "foreground")
            .await)
    }

    /// Refresh the feeds the background job should cover this run.
    ///
    /// See [`select_background_feeds`](Self::select_background_feeds).
    pub async fn refresh_for_background(
        &self,
        max_feeds: usize,
    ) -> Result<Vec<FeedRefreshResult>, DatabaseError> {
        let feeds = self.select_background_feeds(max_feeds).await?;
        Ok(self
            .refresh_batch(feeds, self.limits.background_concurrency, "background")
            .await)
    }

    /// Favorites first (stalest first), then the stalest non-favorites, up to
    /// `max_feeds` in total. Never-refreshed feeds count as stalest.
    pub async fn select_background_feeds(
        &self,
        max_feeds: usize,
    ) -> Result<Vec<Feed>, DatabaseError> {
        let mut selected = self.db.favorite_feeds_for_refresh().await?;
        selected.truncate(max_feeds);

        let remaining = max_feeds - selected.len();
        if remaining > 0 {
            selected.extend(self.db.oldest_non_favorite_feeds(remaining).await?);
        }
        Ok(selected)
    }

    async fn refresh_batch(
        &self,
        feeds: Vec<Feed>,
        concurrency: usize,
        kind: &'static str,
    ) -> Vec<FeedRefreshResult> {
        if feeds.is_empty() {
            tracing::debug!(kind, "No feeds to refresh");
            return Vec::new();
        }

        let started = Instant::now();
        let total = feeds.len();
        let fetcher = self.clone();

        let results: Vec<FeedRefreshResult> = stream::iter(feeds)
            .map(move |feed| {
                let fetcher = fetcher.clone();
                async move { fetcher.refresh_feed(&feed).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            kind,
            succeeded,
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed refresh batch complete"
        );
        results
    }
}

fn error_message(err: &FetchError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

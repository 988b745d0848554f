use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::conditions::ConditionsProbe;
use crate::feed::FeedFetcher;
use crate::http::HttpTransport;
use crate::storage::{DatabaseError, Preferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Done for this period
    Success,
    /// Try again after backoff
    Retry,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A unit of periodic background work.
pub trait Job: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = JobOutcome> + Send;
}

/// Refreshes a bounded, favorites-first batch of feeds in the background.
pub struct FeedRefreshJob<T> {
    fetcher: FeedFetcher<T>,
    preferences: Preferences,
    conditions: Arc<dyn ConditionsProbe>,
    max_feeds: usize,
}

impl<T: HttpTransport> FeedRefreshJob<T> {
    pub fn new(
        fetcher: FeedFetcher<T>,
        preferences: Preferences,
        conditions: Arc<dyn ConditionsProbe>,
    ) -> Self {
        let max_feeds = fetcher.limits().background_max_feeds;
        Self {
            fetcher,
            preferences,
            conditions,
            max_feeds,
        }
    }

    async fn try_run(&self) -> Result<JobOutcome, JobError> {
        if !self.preferences.background_refresh_enabled().await? {
            tracing::debug!("Background refresh disabled, nothing to do");
            return Ok(JobOutcome::Success);
        }

        if self.preferences.wifi_only().await? && !self.conditions.current().is_unmetered() {
            tracing::info!("Background refresh waiting for an unmetered network");
            return Ok(JobOutcome::Retry);
        }

        let results = self.fetcher.refresh_for_background(self.max_feeds).await?;
        self.preferences
            .set_last_refresh_time(Utc::now().timestamp_millis())
            .await?;

        tracing::info!(
            refreshed = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Background refresh complete"
        );
        Ok(JobOutcome::Success)
    }
}

impl<T: HttpTransport> Job for FeedRefreshJob<T> {
    /// Per-feed failures still count as success; only store errors retry.
    async fn run(&self) -> JobOutcome {
        match self.try_run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Background refresh failed, will retry");
                JobOutcome::Retry
            }
        }
    }
}

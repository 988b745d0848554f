use std::sync::Arc;

use thiserror::Error;

use crate::background::{ConditionsProbe, FeedRefreshJob, SchedulePolicy, StaticConditions};
use crate::config::Config;
use crate::feed::{FaviconResolver, FeedDiscoverer, FeedFetcher, RefreshLimits, Subscriptions};
use crate::http::{HttpTransport, ReqwestTransport, TransportError};
use crate::storage::{Database, DatabaseError, Preferences};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] TransportError),
}

/// Wires the store, transport and configuration into the service objects.
///
/// Every accessor hands out a cheap clone sharing the same pool and client.
#[derive(Clone)]
pub struct AppContext<T = ReqwestTransport> {
    db: Database,
    transport: T,
    config: Config,
    conditions: Arc<dyn ConditionsProbe>,
}

impl AppContext<ReqwestTransport> {
    /// Open the database at `db_path` and build the production HTTP client.
    pub async fn open(db_path: &str, config: Config) -> Result<Self, ContextError> {
        let db = Database::open(db_path).await?;
        let transport = ReqwestTransport::new(&config.http)?;
        Ok(Self::with_transport(db, transport, config))
    }
}

impl<T: HttpTransport> AppContext<T> {
    pub fn with_transport(db: Database, transport: T, config: Config) -> Self {
        let conditions: Arc<dyn ConditionsProbe> =
            Arc::new(StaticConditions::from(&config.background));
        Self {
            db,
            transport,
            config,
            conditions,
        }
    }

    /// Replace the device-conditions source used by background work.
    pub fn with_conditions(mut self, conditions: Arc<dyn ConditionsProbe>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn conditions(&self) -> Arc<dyn ConditionsProbe> {
        Arc::clone(&self.conditions)
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::new(self.db.clone())
    }

    pub fn fetcher(&self) -> FeedFetcher<T> {
        FeedFetcher::new(
            self.db.clone(),
            self.transport.clone(),
            RefreshLimits::from(&self.config.refresh),
        )
    }

    pub fn discoverer(&self) -> FeedDiscoverer<T> {
        FeedDiscoverer::new(self.transport.clone())
    }

    pub fn subscriptions(&self) -> Subscriptions<T> {
        Subscriptions::new(
            self.db.clone(),
            self.discoverer(),
            FaviconResolver::new(self.transport.clone()),
            self.fetcher(),
        )
    }

    pub fn refresh_job(&self) -> FeedRefreshJob<T> {
        FeedRefreshJob::new(self.fetcher(), self.preferences(), self.conditions())
    }

    pub fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy::from(&self.config.background)
    }
}

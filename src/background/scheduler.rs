use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::conditions::ConditionsProbe;
use super::job::{Job, JobOutcome};
use crate::config::BackgroundConfig;

/// Retry delays double from the minimum up to this cap.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60 * 60);
/// Shortest period, and shortest wait after a successful run.
pub const MIN_PERIOD: Duration = Duration::from_secs(60);
/// How often unmet constraints are re-checked.
pub const CONSTRAINT_POLL: Duration = Duration::from_secs(60);

/// Timing for a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    pub period: Duration,
    /// The next run may start this much before `period` elapses
    pub flex: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub constraint_poll: Duration,
}

impl SchedulePolicy {
    /// Delay after a successful run: the start of the flex window.
    pub fn success_delay(&self) -> Duration {
        self.period.saturating_sub(self.flex).max(MIN_PERIOD)
    }

    /// Exponential backoff for the nth consecutive retry (0-based), capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self::from(&BackgroundConfig::default())
    }
}

impl From<&BackgroundConfig> for SchedulePolicy {
    fn from(config: &BackgroundConfig) -> Self {
        Self {
            period: Duration::from_secs(config.interval_minutes.saturating_mul(60)).max(MIN_PERIOD),
            flex: Duration::from_secs(config.flex_minutes.saturating_mul(60)),
            min_backoff: Duration::from_secs(config.min_backoff_secs.max(1)),
            max_backoff: MAX_BACKOFF,
            constraint_poll: CONSTRAINT_POLL,
        }
    }
}

/// Runs named periodic jobs on the tokio runtime, at most one per name.
///
/// Dropping the scheduler cancels every job it owns.
pub struct JobScheduler {
    conditions: Arc<dyn ConditionsProbe>,
    jobs: HashMap<String, JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(conditions: Arc<dyn ConditionsProbe>) -> Self {
        Self {
            conditions,
            jobs: HashMap::new(),
        }
    }

    /// Start `job` under `name`, replacing any job already running under it.
    pub fn schedule<J: Job>(&mut self, name: &str, job: J, policy: SchedulePolicy) {
        if let Some(previous) = self.jobs.remove(name) {
            previous.abort();
            tracing::debug!(job = name, "Replaced scheduled job");
        }
        let handle = tokio::spawn(run_periodic(
            name.to_string(),
            job,
            policy,
            Arc::clone(&self.conditions),
        ));
        self.jobs.insert(name.to_string(), handle);
        tracing::info!(job = name, period_secs = policy.period.as_secs(), "Scheduled job");
    }

    /// Stop the job under `name`. Returns false if none was scheduled.
    pub fn cancel(&mut self, name: &str) -> bool {
        match self.jobs.remove(name) {
            Some(handle) => {
                handle.abort();
                tracing::info!(job = name, "Cancelled job");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.jobs.get(name).is_some_and(|h| !h.is_finished())
    }

    /// Align the scheduler with an on/off setting.
    ///
    /// An already-running job is kept so its timing is not reset; `make_job`
    /// is only called when a new job has to be started.
    pub fn sync<J: Job>(
        &mut self,
        name: &str,
        enabled: bool,
        policy: SchedulePolicy,
        make_job: impl FnOnce() -> J,
    ) {
        match (enabled, self.is_scheduled(name)) {
            (true, false) => self.schedule(name, make_job(), policy),
            (false, _) => {
                self.cancel(name);
            }
            (true, true) => {}
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for handle in self.jobs.values() {
            handle.abort();
        }
    }
}

async fn run_periodic<J: Job>(
    name: String,
    job: J,
    policy: SchedulePolicy,
    conditions: Arc<dyn ConditionsProbe>,
) {
    let mut attempt = 0u32;
    loop {
        while !conditions.current().allows_background_work() {
            tracing::debug!(job = %name, "Constraints not met, waiting");
            tokio::time::sleep(policy.constraint_poll).await;
        }

        let delay = match job.run().await {
            JobOutcome::Success => {
                attempt = 0;
                policy.success_delay()
            }
            JobOutcome::Retry => {
                let delay = policy.retry_delay(attempt);
                attempt = attempt.saturating_add(1);
                tracing::debug!(job = %name, attempt, delay_secs = delay.as_secs(), "Job asked to retry");
                delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

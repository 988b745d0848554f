//! Periodic background refresh.
//!
//! [`JobScheduler`] owns the timing (period, flex window, exponential retry
//! backoff, connectivity and battery constraints). [`FeedRefreshJob`] decides
//! what one run does based on the user's preferences.

pub mod conditions;
pub mod job;
pub mod scheduler;

pub use conditions::{ConditionsProbe, Connectivity, DeviceConditions, StaticConditions};
pub use job::{FeedRefreshJob, Job, JobError, JobOutcome};
pub use scheduler::{JobScheduler, SchedulePolicy};

/// Unique name of the periodic feed refresh job.
pub const FEED_REFRESH_JOB: &str = "feed_refresh";

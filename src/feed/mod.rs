//! The feed ingestion pipeline.
//!
//! - [`parser`] - streaming RSS/Atom parsing into articles
//! - [`discovery`] - turning a typed URL into a feed URL
//! - [`favicon`] - site icon lookup
//! - [`fetcher`] - single-feed refresh and bounded-concurrency batches
//! - [`subscriptions`] - subscribe/unsubscribe and article state

pub mod discovery;
pub mod favicon;
pub mod fetcher;
pub mod parser;
pub mod subscriptions;

pub use discovery::{DiscoveredFeed, FeedDiscoverer, UrlGuard};
pub use favicon::FaviconResolver;
pub use fetcher::{FeedFetcher, FeedRefreshResult, FetchError, RefreshLimits};
pub use parser::{parse_feed, parse_feed_info, FeedInfo, ParseError, ParsedFeed};
pub use subscriptions::{SubscribeError, Subscriptions};

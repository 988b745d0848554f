use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::feed::parser::{parse_feed_info, ParseError};
use crate::http::{HttpTransport, TransportError};
use crate::util::{normalize_url, strip_control_chars, validate_url, UrlValidationError};

/// A feed found from user input, ready to be subscribed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFeed {
    /// URL of the RSS/Atom document itself
    pub feed_url: String,
    pub title: String,
    /// The site the feed belongs to, if known
    pub site_url: Option<String>,
}

/// Why a discovery step missed. Logged, never returned to callers.
#[derive(Debug, Error)]
enum DiscoveryError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("content type {0:?} is not a feed")]
    NotFeedContentType(Option<String>),
    #[error("not a feed: {0}")]
    Parse(#[from] ParseError),
    #[error("no RSS/Atom <link> in page")]
    NoFeedLink,
}

/// Outcome of one discovery step.
enum Step {
    Found(DiscoveredFeed),
    /// The step missed. `page` is the body it retrieved, for the next step to reuse.
    Miss {
        reason: DiscoveryError,
        page: Option<Vec<u8>>,
    },
}

impl Step {
    fn miss(reason: impl Into<DiscoveryError>) -> Self {
        Step::Miss {
            reason: reason.into(),
            page: None,
        }
    }
}

/// Gate applied to every URL before it is fetched.
pub type UrlGuard = fn(&str) -> Result<String, UrlValidationError>;

/// Turns a user-typed URL into a feed URL.
///
/// Tries the URL as a feed first, then scans it as an HTML page for an
/// advertised RSS/Atom `<link>`. Every URL, including one discovered in a
/// page, passes the SSRF gate before it is fetched.
#[derive(Clone)]
pub struct FeedDiscoverer<T> {
    transport: T,
    guard: UrlGuard,
}

impl<T: HttpTransport> FeedDiscoverer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_url_guard(transport, validate_url)
    }

    /// Use a custom URL gate instead of [`validate_url`].
    pub fn with_url_guard(transport: T, guard: UrlGuard) -> Self {
        Self { transport, guard }
    }

    /// Find the feed behind `raw_url`. Any failure collapses to `None`.
    pub async fn discover(&self, raw_url: &str) -> Option<DiscoveredFeed> {
        let url = match (self.guard)(&normalize_url(raw_url)) {
            Ok(url) => url,
            Err(e) => {
                tracing::info!(url = %raw_url, error = %e, "Rejected discovery URL");
                return None;
            }
        };

        let page = match self.try_direct(&url).await {
            Step::Found(feed) => return Some(feed),
            Step::Miss { reason, page } => {
                tracing::debug!(url = %url, reason = %reason, "Not a direct feed");
                page
            }
        };

        match self.try_html(&url, page).await {
            Step::Found(feed) => Some(feed),
            Step::Miss { reason, .. } => {
                tracing::info!(url = %url, reason = %reason, "No feed found");
                None
            }
        }
    }

    /// Step 1: the URL is itself a feed.
    async fn try_direct(&self, url: &str) -> Step {
        let response = match self.transport.get(url).await {
            Ok(r) => r,
            Err(e) => return Step::miss(e),
        };
        if !response.is_success() {
            return Step::miss(DiscoveryError::HttpStatus(response.status));
        }

        // A missing Content-Type is worth a parse attempt
        let looks_like_feed = response
            .content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("xml") || ct.contains("rss") || ct.contains("atom")
            })
            .unwrap_or(true);

        if !looks_like_feed {
            return Step::Miss {
                reason: DiscoveryError::NotFeedContentType(response.content_type),
                page: Some(response.body),
            };
        }

        // Any document that parses counts, even without a title: parse_feed_info
        // substitutes "Untitled Feed" rather than failing
        match parse_feed_info(response.body.as_slice()) {
            Ok(info) => Step::Found(DiscoveredFeed {
                feed_url: url.to_string(),
                title: info.title,
                site_url: info.link.map(|l| strip_control_chars(&l).into_owned()),
            }),
            Err(e) => Step::Miss {
                reason: e.into(),
                page: Some(response.body),
            },
        }
    }

    /// Step 2: the URL is a page advertising a feed.
    async fn try_html(&self, page_url: &str, page: Option<Vec<u8>>) -> Step {
        let body = match page {
            Some(body) => body,
            None => match self.fetch_ok(page_url).await {
                Ok(body) => body,
                Err(e) => return Step::miss(e),
            },
        };

        let html = String::from_utf8_lossy(&body);
        let Some(href) = find_feed_link(&html) else {
            return Step::miss(DiscoveryError::NoFeedLink);
        };

        let feed_url = match (self.guard)(&resolve_url(href, page_url)) {
            Ok(u) => u,
            Err(e) => return Step::miss(e),
        };

        let feed_body = match self.fetch_ok(&feed_url).await {
            Ok(b) => b,
            Err(e) => return Step::miss(e),
        };

        match parse_feed_info(feed_body.as_slice()) {
            Ok(info) => Step::Found(DiscoveredFeed {
                feed_url,
                title: info.title,
                site_url: Some(page_url.to_string()),
            }),
            Err(e) => Step::miss(e),
        }
    }

    async fn fetch_ok(&self, url: &str) -> Result<Vec<u8>, DiscoveryError> {
        let response = self.transport.get(url).await?;
        if !response.is_success() {
            return Err(DiscoveryError::HttpStatus(response.status));
        }
        Ok(response.body)
    }
}

/// First `<link>` advertising an RSS or Atom document, as its raw `href`.
///
/// Attribute runs are bounded so a pathological page can't make the scan
/// quadratic.
fn find_feed_link(html: &str) -> Option<&str> {
    static LINK_TAG: OnceLock<Regex> = OnceLock::new();
    static HREF: OnceLock<Regex> = OnceLock::new();

    let link_tag = LINK_TAG.get_or_init(|| {
        Regex::new(r#"(?i)<link\s+[^>]{0,500}type=["']application/(rss|atom)\+xml["'][^>]{0,500}>"#)
            .expect("valid link regex")
    });
    let href = HREF.get_or_init(|| {
        Regex::new(r#"(?i)href=["']([^"']+)["']"#).expect("valid href regex")
    });

    link_tag
        .find_iter(html)
        .find_map(|tag| href.captures(tag.as_str()).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim())
}

/// Resolves a potentially relative href against the page it came from.
fn resolve_url(href: &str, base_url: &str) -> String {
    // Protocol-relative hrefs go through the URL parser, never string glue
    if let Some(rest) = href.strip_prefix("//") {
        if let Ok(parsed) = url::Url::parse(&format!("https://{}", rest)) {
            return parsed.to_string();
        }
    }

    match url::Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_owned(),
    }
}

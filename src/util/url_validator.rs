use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Hostnames that always resolve to the local machine or network.
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
];

/// Reasons a URL is rejected as a feed source.
///
/// The `Display` text is the user-facing reason string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("URL cannot be empty")]
    Empty,
    #[error("Invalid URL format")]
    InvalidFormat,
    #[error("Malformed URL: {0}")]
    Malformed(String),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Blocked hostname: {0}")]
    BlockedHostname(String),
    /// The URL points to a private, loopback or link-local address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
}

/// Canonical form used for storage and dedup lookups.
///
/// Trims, keeps explicit http/https URLs as-is, upgrades protocol-relative
/// `//host` to https, and prefixes `https://` on anything else.
///
/// ```
/// use feedline::util::normalize_url;
///
/// assert_eq!(normalize_url(" example.com/feed "), "https://example.com/feed");
/// assert_eq!(normalize_url("//cdn.example.com/rss"), "https://cdn.example.com/rss");
/// assert_eq!(normalize_url("http://example.com"), "http://example.com");
/// ```
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if has_http_prefix(trimmed) {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", trimmed)
    }
}

/// Validates a URL string for use as a feed source.
///
/// Rejects non-HTTP(S) schemes, blocked local hostnames and literal
/// private/loopback/link-local IPs. Returns the trimmed URL on success.
///
/// Hostnames are not resolved, so a public name pointing at a private
/// address passes.
///
/// # Examples
///
/// ```
/// use feedline::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<String, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    if !looks_like_web_url(trimmed) && !has_http_prefix(trimmed) {
        return Err(UrlValidationError::InvalidFormat);
    }

    let url = Url::parse(trimmed).map_err(|e| UrlValidationError::Malformed(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = match url.host_str() {
        Some(h) if !h.trim().is_empty() => h.to_ascii_lowercase(),
        _ => return Err(UrlValidationError::MissingHost),
    };

    if BLOCKED_HOSTNAMES.contains(&host.as_str()) {
        return Err(UrlValidationError::BlockedHostname(host));
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(&host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(trimmed.to_string())
}

fn has_http_prefix(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Loose shape check: optional scheme, a dotted or bracketed host, optional rest.
fn looks_like_web_url(s: &str) -> bool {
    static WEB_URL: OnceLock<Regex> = OnceLock::new();
    WEB_URL
        .get_or_init(|| {
            Regex::new(
                r"(?i)^(?:[a-z][a-z0-9+.\-]*://)?(?:[^\s/?#@]+@)?(?:\[[0-9a-f:.]+\]|[a-z0-9\-]+(?:\.[a-z0-9\-]+)+)(?::\d{1,5})?(?:[/?#]\S*)?$",
            )
            .expect("static regex")
        })
        .is_match(s)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

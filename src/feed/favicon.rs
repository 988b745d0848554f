use url::Url;

use crate::http::HttpTransport;
use crate::util::normalize_url;

/// Well-known icon locations, probed in order.
const ICON_PATHS: &[&str] = &["/favicon.ico", "/favicon.png", "/apple-touch-icon.png"];

/// Finds an icon URL for a site.
#[derive(Clone)]
pub struct FaviconResolver<T> {
    transport: T,
}

impl<T: HttpTransport> FaviconResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// HEAD-probe the site's origin for a well-known icon path.
    ///
    /// Falls back to Google's favicon service when no probe answers 2xx.
    /// Returns `None` only for blank or unparsable input.
    pub async fn resolve_favicon(&self, site_url: &str) -> Option<String> {
        if site_url.trim().is_empty() {
            return None;
        }

        let parsed = match Url::parse(&normalize_url(site_url)) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!(url = %site_url, error = %e, "Unparsable site URL for favicon");
                return None;
            }
        };
        let host = parsed.host_str()?.to_string();
        let origin = parsed.origin().ascii_serialization();

        for icon_path in ICON_PATHS {
            let candidate = format!("{}{}", origin, icon_path);
            match self.transport.head(&candidate).await {
                Ok(status) if (200..300).contains(&status) => return Some(candidate),
                Ok(status) => tracing::trace!(url = %candidate, status, "Favicon probe missed"),
                Err(e) => tracing::trace!(url = %candidate, error = %e, "Favicon probe failed"),
            }
        }

        Some(fallback_favicon_url(&host))
    }
}

fn fallback_favicon_url(host: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={}&sz=64", host)
}

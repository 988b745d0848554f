//! HTTP transport used by discovery, favicon lookup and feed refresh.
//!
//! The pipeline talks to the network only through [`HttpTransport`], so tests
//! can substitute an in-process fake. [`ReqwestTransport`] is the production
//! implementation.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::config::HttpConfig;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A completed GET. `body` is empty for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpTransport: Clone + Send + Sync + 'static {
    fn get(&self, url: &str)
        -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// HEAD request returning only the status code.
    fn head(&self, url: &str) -> impl Future<Output = Result<u16, TransportError>> + Send;
}

/// `reqwest`-backed transport with bounded redirects, timeouts and a body cap.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(redirect_policy())
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects");
        }
        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }
        // Redirects must not downgrade into a non-web scheme
        if !matches!(url.scheme(), "http" | "https") {
            return attempt.error("Redirect to unsupported scheme");
        }
        tracing::debug!(to = %url, hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    })
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err)
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let client = self.client.clone();
        let limit = self.max_body_bytes;
        let url = url.to_string();
        async move {
            let response = client.get(&url).send().await.map_err(classify)?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = if status.is_success() {
                read_limited_bytes(response, limit).await?
            } else {
                Vec::new()
            };

            Ok(HttpResponse {
                status: status.as_u16(),
                content_type,
                body,
            })
        }
    }

    fn head(&self, url: &str) -> impl Future<Output = Result<u16, TransportError>> + Send {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            let response = client.head(&url).send().await.map_err(classify)?;
            Ok(response.status().as_u16())
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    // Fast path: trust an honest Content-Length
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(max_body_bytes: usize) -> ReqwestTransport {
        ReqwestTransport::new(&HttpConfig {
            max_body_bytes,
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_status_type_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss/>")
                    .insert_header("Content-Type", "application/rss+xml; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let resp = transport(1024)
            .get(&format!("{}/feed", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
        assert_eq!(
            resp.content_type.as_deref(),
            Some("application/rss+xml; charset=utf-8")
        );
        assert_eq!(resp.body, b"<rss/>");
    }

    #[tokio::test]
    async fn test_get_non_success_has_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let resp = transport(1024).get(&server.uri()).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_limit_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&server)
            .await;

        let result = transport(1024).get(&server.uri()).await;
        assert!(matches!(result, Err(TransportError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_head_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/favicon.ico"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let t = transport(1024);
        assert_eq!(
            t.head(&format!("{}/favicon.ico", server.uri())).await.unwrap(),
            200
        );
        assert_eq!(
            t.head(&format!("{}/other.ico", server.uri())).await.unwrap(),
            404
        );
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let t = ReqwestTransport::new(&HttpConfig {
            timeout_secs: 1,
            ..HttpConfig::default()
        })
        .unwrap();
        assert!(matches!(
            t.get(&server.uri()).await,
            Err(TransportError::Timeout)
        ));
    }
}

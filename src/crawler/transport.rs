//! HTTP transport
//!
//! Every outbound request the fetch chain makes goes through the
//! [`Transport`] trait, so the chain can be driven by an in-process fake in
//! tests and by reqwest in production.

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Generic `Accept` header sent on direct and proxied requests
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Transport-level failures
///
/// None of these are terminal for a URL; the fetch chain escalates on them.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// A response as seen by the fetch chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Size of the body in bytes as received
    pub byte_size: usize,
    pub final_url: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or_default()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP seam
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a GET request
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;

    /// POSTs a JSON body
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed so that 3xx responses are recorded as such;
/// the redirect target is discovered as a link instead.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Bound on every request
///
/// # Example
///
/// ```no_run
/// use spiderfrog::config::UserAgentConfig;
/// use spiderfrog::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SpiderFrog".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn read(response: reqwest::Response) -> Result<RawResponse, TransportError> {
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            byte_size: bytes.len(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            final_url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, TransportError> {
        let response = self.client.post(url).json(body).send().await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        assert_eq!(
            create_test_config().header_value(),
            "TestCrawler/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut response = RawResponse::default();
        response
            .headers
            .insert("content-type".into(), "text/html".into());
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.content_type(), "text/html");
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn test_is_success() {
        let mut response = RawResponse {
            status: 204,
            ..RawResponse::default()
        };
        assert!(response.is_success());
        response.status = 301;
        assert!(!response.is_success());
    }
}

//! Out-of-band retrieval
//!
//! Two collaborators sit behind HTTP endpoints:
//! - the server delegate fetches and analyzes a URL itself and answers with a
//!   complete page record
//! - the headless renderer loads the URL in a browser with a randomized
//!   fingerprint and answers with the rendered document

use crate::crawler::transport::{RawResponse, Transport, TransportError};
use crate::state::{ExtractionRule, FetchSource, PageRecord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1366, 768), (1536, 864), (1440, 900), (1280, 720)];

const REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
];

/// Failure of a delegated strategy
#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed delegate response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Delegate could not retrieve the page")]
    NoResponse,

    #[error("Renderer returned an empty document")]
    EmptyDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Browser fingerprint for one headless render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    pub referer: String,
    /// Extra wait after network idle before capturing the document
    pub settle_delay_ms: u64,
}

impl RenderProfile {
    /// Picks a random user agent, viewport and referrer, and a settle delay
    /// in `min_ms..=max_ms`
    pub fn random(min_ms: u64, max_ms: u64) -> Self {
        let mut rng = rand::thread_rng();
        let (width, height) = VIEWPORTS.choose(&mut rng).copied().unwrap_or((1366, 768));

        Self {
            user_agent: USER_AGENTS
                .choose(&mut rng)
                .copied()
                .unwrap_or_default()
                .to_string(),
            viewport: Viewport { width, height },
            referer: REFERERS.choose(&mut rng).copied().unwrap_or_default().to_string(),
            settle_delay_ms: rng.gen_range(min_ms..=max_ms.max(min_ms)),
        }
    }

    fn request_body(&self, url: &str) -> serde_json::Value {
        json!({
            "url": url,
            "userAgent": self.user_agent,
            "viewport": self.viewport,
            "referer": self.referer,
            "waitUntil": "networkidle2",
            "settleDelayMs": self.settle_delay_ms,
        })
    }
}

/// Hands a URL and the extraction rules to the server delegate
///
/// # Returns
///
/// * `Ok(PageRecord)` - The delegate's record, with a non-zero status
/// * `Err(DelegationError)` - Transport failure, non-2xx, malformed body, or a
///   record reporting that nothing was retrieved
pub async fn delegate_to_server(
    transport: &dyn Transport,
    endpoint: &str,
    url: &str,
    rules: &[ExtractionRule],
) -> Result<PageRecord, DelegationError> {
    let body = json!({ "url": url, "rules": rules });
    let response = transport.post_json(endpoint, &body).await?;

    if !response.is_success() {
        return Err(DelegationError::Status(response.status));
    }

    let mut record: PageRecord = serde_json::from_str(&response.body)?;
    if record.status == 0 {
        return Err(DelegationError::NoResponse);
    }

    if record.url.is_empty() {
        record.url = url.to_string();
    }
    record.source = FetchSource::Server;
    Ok(record)
}

/// Asks the headless renderer for the fully rendered document
///
/// The renderer does not expose the navigation's real status code, so a
/// completed render is reported as HTTP 200.
pub async fn render_headless(
    transport: &dyn Transport,
    endpoint: &str,
    url: &str,
    profile: &RenderProfile,
) -> Result<RawResponse, DelegationError> {
    let response = transport
        .post_json(endpoint, &profile.request_body(url))
        .await?;

    if !response.is_success() {
        return Err(DelegationError::Status(response.status));
    }
    if response.body.trim().is_empty() {
        return Err(DelegationError::EmptyDocument);
    }

    let mut headers = response.headers;
    headers
        .entry("content-type".to_string())
        .or_insert_with(|| "text/html".to_string());

    Ok(RawResponse {
        status: 200,
        headers,
        byte_size: response.body.len(),
        body: response.body,
        final_url: url.to_string(),
    })
}

//! Fetch strategy chain
//!
//! Retrieval escalates through increasingly expensive strategies until one
//! produces usable content:
//!
//! ```text
//! Direct -> Proxy{0..n} -> Server
//!    \          \             ^
//!     +----------+--> Headless +   (response looked like a bot challenge)
//! ```
//!
//! A challenge goes to the headless renderer when one is configured and
//! falls through to server delegation when rendering is unavailable or fails.
//!
//! The transitions are a pure function ([`next_stage`]) so they can be
//! tested without I/O; [`FetchChain`] drives them against a [`Transport`].

use crate::config::FetchConfig;
use crate::crawler::challenge::{is_challenge, needs_escalation};
use crate::crawler::delegate::{delegate_to_server, render_headless, RenderProfile};
use crate::crawler::transport::{RawResponse, Transport};
use crate::state::{ExtractionRule, FetchSource, PageRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Position in the fetch state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Direct,
    Proxy { attempt: u32 },
    Server,
    Headless,
    Success,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A document retrieved by the direct, proxy or headless strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub response: RawResponse,
    pub source: FetchSource,
    pub latency_ms: u64,
}

/// What running one stage produced
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Nothing usable came back
    Unreachable(String),
    /// A response was obtained
    Response(FetchedDocument),
    /// Every proxy template failed in this attempt
    ProxyExhausted,
    /// The server delegate returned a full record
    Delegated(PageRecord),
}

/// Limits that shape the transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPolicy {
    /// Number of passes over the proxy templates; 0 skips the proxy stage
    pub proxy_attempts: u32,
    /// A server delegate endpoint is configured
    pub server_available: bool,
    /// A headless render endpoint is configured
    pub render_available: bool,
}

/// Final result of the chain for one URL
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A document to analyze locally
    Document(FetchedDocument),
    /// A record analyzed by the server delegate
    Delegated(PageRecord),
    /// Every strategy failed and no response was kept
    Failed { reason: String },
}

/// Backoff before the proxy attempt after `attempt`: `base * 2^attempt`
pub fn proxy_backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn first_proxy_or_server(policy: &ChainPolicy) -> Stage {
    if policy.proxy_attempts > 0 {
        Stage::Proxy { attempt: 0 }
    } else {
        Stage::Server
    }
}

/// Where a challenge response goes: the renderer, else the delegate
fn after_challenge(policy: &ChainPolicy) -> Stage {
    if policy.render_available {
        Stage::Headless
    } else if policy.server_available {
        Stage::Server
    } else {
        Stage::Failed
    }
}

/// Computes the stage that follows `stage` given its outcome
pub fn next_stage(stage: Stage, outcome: &StageOutcome, policy: &ChainPolicy) -> Stage {
    match (stage, outcome) {
        (Stage::Direct, StageOutcome::Response(doc))
            if !needs_escalation(doc.response.status, &doc.response.body) =>
        {
            Stage::Success
        }
        (Stage::Direct, StageOutcome::Response(doc)) if is_challenge(&doc.response.body) => {
            after_challenge(policy)
        }
        (Stage::Direct, _) => first_proxy_or_server(policy),

        (Stage::Proxy { .. }, StageOutcome::Response(doc)) => {
            if is_challenge(&doc.response.body) {
                after_challenge(policy)
            } else {
                Stage::Success
            }
        }
        (Stage::Proxy { attempt }, _) => {
            if attempt + 1 < policy.proxy_attempts {
                Stage::Proxy {
                    attempt: attempt + 1,
                }
            } else {
                Stage::Server
            }
        }

        (Stage::Server, StageOutcome::Delegated(record)) if record.status != 0 => Stage::Success,
        (Stage::Server, _) => Stage::Failed,

        (Stage::Headless, StageOutcome::Response(_)) => Stage::Success,
        // Headless is only reached from a challenge, never after the delegate
        (Stage::Headless, _) if policy.server_available => Stage::Server,
        (Stage::Headless, _) => Stage::Failed,

        (terminal, _) => terminal,
    }
}

/// Substitutes the percent-encoded target into a proxy template
///
/// Templates without a `{url}` placeholder get the target appended.
pub fn proxied_url(template: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else {
        format!("{}{}", template, encoded)
    }
}

/// Drives the fetch state machine for one URL at a time
pub struct FetchChain {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
}

impl FetchChain {
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    pub fn policy(&self) -> ChainPolicy {
        ChainPolicy {
            proxy_attempts: if self.config.proxy_templates.is_empty() {
                0
            } else {
                self.config.proxy_attempts
            },
            server_available: self.config.server_endpoint.is_some(),
            render_available: self.config.render_endpoint.is_some(),
        }
    }

    /// Retrieves `url`, escalating as needed
    ///
    /// A response that triggered escalation is kept; if every later stage
    /// fails, that response is returned rather than a failure, so a page is
    /// never silently dropped.
    pub async fn fetch(&self, url: &str, rules: &[ExtractionRule]) -> FetchOutcome {
        let policy = self.policy();
        let backoff_base = Duration::from_millis(self.config.proxy_backoff_ms);

        let mut stage = Stage::Direct;
        let mut fallback: Option<FetchedDocument> = None;
        let mut last_error = String::from("no fetch strategy succeeded");

        while !stage.is_terminal() {
            let outcome = match stage {
                Stage::Direct => self.run_direct(url).await,
                Stage::Proxy { attempt } => self.run_proxy_attempt(url, attempt).await,
                Stage::Server => self.run_server(url, rules).await,
                Stage::Headless => self.run_headless(url).await,
                Stage::Success | Stage::Failed => break,
            };

            let next = next_stage(stage, &outcome, &policy);
            if !next.is_terminal() {
                debug!("Escalating {} from {:?} to {:?}", url, stage, next);
            }

            // Back off only between proxy attempts
            if let (Stage::Proxy { attempt }, Stage::Proxy { .. }) = (stage, next) {
                if !matches!(outcome, StageOutcome::Response(_)) {
                    let wait = proxy_backoff(attempt, backoff_base);
                    debug!(
                        "Proxy attempt {} for {} exhausted, backing off {}ms",
                        attempt,
                        url,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
            }

            match (next, outcome) {
                (Stage::Success, StageOutcome::Response(doc)) => {
                    return FetchOutcome::Document(doc);
                }
                (Stage::Success, StageOutcome::Delegated(record)) => {
                    return FetchOutcome::Delegated(record);
                }
                (_, StageOutcome::Response(doc)) => fallback = Some(doc),
                (_, StageOutcome::Unreachable(reason)) => last_error = reason,
                (_, StageOutcome::ProxyExhausted) => {
                    last_error = "all proxies failed".to_string();
                }
                (_, StageOutcome::Delegated(_)) => {
                    last_error = "delegate returned no response".to_string();
                }
            }

            stage = next;
        }

        match fallback {
            Some(doc) => {
                debug!(
                    "All escalations failed for {}; keeping {} response",
                    url, doc.source
                );
                FetchOutcome::Document(doc)
            }
            None => FetchOutcome::Failed { reason: last_error },
        }
    }

    async fn run_direct(&self, url: &str) -> StageOutcome {
        let started = Instant::now();
        match self.transport.get(url).await {
            Ok(response) => StageOutcome::Response(FetchedDocument {
                response,
                source: FetchSource::Direct,
                latency_ms: elapsed_ms(started),
            }),
            Err(e) => {
                debug!("Direct fetch of {} failed: {}", url, e);
                StageOutcome::Unreachable(e.to_string())
            }
        }
    }

    async fn run_proxy_attempt(&self, url: &str, attempt: u32) -> StageOutcome {
        for template in &self.config.proxy_templates {
            let proxied = proxied_url(template, url);
            let started = Instant::now();
            match self.transport.get(&proxied).await {
                Ok(mut response) if response.is_success() => {
                    response.final_url = url.to_string();
                    return StageOutcome::Response(FetchedDocument {
                        response,
                        source: FetchSource::Proxy,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Ok(response) => {
                    trace!(
                        "Proxy {} returned {} for {} (attempt {})",
                        template,
                        response.status,
                        url,
                        attempt
                    );
                }
                Err(e) => {
                    trace!("Proxy {} failed for {}: {}", template, url, e);
                }
            }
        }
        StageOutcome::ProxyExhausted
    }

    async fn run_server(&self, url: &str, rules: &[ExtractionRule]) -> StageOutcome {
        let Some(endpoint) = self.config.server_endpoint.as_deref() else {
            return StageOutcome::Unreachable("no server endpoint configured".to_string());
        };

        match delegate_to_server(self.transport.as_ref(), endpoint, url, rules).await {
            Ok(record) => StageOutcome::Delegated(record),
            Err(e) => {
                debug!("Server delegation for {} failed: {}", url, e);
                StageOutcome::Unreachable(format!("server delegation failed: {}", e))
            }
        }
    }

    async fn run_headless(&self, url: &str) -> StageOutcome {
        let Some(endpoint) = self.config.render_endpoint.as_deref() else {
            return StageOutcome::Unreachable("no render endpoint configured".to_string());
        };

        let profile = RenderProfile::random(
            self.config.settle_delay_min_ms,
            self.config.settle_delay_max_ms,
        );
        let started = Instant::now();
        match render_headless(self.transport.as_ref(), endpoint, url, &profile).await {
            Ok(response) => StageOutcome::Response(FetchedDocument {
                response,
                source: FetchSource::Headless,
                latency_ms: elapsed_ms(started),
            }),
            Err(e) => {
                debug!("Headless render of {} failed: {}", url, e);
                StageOutcome::Unreachable(format!("headless render failed: {}", e))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

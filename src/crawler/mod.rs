//! Crawler module for page retrieval and crawl coordination
//!
//! This module contains the core crawling logic, including:
//! - The HTTP transport seam and client construction
//! - Bot-challenge detection
//! - The escalating fetch strategy chain and its delegates
//! - The worker loop that ties fetching, analysis and discovery together

mod challenge;
mod chain;
mod coordinator;
mod delegate;
mod transport;

pub use chain::{
    next_stage, proxied_url, proxy_backoff, ChainPolicy, FetchChain, FetchOutcome,
    FetchedDocument, Stage, StageOutcome,
};
pub use challenge::{is_blocking_status, is_challenge, needs_escalation};
pub use coordinator::{build_record, Coordinator, CrawlControl, CrawlReport};
pub use delegate::{delegate_to_server, render_headless, DelegationError, RenderProfile, Viewport};
pub use transport::{build_http_client, HttpTransport, RawResponse, Transport, TransportError};

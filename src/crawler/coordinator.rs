//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker loop that drives a crawl session:
//! - Loading and persisting the session through storage
//! - Dequeuing URLs from the frontier in FIFO order
//! - Running each URL through the fetch chain, analyzer and classifier
//! - Feeding discovered internal links back into the frontier
//! - Cooperative stop and resumption

use crate::analysis::{analyze, classify_page, failure_record, PageSignals, SecurityHeaders};
use crate::config::Config;
use crate::crawler::chain::{FetchChain, FetchOutcome, FetchedDocument};
use crate::crawler::transport::{HttpTransport, Transport};
use crate::state::{CrawlSession, ExtractionRule, FetchSource, Link, PageRecord};
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::url::{classify_link, resolve_link};
use crate::SpiderError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Shared handle for stopping a running worker loop from another task
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    stop_requested: Arc<AtomicBool>,
    worker_active: Arc<AtomicBool>,
}

impl CrawlControl {
    /// Asks the worker loop to stop after the URL currently in flight
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// True while a worker loop holds the guard
    pub fn is_active(&self) -> bool {
        self.worker_active.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Option<WorkerGuard> {
        self.worker_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| WorkerGuard {
                active: Arc::clone(&self.worker_active),
            })
    }

    fn reset_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }
}

/// Released when the worker loop exits, however it exits
struct WorkerGuard {
    active: Arc<AtomicBool>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Summary of one call to [`Coordinator::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub urls_discovered: usize,
    /// URLs still pending when the loop exited
    pub frontier_remaining: usize,
    pub stopped_early: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SqliteStorage,
    chain: FetchChain,
    session: CrawlSession,
    control: CrawlControl,
    config_hash: String,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured database and a real
    /// HTTP transport
    ///
    /// The persisted session, if any, is loaded but not re-armed; call
    /// [`Coordinator::start`] or [`Coordinator::resume`] before running.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored with the session
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SpiderError)` - Failed to open storage or build the HTTP client
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, SpiderError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let timeout = Duration::from_millis(config.crawler.request_timeout_ms);
        let transport = HttpTransport::new(&config.user_agent, timeout)?;
        Self::with_parts(config, storage, Arc::new(transport), config_hash)
    }

    /// Creates a coordinator from explicit parts
    pub fn with_parts(
        config: Config,
        storage: SqliteStorage,
        transport: Arc<dyn Transport>,
        config_hash: impl Into<String>,
    ) -> Result<Self, SpiderError> {
        let session = storage.load_session()?;
        let chain = FetchChain::new(transport, config.fetch.clone());

        Ok(Self {
            config: Arc::new(config),
            storage,
            chain,
            session,
            control: CrawlControl::default(),
            config_hash: config_hash.into(),
        })
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for requesting a stop from another task
    pub fn control(&self) -> CrawlControl {
        self.control.clone()
    }

    /// Starts a fresh crawl from `seed`, discarding any prior pages
    pub fn start(&mut self, seed: &str) -> Result<Url, SpiderError> {
        let seed = self.session.start(seed)?;
        self.session.set_config_hash(self.config_hash.clone());
        self.storage.save_session(&self.session)?;
        info!(
            "Started crawl session for {} (root domain {})",
            seed,
            self.session.root_domain()
        );
        Ok(seed)
    }

    /// Re-arms the persisted session
    ///
    /// # Returns
    ///
    /// `true` if there is pending work to resume
    pub fn resume(&mut self) -> Result<bool, SpiderError> {
        if let Some(previous) = self.session.config_hash() {
            if previous != self.config_hash {
                warn!("Configuration changed since this session was started");
            }
        }

        let resumed = self.session.resume();
        if resumed {
            self.session.set_config_hash(self.config_hash.clone());
            self.storage.save_session(&self.session)?;
            info!(
                "Resuming crawl of {} with {} URLs pending",
                self.session.root_domain(),
                self.session.frontier().len()
            );
        } else {
            info!("Nothing to resume");
        }
        Ok(resumed)
    }

    /// Stops the session and persists it
    pub fn stop(&mut self) -> Result<(), SpiderError> {
        self.control.request_stop();
        self.session.stop();
        self.storage.save_session(&self.session)?;
        info!("Crawl session stopped");
        Ok(())
    }

    /// Adds a custom extraction rule; it applies to pages fetched from now on
    pub fn add_rule(&mut self, rule: ExtractionRule) -> Result<(), SpiderError> {
        info!("Adding extraction rule '{}' ({})", rule.name, rule.id);
        self.session.add_rule(rule);
        self.storage.save_session(&self.session)?;
        Ok(())
    }

    pub fn remove_rule(&mut self, id: &str) -> Result<ExtractionRule, SpiderError> {
        let rule = self.session.remove_rule(id)?;
        self.storage.save_session(&self.session)?;
        info!("Removed extraction rule '{}' ({})", rule.name, rule.id);
        Ok(rule)
    }

    /// Runs the worker loop until the frontier empties or a stop is requested
    ///
    /// At most one loop runs per coordinator; a second call while one is
    /// active returns an empty report immediately. The session is persisted
    /// after every processed URL, so an interrupted crawl can be resumed.
    pub async fn run(&mut self) -> Result<CrawlReport, SpiderError> {
        let mut report = CrawlReport::default();

        let Some(_guard) = self.control.acquire() else {
            warn!("A crawl worker is already running");
            return Ok(report);
        };
        self.control.reset_stop();

        if !self.session.is_running() {
            info!("Session is not running; nothing to crawl");
            report.frontier_remaining = self.session.frontier().len();
            return Ok(report);
        }

        let first_url = self
            .session
            .frontier()
            .pending()
            .next()
            .cloned()
            .unwrap_or_default();
        let run_id = self.storage.create_run(&first_url, &self.config_hash)?;
        info!("Starting crawl run {}", run_id);

        let politeness = Duration::from_millis(self.config.crawler.politeness_delay_ms);
        let max_pages = self.config.crawler.max_pages;
        let start_time = Instant::now();

        loop {
            if self.control.stop_requested() {
                info!("Stop requested, finishing crawl loop");
                self.session.stop();
                report.stopped_early = true;
            }
            if !self.session.is_running() {
                break;
            }
            if max_pages > 0 && report.pages_processed >= max_pages {
                info!("Reached page cap of {}", max_pages);
                self.session.stop();
                report.stopped_early = true;
                break;
            }

            let Some(url) = self.session.next_url() else {
                info!("Frontier is empty, crawl complete");
                break;
            };
            debug!("Processing URL: {}", url);

            let (failed, discovered) = self.process_url(&url).await;
            report.pages_processed += 1;
            report.urls_discovered += discovered;
            if failed {
                report.pages_failed += 1;
            }

            if let Err(e) = self.storage.save_session(&self.session) {
                self.storage
                    .finish_run(run_id, RunStatus::Failed, report.pages_processed)?;
                return Err(e.into());
            }

            if report.pages_processed % 10 == 0 {
                let elapsed = start_time.elapsed();
                let rate = report.pages_processed as f64 / elapsed.as_secs_f64().max(0.001);
                info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    report.pages_processed,
                    self.session.frontier().len(),
                    rate
                );
            }

            if !politeness.is_zero() && !self.session.frontier().is_empty() {
                tokio::time::sleep(politeness).await;
            }
        }

        self.storage.save_session(&self.session)?;

        report.frontier_remaining = self.session.frontier().len();
        let status = if report.frontier_remaining == 0 {
            RunStatus::Completed
        } else {
            RunStatus::Interrupted
        };
        self.storage
            .finish_run(run_id, status, report.pages_processed)?;

        info!(
            "Crawl run {} {}: {} pages crawled ({} failed), {} URLs discovered, {} pending, in {:?}",
            run_id,
            status.to_db_string(),
            report.pages_processed,
            report.pages_failed,
            report.urls_discovered,
            report.frontier_remaining,
            start_time.elapsed()
        );

        Ok(report)
    }

    /// Fetches, analyzes and records one URL, then enqueues its internal links
    ///
    /// # Returns
    ///
    /// Whether the fetch failed outright, and how many URLs were enqueued
    async fn process_url(&mut self, url: &str) -> (bool, usize) {
        let rules = self.session.extraction_rules().to_vec();
        let outcome = self.chain.fetch(url, &rules).await;
        let record = build_record(url, outcome, &rules, self.session.root_domain());

        let failed = record.is_failure();
        if failed {
            warn!("Failed to crawl {}", url);
        }

        let links = record.links.clone();
        self.session.record_page(record);
        let discovered = self.session.enqueue_discovered(&links);
        debug!("Discovered {} new URLs on {}", discovered, url);

        (failed, discovered)
    }
}

/// Turns the outcome of the fetch chain into a classified page record
///
/// The record is always keyed by `url`, whatever the delegate or redirect
/// reported.
pub fn build_record(
    url: &str,
    outcome: FetchOutcome,
    rules: &[ExtractionRule],
    root_domain: &str,
) -> PageRecord {
    match outcome {
        FetchOutcome::Failed { reason } => failure_record(url, &reason),
        FetchOutcome::Delegated(record) => delegated_record(url, record, root_domain),
        FetchOutcome::Document(doc) => match Url::parse(url) {
            Ok(page_url) => document_record(&page_url, url, doc, rules, root_domain),
            Err(e) => failure_record(url, &format!("invalid URL: {}", e)),
        },
    }
}

fn document_record(
    page_url: &Url,
    url: &str,
    doc: FetchedDocument,
    rules: &[ExtractionRule],
    root_domain: &str,
) -> PageRecord {
    let FetchedDocument {
        response,
        source,
        latency_ms,
    } = doc;

    let mut record = PageRecord::new(url);
    record.status = response.status;
    record.content_type = response.content_type().to_string();
    record.byte_size = response.byte_size;
    record.latency_ms = latency_ms;
    record.source = source;

    let mut signals = PageSignals::default();
    let mut links = Vec::new();

    // A redirect's body is a stub; only its Location matters
    if record.is_html() && !record.is_redirect() {
        let analysis = analyze(&response.body, page_url, rules);
        record.details = analysis.details;
        record.assets = analysis.assets;
        record.custom_data = analysis.custom_data;
        links = analysis.links;
        signals = analysis.signals;
    }

    // Proxies and the renderer do not pass the origin's headers through
    if source == FetchSource::Direct {
        if let Some(tag) = response.header("x-robots-tag") {
            record.details.x_robots_tag = tag.trim().to_string();
        }
        signals.security = Some(SecurityHeaders::from_lookup(|name| {
            response.header(name).is_some()
        }));
    }

    if (300..400).contains(&record.status) {
        if let Some(target) = response
            .header("location")
            .and_then(|location| resolve_link(location, page_url))
        {
            links.push(target);
        }
    }

    record.links = links
        .into_iter()
        .map(|link| Link {
            kind: classify_link(&link, root_domain),
            url: link.to_string(),
        })
        .collect();
    record.issues = classify_page(&record, &signals);
    record
}

/// Re-keys a delegate's record and re-derives what the local rules own
fn delegated_record(url: &str, mut record: PageRecord, root_domain: &str) -> PageRecord {
    record.url = url.to_string();
    record.source = FetchSource::Server;

    let base = Url::parse(url).ok();
    record.links = record
        .links
        .into_iter()
        .filter_map(|link| {
            let resolved = match &base {
                Some(base) => resolve_link(&link.url, base)?,
                None => Url::parse(&link.url).ok()?,
            };
            Some(Link {
                kind: classify_link(&resolved, root_domain),
                url: resolved.to_string(),
            })
        })
        .collect();

    let signals = PageSignals::inferred(&record);
    record.issues = classify_page(&record, &signals);
    record
}

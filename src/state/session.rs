use crate::analysis::refresh_duplicates;
use crate::state::frontier::Frontier;
use crate::state::page::{Link, PageRecord};
use crate::state::rule::ExtractionRule;
use crate::url::{extract_domain, parse_seed, within_scope};
use crate::{SpiderError, UrlError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use url::Url;

/// A single crawl run
///
/// Owns the frontier, the page table and the extraction rules. All mutation
/// happens through these methods, driven by the coordinator's worker loop or
/// the start/stop entry points.
#[derive(Debug, Clone, Default)]
pub struct CrawlSession {
    pub(crate) root_domain: String,
    pub(crate) frontier: Frontier,
    pub(crate) pages: BTreeMap<String, PageRecord>,
    pub(crate) running: bool,
    pub(crate) extraction_rules: Vec<ExtractionRule>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) config_hash: Option<String>,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all crawl state and seeds the frontier
    ///
    /// Prior pages are discarded. Extraction rules survive.
    ///
    /// # Returns
    ///
    /// The canonical seed URL
    pub fn start(&mut self, seed: &str) -> Result<Url, UrlError> {
        let seed = parse_seed(seed)?;
        let root = extract_domain(&seed).ok_or(UrlError::MissingDomain)?;

        self.root_domain = root;
        self.pages.clear();
        self.frontier.seed(seed.as_str());
        self.running = true;
        self.started_at = Some(Utc::now());

        Ok(seed)
    }

    /// Requests the worker loop to stop after the current URL
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Re-arms a loaded session whose frontier still has work
    ///
    /// # Returns
    ///
    /// `true` if there is anything left to crawl
    pub fn resume(&mut self) -> bool {
        self.running = !self.root_domain.is_empty() && !self.frontier.is_empty();
        self.running
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn pages(&self) -> &BTreeMap<String, PageRecord> {
        &self.pages
    }

    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.get(url)
    }

    pub fn extraction_rules(&self) -> &[ExtractionRule] {
        &self.extraction_rules
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    pub fn set_config_hash(&mut self, hash: impl Into<String>) {
        self.config_hash = Some(hash.into());
    }

    /// Dequeues the next URL, or stops the session when nothing is left
    pub fn next_url(&mut self) -> Option<String> {
        let next = self.frontier.pop();
        if next.is_none() {
            self.running = false;
        }
        next
    }

    /// True if `host` lies within the root-domain scope
    pub fn in_scope(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| extract_domain(&u))
            .is_some_and(|host| within_scope(&self.root_domain, &host))
    }

    /// Enqueues every unseen internal link within scope
    ///
    /// # Returns
    ///
    /// The number of URLs added to the frontier
    pub fn enqueue_discovered(&mut self, links: &[Link]) -> usize {
        let mut added = 0;
        for link in links.iter().filter(|link| link.kind.is_internal()) {
            if self.frontier.is_visited(&link.url) || !self.in_scope(&link.url) {
                continue;
            }
            if self.frontier.enqueue(link.url.clone()) {
                added += 1;
            }
        }
        added
    }

    /// Stores a record, replacing any previous one for the same URL, and
    /// recomputes the cross-page duplicate issues
    pub fn record_page(&mut self, record: PageRecord) {
        self.pages.insert(record.url.clone(), record);
        refresh_duplicates(&mut self.pages);
    }

    /// Removes a record and recomputes the cross-page duplicate issues
    pub fn remove_page(&mut self, url: &str) -> Option<PageRecord> {
        let removed = self.pages.remove(url);
        if removed.is_some() {
            refresh_duplicates(&mut self.pages);
        }
        removed
    }

    pub fn add_rule(&mut self, rule: ExtractionRule) {
        self.extraction_rules.push(rule);
    }

    pub fn remove_rule(&mut self, id: &str) -> crate::Result<ExtractionRule> {
        let index = self
            .extraction_rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or_else(|| SpiderError::RuleNotFound(id.to_string()))?;
        Ok(self.extraction_rules.remove(index))
    }
}

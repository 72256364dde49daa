//! Statistics generation from the crawl session
//!
//! This module provides functionality for summarizing the page table of a
//! persisted session and displaying it.

use crate::state::{CrawlSession, IssueCode, Severity};
use crate::storage::{RunRecord, Storage};
use crate::SpiderError;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Root domain of the session
    pub root_domain: String,

    /// Total number of page records
    pub total_pages: usize,

    /// Pages by status class: "2xx", "3xx", "4xx", "5xx" and "failed"
    pub pages_by_status: BTreeMap<String, usize>,

    /// Pages by the fetch strategy that produced them
    pub pages_by_source: BTreeMap<String, usize>,

    /// Issue occurrences by code
    pub issues_by_code: BTreeMap<IssueCode, usize>,

    /// Issue occurrences by severity
    pub issues_by_severity: BTreeMap<Severity, usize>,

    /// URLs still waiting in the frontier
    pub frontier_size: usize,

    /// URLs ever enqueued
    pub visited_count: usize,

    pub internal_links: usize,
    pub external_links: usize,

    /// Mean latency over pages that produced a response
    pub average_latency_ms: Option<u64>,

    /// Most recent crawl run, if any
    pub last_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Computes statistics over a session's page table
    pub fn from_session(session: &CrawlSession) -> Self {
        let mut stats = Self {
            root_domain: session.root_domain().to_string(),
            total_pages: session.pages().len(),
            frontier_size: session.frontier().len(),
            visited_count: session.frontier().visited_count(),
            ..Self::default()
        };

        let mut latency_total = 0u64;
        let mut latency_count = 0u64;

        for page in session.pages().values() {
            *stats
                .pages_by_status
                .entry(status_class(page.status).to_string())
                .or_default() += 1;
            *stats
                .pages_by_source
                .entry(page.source.to_string())
                .or_default() += 1;

            for issue in &page.issues {
                *stats.issues_by_code.entry(issue.code).or_default() += 1;
                *stats.issues_by_severity.entry(issue.severity).or_default() += 1;
            }

            let internal = page.internal_links().count();
            stats.internal_links += internal;
            stats.external_links += page.links.len() - internal;

            if !page.is_failure() {
                latency_total += page.latency_ms;
                latency_count += 1;
            }
        }

        if latency_count > 0 {
            stats.average_latency_ms = Some(latency_total / latency_count);
        }

        stats
    }

    /// Issue codes sorted by occurrence, most frequent first
    pub fn top_issues(&self) -> Vec<(IssueCode, usize)> {
        let mut issues: Vec<_> = self
            .issues_by_code
            .iter()
            .map(|(code, count)| (*code, *count))
            .collect();
        issues.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        issues
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        0 => "failed",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(SpiderError)` - Failed to read the session or run history
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, SpiderError> {
    let session = storage.load_session()?;
    let mut stats = CrawlStatistics::from_session(&session);
    stats.last_run = storage.get_latest_run()?;
    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    if stats.root_domain.is_empty() {
        println!("  Root domain: (no session)");
    } else {
        println!("  Root domain: {}", stats.root_domain);
    }
    println!("  Pages recorded: {}", stats.total_pages);
    println!("  URLs pending: {}", stats.frontier_size);
    println!("  URLs discovered: {}", stats.visited_count);
    println!(
        "  Links: {} internal, {} external",
        stats.internal_links, stats.external_links
    );
    if let Some(latency) = stats.average_latency_ms {
        println!("  Average latency: {}ms", latency);
    }
    println!();

    if let Some(run) = &stats.last_run {
        println!("Last Run:");
        println!("  #{} {} ({})", run.id, run.status.to_db_string(), run.seed_url);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Pages recorded: {}", run.pages_recorded);
        println!();
    }

    if !stats.pages_by_status.is_empty() {
        println!("Pages by Status:");
        for (class, count) in &stats.pages_by_status {
            let percentage = (*count as f64 / stats.total_pages.max(1) as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", class, count, percentage);
        }
        println!();

        println!("Pages by Fetch Strategy:");
        for (source, count) in &stats.pages_by_source {
            println!("  {}: {}", source, count);
        }
        println!();
    }

    if !stats.issues_by_severity.is_empty() {
        println!("Issues by Severity:");
        for (severity, count) in &stats.issues_by_severity {
            println!("  {}: {}", severity, count);
        }
        println!();

        println!("Issues by Code:");
        for (code, count) in stats.top_issues() {
            println!(
                "  {:<16} {:>5}  [{}] {}",
                code.as_str(),
                count,
                code.default_severity(),
                code.hint()
            );
        }
    }
}

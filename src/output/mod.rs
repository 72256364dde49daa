//! Output module for reporting on crawl results
//!
//! Read-only views over the persisted page table for the CLI.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

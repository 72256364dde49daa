//! Crawl state
//!
//! # Components
//!
//! - `CrawlSession`: root domain, frontier, page table and extraction rules for one run
//! - `Frontier`: FIFO queue plus visited set
//! - `PageRecord`: everything learned about one fetched URL
//! - `Issue` / `IssueCode` / `Severity`: the finding taxonomy
//! - `ExtractionRule`: user-defined css or regex extraction

mod frontier;
mod issue;
mod page;
mod rule;
mod session;

// Re-export main types
pub use frontier::Frontier;
pub use issue::{Issue, IssueCode, Severity};
pub use page::{Asset, AssetKind, FetchSource, Hreflang, Link, PageDetails, PageRecord};
pub use rule::{ExtractionRule, RuleKind, RuleMatcher};
pub use session::CrawlSession;

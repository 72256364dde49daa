//! Page analysis and issue classification
//!
//! - `analyze`: parses a document into details, links, assets and custom data
//! - `classify_page`: per-page SEO rules
//! - `refresh_duplicates`: cross-page duplicate title/description rules
//! - `pixel_width`: truncation heuristic for titles and descriptions

mod extract;
mod issues;
mod parser;
mod pixel;

pub use extract::{apply_rules, RuleOutput, EXTRACTION_ERROR};
pub use issues::{classify_page, failure_record, refresh_duplicates};
pub use parser::{analyze, PageAnalysis, PageSignals, SecurityHeaders};
pub use pixel::pixel_width;

//! Issue taxonomy
//!
//! Every finding the classifier produces carries a stable [`IssueCode`] so
//! that report consumers can group and filter on it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identifier for a class of finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueCode {
    // ===== Response =====
    CrawlFail,
    HttpError,
    HttpRedirect,
    SlowResponse,
    BotBlock,

    // ===== Title =====
    TitleMissing,
    TitleLong,
    TitleShort,
    TitlePixelWide,
    TitlePixelNarrow,
    TitleDuplicate,

    // ===== Description =====
    DescriptionMissing,
    DescriptionLength,
    DescriptionPixelWide,
    DescriptionDuplicate,

    // ===== Headings =====
    H1Missing,
    H1Multiple,
    H1SameAsTitle,
    H2Missing,
    H2TooMany,
    H2WithoutH1,

    // ===== Canonical and content =====
    CanonicalMissing,
    CanonicalNonSelf,
    ThinContent,
    SchemaMissing,

    // ===== Images and accessibility =====
    ImageAltMissing,
    ImageSizeMissing,
    HtmlLangMissing,

    // ===== Security headers =====
    MissingHsts,
    MissingCsp,
    MissingFrameOptions,
    MissingContentTypeOptions,
    MissingReferrerPolicy,

    // ===== Custom rules =====
    RuleFailed,
}

impl IssueCode {
    /// Returns the stable string code used in records and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrawlFail => "CRAWL-FAIL",
            Self::HttpError => "HTTP-ERR",
            Self::HttpRedirect => "HTTP-REDIRECT",
            Self::SlowResponse => "PERF-SLOW",
            Self::BotBlock => "BOT-BLOCK",
            Self::TitleMissing => "TITLE-MISS",
            Self::TitleLong => "TITLE-LONG",
            Self::TitleShort => "TITLE-SHORT",
            Self::TitlePixelWide => "TITLE-PX-WIDE",
            Self::TitlePixelNarrow => "TITLE-PX-NARROW",
            Self::TitleDuplicate => "TITLE-DUP",
            Self::DescriptionMissing => "DESC-MISS",
            Self::DescriptionLength => "DESC-LEN",
            Self::DescriptionPixelWide => "DESC-PX-WIDE",
            Self::DescriptionDuplicate => "DESC-DUP",
            Self::H1Missing => "H1-MISS",
            Self::H1Multiple => "H1-MULTI",
            Self::H1SameAsTitle => "H1-DUP-TITLE",
            Self::H2Missing => "H2-MISS",
            Self::H2TooMany => "H2-MANY",
            Self::H2WithoutH1 => "H2-NO-H1",
            Self::CanonicalMissing => "CAN-MISS",
            Self::CanonicalNonSelf => "CAN-NONSELF",
            Self::ThinContent => "CONT-THIN",
            Self::SchemaMissing => "SCHEMA-MISS",
            Self::ImageAltMissing => "IMG-ALT",
            Self::ImageSizeMissing => "IMG-SIZE",
            Self::HtmlLangMissing => "A11Y-LANG",
            Self::MissingHsts => "SEC-HSTS",
            Self::MissingCsp => "SEC-CSP",
            Self::MissingFrameOptions => "SEC-XFO",
            Self::MissingContentTypeOptions => "SEC-XCTO",
            Self::MissingReferrerPolicy => "SEC-REFERRER",
            Self::RuleFailed => "RULE-ERR",
        }
    }

    /// Parses a string code
    ///
    /// Returns None if the string doesn't match any known code.
    pub fn from_code(s: &str) -> Option<Self> {
        Self::all_codes().into_iter().find(|code| code.as_str() == s)
    }

    /// Severity the classifier assigns to this code
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::CrawlFail
            | Self::HttpError
            | Self::BotBlock
            | Self::TitleMissing
            | Self::H1Missing
            | Self::H1Multiple
            | Self::CanonicalMissing => Severity::Error,

            Self::SlowResponse
            | Self::TitleLong
            | Self::TitleShort
            | Self::TitlePixelWide
            | Self::TitlePixelNarrow
            | Self::TitleDuplicate
            | Self::DescriptionMissing
            | Self::DescriptionDuplicate
            | Self::H1SameAsTitle
            | Self::H2TooMany
            | Self::H2WithoutH1
            | Self::ThinContent
            | Self::ImageAltMissing => Severity::Warning,

            Self::HttpRedirect
            | Self::DescriptionLength
            | Self::DescriptionPixelWide
            | Self::H2Missing
            | Self::CanonicalNonSelf
            | Self::SchemaMissing
            | Self::ImageSizeMissing
            | Self::HtmlLangMissing
            | Self::MissingHsts
            | Self::MissingCsp
            | Self::MissingFrameOptions
            | Self::MissingContentTypeOptions
            | Self::MissingReferrerPolicy
            | Self::RuleFailed => Severity::Info,
        }
    }

    /// Short remediation hint
    pub fn hint(&self) -> &'static str {
        match self {
            Self::CrawlFail => "Check that the URL is reachable and not blocking crawlers.",
            Self::HttpError => "Fix the broken page or remove links pointing to it.",
            Self::HttpRedirect => "Link directly to the final destination URL.",
            Self::SlowResponse => "Improve server response time or enable caching.",
            Self::BotBlock => "Allow-list the crawler or verify the page manually.",
            Self::TitleMissing => "Add a unique, descriptive <title>.",
            Self::TitleLong => "Shorten the title to 60 characters or fewer.",
            Self::TitleShort => "Expand the title to at least 30 characters.",
            Self::TitlePixelWide => "Shorten the title so it is not truncated in results.",
            Self::TitlePixelNarrow => "Use more of the available title width.",
            Self::TitleDuplicate => "Give every page a distinct title.",
            Self::DescriptionMissing => "Add a meta description summarizing the page.",
            Self::DescriptionLength => "Keep the description between 70 and 155 characters.",
            Self::DescriptionPixelWide => "Shorten the description so it is not truncated.",
            Self::DescriptionDuplicate => "Write a distinct description for every page.",
            Self::H1Missing => "Add a single <h1> describing the page.",
            Self::H1Multiple => "Keep exactly one <h1> per page.",
            Self::H1SameAsTitle => "Vary the <h1> from the title.",
            Self::H2Missing => "Structure content with <h2> subheadings.",
            Self::H2TooMany => "Consolidate subheadings.",
            Self::H2WithoutH1 => "Add an <h1> above the <h2> headings.",
            Self::CanonicalMissing => "Add a rel=canonical link.",
            Self::CanonicalNonSelf => "Confirm the canonical target is intended.",
            Self::ThinContent => "Add substantive content (300+ words).",
            Self::SchemaMissing => "Add JSON-LD structured data.",
            Self::ImageAltMissing => "Add alt text to every image.",
            Self::ImageSizeMissing => "Set width and height on images to avoid layout shift.",
            Self::HtmlLangMissing => "Declare the document language on <html>.",
            Self::MissingHsts => "Send a Strict-Transport-Security header.",
            Self::MissingCsp => "Send a Content-Security-Policy header.",
            Self::MissingFrameOptions => "Send an X-Frame-Options header.",
            Self::MissingContentTypeOptions => "Send X-Content-Type-Options: nosniff.",
            Self::MissingReferrerPolicy => "Send a Referrer-Policy header.",
            Self::RuleFailed => "Fix the extraction rule's selector or pattern.",
        }
    }

    /// Returns all issue codes
    pub fn all_codes() -> Vec<Self> {
        vec![
            Self::CrawlFail,
            Self::HttpError,
            Self::HttpRedirect,
            Self::SlowResponse,
            Self::BotBlock,
            Self::TitleMissing,
            Self::TitleLong,
            Self::TitleShort,
            Self::TitlePixelWide,
            Self::TitlePixelNarrow,
            Self::TitleDuplicate,
            Self::DescriptionMissing,
            Self::DescriptionLength,
            Self::DescriptionPixelWide,
            Self::DescriptionDuplicate,
            Self::H1Missing,
            Self::H1Multiple,
            Self::H1SameAsTitle,
            Self::H2Missing,
            Self::H2TooMany,
            Self::H2WithoutH1,
            Self::CanonicalMissing,
            Self::CanonicalNonSelf,
            Self::ThinContent,
            Self::SchemaMissing,
            Self::ImageAltMissing,
            Self::ImageSizeMissing,
            Self::HtmlLangMissing,
            Self::MissingHsts,
            Self::MissingCsp,
            Self::MissingFrameOptions,
            Self::MissingContentTypeOptions,
            Self::MissingReferrerPolicy,
            Self::RuleFailed,
        ]
    }

    /// True for codes derived from the whole page set rather than one page
    pub fn is_cross_page(&self) -> bool {
        matches!(self, Self::TitleDuplicate | Self::DescriptionDuplicate)
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for IssueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IssueCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_code(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown issue code '{}'", s)))
    }
}

/// A single finding on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
}

impl Issue {
    /// Creates an issue with the code's default severity
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
        }
    }
}

/// Deserializes an issue list, dropping entries with unknown codes
///
/// Delegated records may carry codes this crate does not know; they are
/// reclassified locally anyway.
pub(crate) fn deserialize_known_issues<'de, D>(deserializer: D) -> Result<Vec<Issue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = raw else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

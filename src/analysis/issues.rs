//! Issue classification
//!
//! Per-page rules look at one record and its markup signals. Cross-page
//! rules (duplicate titles and descriptions) are recomputed over the whole
//! page table after every change.

use crate::analysis::parser::PageSignals;
use crate::analysis::pixel::pixel_width;
use crate::state::{Issue, IssueCode, PageRecord};
use std::collections::{BTreeMap, HashMap};
use url::Url;

pub const TITLE_MAX_CHARS: usize = 60;
pub const TITLE_MIN_CHARS: usize = 30;
pub const TITLE_MAX_PIXELS: u32 = 580;
pub const TITLE_MIN_PIXELS: u32 = 200;
pub const DESCRIPTION_MIN_CHARS: usize = 70;
pub const DESCRIPTION_MAX_CHARS: usize = 155;
pub const DESCRIPTION_MAX_PIXELS: u32 = 990;
pub const MAX_H2: usize = 20;
pub const MIN_WORDS: usize = 300;
pub const SLOW_RESPONSE_MS: u64 = 2000;

impl PageSignals {
    /// Best-effort signals for a record analyzed elsewhere
    ///
    /// Delegated records carry details but not the raw markup, so heading
    /// counts and image checks are reconstructed from what they do carry.
    ///
    /// Coverage is reduced: with a single `h1` field, no image dimensions and
    /// no body, `H1-MULTI`, `IMG-SIZE` and `BOT-BLOCK` never fire on a
    /// delegated record.
    pub fn inferred(record: &PageRecord) -> Self {
        Self {
            h1_count: usize::from(!record.details.h1.is_empty()),
            images_missing_alt: record.images().filter(|img| img.alt.trim().is_empty()).count(),
            images_missing_size: 0,
            has_html_lang: true,
            rule_failures: Vec::new(),
            bot_challenge: false,
            security: None,
        }
    }
}

/// Builds the synthetic record for a URL no strategy could retrieve
pub fn failure_record(url: &str, reason: &str) -> PageRecord {
    let mut record = PageRecord::new(url);
    record.issues.push(Issue::new(
        IssueCode::CrawlFail,
        format!("Failed to crawl page: {}", reason),
    ));
    record
}

/// Evaluates every per-page rule
///
/// A status-0 record only ever carries `CRAWL-FAIL`. Non-HTML documents and
/// redirects get the response-level rules only.
pub fn classify_page(record: &PageRecord, signals: &PageSignals) -> Vec<Issue> {
    let mut issues = Vec::new();

    if record.is_failure() {
        issues.push(Issue::new(
            IssueCode::CrawlFail,
            "No response could be obtained from any fetch strategy",
        ));
        return issues;
    }

    classify_response(record, signals, &mut issues);

    if record.is_html() && !record.is_redirect() {
        classify_title(record, &mut issues);
        classify_description(record, &mut issues);
        classify_headings(record, signals, &mut issues);
        classify_content(record, &mut issues);
        classify_markup(signals, &mut issues);
    }

    for rule in &signals.rule_failures {
        issues.push(Issue::new(
            IssueCode::RuleFailed,
            format!("Extraction rule '{}' could not be applied", rule),
        ));
    }

    issues
}

fn classify_response(record: &PageRecord, signals: &PageSignals, issues: &mut Vec<Issue>) {
    if record.status >= 400 {
        issues.push(Issue::new(
            IssueCode::HttpError,
            format!("Page returned HTTP {}", record.status),
        ));
    } else if record.status >= 300 {
        issues.push(Issue::new(
            IssueCode::HttpRedirect,
            format!("Page returned redirect status {}", record.status),
        ));
    }

    if record.latency_ms > SLOW_RESPONSE_MS {
        issues.push(Issue::new(
            IssueCode::SlowResponse,
            format!("Response took {}ms", record.latency_ms),
        ));
    }

    if signals.bot_challenge {
        issues.push(Issue::new(
            IssueCode::BotBlock,
            "Response is still a bot challenge page; analysis may be incomplete",
        ));
    }

    if let Some(security) = signals.security {
        let checks = [
            (security.hsts, IssueCode::MissingHsts, "Strict-Transport-Security"),
            (security.csp, IssueCode::MissingCsp, "Content-Security-Policy"),
            (security.frame_options, IssueCode::MissingFrameOptions, "X-Frame-Options"),
            (
                security.content_type_options,
                IssueCode::MissingContentTypeOptions,
                "X-Content-Type-Options",
            ),
            (security.referrer_policy, IssueCode::MissingReferrerPolicy, "Referrer-Policy"),
        ];
        for (present, code, header) in checks {
            if !present {
                issues.push(Issue::new(code, format!("Missing {} header", header)));
            }
        }
    }
}

fn classify_title(record: &PageRecord, issues: &mut Vec<Issue>) {
    let title = &record.details.title;
    if title.is_empty() {
        issues.push(Issue::new(IssueCode::TitleMissing, "Missing page title"));
        return;
    }

    let chars = title.chars().count();
    if chars > TITLE_MAX_CHARS {
        issues.push(Issue::new(
            IssueCode::TitleLong,
            format!("Title is {} characters (max {})", chars, TITLE_MAX_CHARS),
        ));
    }
    if chars < TITLE_MIN_CHARS {
        issues.push(Issue::new(
            IssueCode::TitleShort,
            format!("Title is {} characters (min {})", chars, TITLE_MIN_CHARS),
        ));
    }

    let pixels = pixel_width(title);
    if pixels > TITLE_MAX_PIXELS {
        issues.push(Issue::new(
            IssueCode::TitlePixelWide,
            format!("Title is {}px wide and may be truncated", pixels),
        ));
    }
    if pixels < TITLE_MIN_PIXELS {
        issues.push(Issue::new(
            IssueCode::TitlePixelNarrow,
            format!("Title is only {}px wide", pixels),
        ));
    }
}

fn classify_description(record: &PageRecord, issues: &mut Vec<Issue>) {
    let description = &record.details.description;
    if description.is_empty() {
        issues.push(Issue::new(
            IssueCode::DescriptionMissing,
            "Missing meta description",
        ));
        return;
    }

    let chars = description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&chars) {
        issues.push(Issue::new(
            IssueCode::DescriptionLength,
            format!(
                "Description is {} characters (recommended {}-{})",
                chars, DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS
            ),
        ));
    }

    let pixels = pixel_width(description);
    if pixels > DESCRIPTION_MAX_PIXELS {
        issues.push(Issue::new(
            IssueCode::DescriptionPixelWide,
            format!("Description is {}px wide and may be truncated", pixels),
        ));
    }
}

fn classify_headings(record: &PageRecord, signals: &PageSignals, issues: &mut Vec<Issue>) {
    let details = &record.details;
    let h1_missing = signals.h1_count == 0 || details.h1.is_empty();

    if h1_missing {
        issues.push(Issue::new(IssueCode::H1Missing, "Missing H1 heading"));
    }
    if signals.h1_count > 1 {
        issues.push(Issue::new(
            IssueCode::H1Multiple,
            format!("Page has {} H1 headings", signals.h1_count),
        ));
    }

    if !details.h1.is_empty() && details.h1 == details.title {
        issues.push(Issue::new(
            IssueCode::H1SameAsTitle,
            "H1 is identical to the title",
        ));
    }

    match details.h2.len() {
        0 => issues.push(Issue::new(IssueCode::H2Missing, "No H2 headings")),
        n if n > MAX_H2 => issues.push(Issue::new(
            IssueCode::H2TooMany,
            format!("Page has {} H2 headings (max {})", n, MAX_H2),
        )),
        _ => {}
    }

    if h1_missing && !details.h2.is_empty() {
        issues.push(Issue::new(
            IssueCode::H2WithoutH1,
            "H2 headings present without an H1",
        ));
    }
}

fn classify_content(record: &PageRecord, issues: &mut Vec<Issue>) {
    let details = &record.details;

    match details.canonical.as_deref().filter(|c| !c.is_empty()) {
        None => issues.push(Issue::new(
            IssueCode::CanonicalMissing,
            "Missing canonical link",
        )),
        Some(canonical) if !same_page(canonical, &record.url) => issues.push(Issue::new(
            IssueCode::CanonicalNonSelf,
            format!("Canonical points to {}", canonical),
        )),
        Some(_) => {}
    }

    if details.word_count < MIN_WORDS {
        issues.push(Issue::new(
            IssueCode::ThinContent,
            format!("Only {} words of content (min {})", details.word_count, MIN_WORDS),
        ));
    }

    if details.structured_data.is_empty() {
        issues.push(Issue::new(
            IssueCode::SchemaMissing,
            "No structured data found",
        ));
    }
}

fn classify_markup(signals: &PageSignals, issues: &mut Vec<Issue>) {
    if signals.images_missing_alt > 0 {
        issues.push(Issue::new(
            IssueCode::ImageAltMissing,
            format!("{} image(s) missing alt text", signals.images_missing_alt),
        ));
    }

    if signals.images_missing_size > 0 {
        issues.push(Issue::new(
            IssueCode::ImageSizeMissing,
            format!(
                "{} image(s) missing width or height",
                signals.images_missing_size
            ),
        ));
    }

    if !signals.has_html_lang {
        issues.push(Issue::new(
            IssueCode::HtmlLangMissing,
            "Missing lang attribute on <html>",
        ));
    }
}

/// Compares two URLs ignoring fragments and a trailing slash
fn same_page(a: &str, b: &str) -> bool {
    fn key(raw: &str) -> String {
        match Url::parse(raw) {
            Ok(mut url) => {
                url.set_fragment(None);
                url.to_string().trim_end_matches('/').to_string()
            }
            Err(_) => raw.trim_end_matches('/').to_string(),
        }
    }
    key(a) == key(b)
}

/// Recomputes duplicate title and description issues across all pages
///
/// Stale duplicate issues are removed before fresh ones are added, so
/// running this twice over the same page set changes nothing.
pub fn refresh_duplicates(pages: &mut BTreeMap<String, PageRecord>) {
    let mut titles: HashMap<String, usize> = HashMap::new();
    let mut descriptions: HashMap<String, usize> = HashMap::new();

    for page in pages.values() {
        if !page.details.title.is_empty() {
            *titles.entry(page.details.title.clone()).or_default() += 1;
        }
        if !page.details.description.is_empty() {
            *descriptions
                .entry(page.details.description.clone())
                .or_default() += 1;
        }
    }

    for page in pages.values_mut() {
        page.issues.retain(|issue| !issue.code.is_cross_page());

        let title_count = titles.get(&page.details.title).copied().unwrap_or(0);
        if title_count > 1 {
            page.issues.push(Issue::new(
                IssueCode::TitleDuplicate,
                format!("Title is shared with {} other page(s)", title_count - 1),
            ));
        }

        let description_count = descriptions
            .get(&page.details.description)
            .copied()
            .unwrap_or(0);
        if description_count > 1 {
            page.issues.push(Issue::new(
                IssueCode::DescriptionDuplicate,
                format!(
                    "Description is shared with {} other page(s)",
                    description_count - 1
                ),
            ));
        }
    }
}

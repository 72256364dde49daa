//! HTML analysis
//!
//! Parses a retrieved document into the structural signals the issue
//! classifier works on:
//! - Title, meta description and robots directives
//! - Headings (first h1, every h2)
//! - Canonical, pagination, AMP and hreflang links
//! - JSON-LD structured data
//! - Outbound links and referenced assets
//! - Custom rule extractions

use crate::analysis::extract::apply_rules;
use crate::crawler::is_challenge;
use crate::state::{Asset, AssetKind, ExtractionRule, Hreflang, PageDetails};
use crate::url::{resolve_asset, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Elements whose text is never rendered
const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Everything extracted from one document
#[derive(Debug, Clone, Default)]
pub struct PageAnalysis {
    pub details: PageDetails,
    /// Resolved `<a href>` targets in document order, fragments removed
    pub links: Vec<Url>,
    pub assets: Vec<Asset>,
    pub custom_data: BTreeMap<String, Vec<String>>,
    pub signals: PageSignals,
}

/// Markup facts the classifier needs beyond [`PageDetails`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSignals {
    pub h1_count: usize,
    pub images_missing_alt: usize,
    pub images_missing_size: usize,
    pub has_html_lang: bool,
    /// Names of custom rules that failed
    pub rule_failures: Vec<String>,
    /// The final body still looks like a bot challenge
    pub bot_challenge: bool,
    /// Response headers were available for security checks
    pub security: Option<SecurityHeaders>,
}

impl Default for PageSignals {
    fn default() -> Self {
        Self {
            h1_count: 0,
            images_missing_alt: 0,
            images_missing_size: 0,
            has_html_lang: true,
            rule_failures: Vec::new(),
            bot_challenge: false,
            security: None,
        }
    }
}

/// Presence of security-relevant response headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityHeaders {
    pub hsts: bool,
    pub csp: bool,
    pub frame_options: bool,
    pub content_type_options: bool,
    pub referrer_policy: bool,
}

impl SecurityHeaders {
    /// Builds from a header lookup keyed by lowercase name
    pub fn from_lookup<F>(has: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        Self {
            hsts: has("strict-transport-security"),
            csp: has("content-security-policy"),
            frame_options: has("x-frame-options"),
            content_type_options: has("x-content-type-options"),
            referrer_policy: has("referrer-policy"),
        }
    }
}

/// Parses HTML content and extracts details, links, assets and custom data
///
/// Analysis never fails: missing elements become empty fields, malformed
/// JSON-LD blocks are skipped and broken custom rules yield a placeholder.
///
/// # Arguments
///
/// * `html` - The document body
/// * `page_url` - The page's own URL, used to resolve relative references
/// * `rules` - Custom extraction rules to run
///
/// # Example
///
/// ```
/// use spiderfrog::analysis::analyze;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let analysis = analyze(html, &page_url, &[]);
/// assert_eq!(analysis.details.title, "Test");
/// assert_eq!(analysis.links[0].as_str(), "https://example.com/page");
/// ```
pub fn analyze(html: &str, page_url: &Url, rules: &[ExtractionRule]) -> PageAnalysis {
    let document = Html::parse_document(html);

    let mut details = PageDetails {
        title: first_text(&document, "title"),
        description: meta_content(&document, "description"),
        h1: first_text(&document, "h1"),
        h2: select_all(&document, "h2")
            .into_iter()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect(),
        canonical: link_href(&document, "link[rel~=\"canonical\"][href]", page_url),
        meta_robots: meta_content(&document, "robots"),
        x_robots_tag: String::new(),
        hreflang: extract_hreflang(&document, page_url),
        rel_next: link_href(&document, "link[rel~=\"next\"][href]", page_url),
        rel_prev: link_href(&document, "link[rel~=\"prev\"][href]", page_url),
        amphtml: link_href(&document, "link[rel~=\"amphtml\"][href]", page_url),
        structured_data: extract_structured_data(&document),
        word_count: 0,
    };
    details.word_count = count_words(&document);

    let links = select_all(&document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .collect();

    let (assets, images_missing_alt, images_missing_size) = extract_assets(&document, page_url);

    let rule_output = apply_rules(&document, html, rules);

    let signals = PageSignals {
        h1_count: select_all(&document, "h1").len(),
        images_missing_alt,
        images_missing_size,
        has_html_lang: select_all(&document, "html[lang]")
            .first()
            .and_then(|html| html.value().attr("lang"))
            .is_some_and(|lang| !lang.trim().is_empty()),
        rule_failures: rule_output.failures,
        bot_challenge: is_challenge(html),
        security: None,
    };

    PageAnalysis {
        details,
        links,
        assets,
        custom_data: rule_output.values,
        signals,
    }
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, css: &str) -> String {
    select_all(document, css)
        .into_iter()
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Content of the first `<meta name=...>` matching `name` case-insensitively
fn meta_content(document: &Html, name: &str) -> String {
    select_all(document, "meta[name][content]")
        .into_iter()
        .find(|meta| {
            meta.value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
        })
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// Absolute href of the first matching `<link>`, raw if it cannot be resolved
fn link_href(document: &Html, css: &str, page_url: &Url) -> Option<String> {
    let href = select_all(document, css)
        .into_iter()
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())?;

    Some(
        resolve_asset(href, page_url)
            .map(|url| url.to_string())
            .unwrap_or_else(|| href.to_string()),
    )
}

fn extract_hreflang(document: &Html, page_url: &Url) -> Vec<Hreflang> {
    select_all(document, "link[rel~=\"alternate\"][hreflang][href]")
        .into_iter()
        .filter_map(|link| {
            let lang = link.value().attr("hreflang")?.trim();
            let href = link.value().attr("href")?.trim();
            if lang.is_empty() || href.is_empty() {
                return None;
            }
            let url = resolve_asset(href, page_url)
                .map(|url| url.to_string())
                .unwrap_or_else(|| href.to_string());
            Some(Hreflang {
                lang: lang.to_string(),
                url,
            })
        })
        .collect()
}

fn extract_structured_data(document: &Html) -> Vec<serde_json::Value> {
    select_all(document, "script[type=\"application/ld+json\"]")
        .into_iter()
        .filter_map(|script| {
            let body = script.text().collect::<String>();
            if body.trim().is_empty() {
                return None;
            }
            match serde_json::from_str(body.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Counts whitespace-separated words in the visible body text
fn count_words(document: &Html) -> usize {
    let Some(body) = select_all(document, "body").into_iter().next() else {
        return 0;
    };

    let mut text = String::new();
    for node in body.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_TEXT_PARENTS.contains(&element.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    text.split_whitespace().count()
}

/// Returns the assets plus counts of images missing alt text and dimensions
fn extract_assets(document: &Html, page_url: &Url) -> (Vec<Asset>, usize, usize) {
    let mut assets = Vec::new();
    let mut missing_alt = 0;
    let mut missing_size = 0;

    for img in select_all(document, "img[src]") {
        let element = img.value();
        let Some(url) = element.attr("src").and_then(|src| resolve_asset(src, page_url)) else {
            continue;
        };

        let alt = element.attr("alt").map(str::trim).unwrap_or_default();
        if alt.is_empty() {
            missing_alt += 1;
        }
        if element.attr("width").is_none() || element.attr("height").is_none() {
            missing_size += 1;
        }

        assets.push(Asset {
            url: url.to_string(),
            kind: AssetKind::Image,
            alt: alt.to_string(),
        });
    }

    for (css, attr, kind) in [
        ("link[rel~=\"stylesheet\"][href]", "href", AssetKind::Stylesheet),
        ("script[src]", "src", AssetKind::Script),
    ] {
        for element in select_all(document, css) {
            if let Some(url) = element
                .value()
                .attr(attr)
                .and_then(|src| resolve_asset(src, page_url))
            {
                assets.push(Asset {
                    url: url.to_string(),
                    kind,
                    alt: String::new(),
                });
            }
        }
    }

    (assets, missing_alt, missing_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RuleMatcher;

    fn page_url() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    const FULL_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <title>  A Post About Soil  </title>
  <meta name="Description" content=" Everything about soil. ">
  <meta name="robots" content="index, follow">
  <link rel="canonical" href="/blog/post">
  <link rel="next" href="/blog/post?page=2">
  <link rel="amphtml" href="https://example.com/amp/post">
  <link rel="alternate" hreflang="de" href="https://example.com/de/post">
  <link rel="alternate" hreflang="fr" href="/fr/post">
  <link rel="stylesheet" href="/style.css">
  <script type="application/ld+json">{"@type": "Article"}</script>
  <script type="application/ld+json">{ not json</script>
  <script src="/app.js"></script>
</head>
<body>
  <h1>Soil</h1>
  <h2> Loam </h2>
  <h2></h2>
  <h2>Clay</h2>
  <p>One two three four.</p>
  <script>var hidden = "not counted words here";</script>
  <style>.x { color: red }</style>
  <a href="/about#team">About</a>
  <a href="https://other.org/">Other</a>
  <a href="#top">Top</a>
  <img src="/a.png" alt="A" width="10" height="10">
  <img src="/b.png">
</body>
</html>"##;

    #[test]
    fn test_full_page_details() {
        let analysis = analyze(FULL_PAGE, &page_url(), &[]);
        let details = &analysis.details;

        assert_eq!(details.title, "A Post About Soil");
        assert_eq!(details.description, "Everything about soil.");
        assert_eq!(details.meta_robots, "index, follow");
        assert_eq!(details.h1, "Soil");
        assert_eq!(details.h2, vec!["Loam", "Clay"]);
        assert_eq!(
            details.canonical.as_deref(),
            Some("https://example.com/blog/post")
        );
        assert_eq!(
            details.rel_next.as_deref(),
            Some("https://example.com/blog/post?page=2")
        );
        assert_eq!(details.rel_prev, None);
        assert_eq!(
            details.amphtml.as_deref(),
            Some("https://example.com/amp/post")
        );
        assert_eq!(details.hreflang.len(), 2);
        assert_eq!(details.hreflang[1].lang, "fr");
        assert_eq!(details.hreflang[1].url, "https://example.com/fr/post");
        assert_eq!(details.structured_data.len(), 1);
        assert_eq!(details.structured_data[0]["@type"], "Article");
    }

    #[test]
    fn test_word_count_skips_hidden_text() {
        let analysis = analyze(FULL_PAGE, &page_url(), &[]);
        // Soil, Loam, Clay, four words in the paragraph, About, Other, Top
        assert_eq!(analysis.details.word_count, 10);
    }

    #[test]
    fn test_word_count_separates_adjacent_elements() {
        let html = "<html><body><p>alpha</p><p>beta</p></body></html>";
        let analysis = analyze(html, &page_url(), &[]);
        assert_eq!(analysis.details.word_count, 2);
    }

    #[test]
    fn test_links_and_assets() {
        let analysis = analyze(FULL_PAGE, &page_url(), &[]);
        let links: Vec<&str> = analysis.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(links, vec!["https://example.com/about", "https://other.org/"]);

        let images: Vec<&Asset> = analysis
            .assets
            .iter()
            .filter(|a| a.kind == AssetKind::Image)
            .collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].alt, "A");
        assert_eq!(images[1].alt, "");
        assert!(analysis
            .assets
            .iter()
            .any(|a| a.kind == AssetKind::Stylesheet && a.url == "https://example.com/style.css"));
        assert!(analysis
            .assets
            .iter()
            .any(|a| a.kind == AssetKind::Script && a.url == "https://example.com/app.js"));
    }

    #[test]
    fn test_signals() {
        let analysis = analyze(FULL_PAGE, &page_url(), &[]);
        let signals = &analysis.signals;
        assert_eq!(signals.h1_count, 1);
        assert_eq!(signals.images_missing_alt, 1);
        assert_eq!(signals.images_missing_size, 1);
        assert!(signals.has_html_lang);
        assert!(!signals.bot_challenge);
        assert!(signals.security.is_none());
    }

    #[test]
    fn test_empty_document() {
        let analysis = analyze("", &page_url(), &[]);
        assert_eq!(analysis.details.title, "");
        assert_eq!(analysis.details.word_count, 0);
        assert!(analysis.details.canonical.is_none());
        assert!(analysis.links.is_empty());
        assert_eq!(analysis.signals.h1_count, 0);
        assert!(!analysis.signals.has_html_lang);
    }

    #[test]
    fn test_multiple_h1_counted() {
        let html = "<html><body><h1>First</h1><h1>Second</h1></body></html>";
        let analysis = analyze(html, &page_url(), &[]);
        assert_eq!(analysis.details.h1, "First");
        assert_eq!(analysis.signals.h1_count, 2);
    }

    #[test]
    fn test_custom_rules_feed_custom_data() {
        let rules = vec![
            ExtractionRule {
                id: "1".into(),
                name: "subheads".into(),
                matcher: RuleMatcher::Css("h2".into()),
            },
            ExtractionRule {
                id: "2".into(),
                name: "broken".into(),
                matcher: RuleMatcher::Regex("[".into()),
            },
        ];
        let analysis = analyze(FULL_PAGE, &page_url(), &rules);
        assert_eq!(analysis.custom_data["subheads"], vec!["Loam", "", "Clay"]);
        assert_eq!(analysis.signals.rule_failures, vec!["broken"]);
    }

    #[test]
    fn test_challenge_body_flagged() {
        let html = "<html><body><h1>Verify you are human</h1></body></html>";
        assert!(analyze(html, &page_url(), &[]).signals.bot_challenge);
    }
}

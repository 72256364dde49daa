//! URL handling module for SpiderFrog
//!
//! This module provides seed parsing, link resolution, domain extraction,
//! root-domain scoping and internal/external link classification.

mod domain;
mod normalize;
mod scope;

use serde::{Deserialize, Serialize};
use url::Url;

// Re-export main functions
pub use domain::extract_domain;
pub use normalize::{parse_seed, resolve_asset, resolve_link};
pub use scope::within_scope;

/// Link classification relative to the crawl's root domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Host is within the root-domain scope; candidate for the frontier
    Internal,
    /// Any other host; recorded on the page but never enqueued
    External,
}

impl LinkKind {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Classifies a resolved link against the root domain
///
/// # Examples
///
/// ```
/// use url::Url;
/// use spiderfrog::url::{classify_link, LinkKind};
///
/// let link = Url::parse("https://shop.example.com/cart").unwrap();
/// assert_eq!(classify_link(&link, "example.com"), LinkKind::Internal);
///
/// let link = Url::parse("https://b.com/").unwrap();
/// assert_eq!(classify_link(&link, "example.com"), LinkKind::External);
/// ```
pub fn classify_link(url: &Url, root_domain: &str) -> LinkKind {
    match extract_domain(url) {
        Some(host) if within_scope(root_domain, &host) => LinkKind::Internal,
        _ => LinkKind::External,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_link_is_internal() {
        let page = Url::parse("https://a.com/").unwrap();
        let link = resolve_link("https://a.com/x?y=1#frag", &page).unwrap();
        assert_eq!(link.as_str(), "https://a.com/x?y=1");
        assert_eq!(classify_link(&link, "a.com"), LinkKind::Internal);
    }

    #[test]
    fn test_other_domain_is_external() {
        let link = Url::parse("https://b.com/").unwrap();
        assert_eq!(classify_link(&link, "a.com"), LinkKind::External);
        assert!(!classify_link(&link, "a.com").is_internal());
    }

    #[test]
    fn test_case_insensitive_host() {
        let link = Url::parse("https://WWW.A.COM/page").unwrap();
        assert_eq!(classify_link(&link, "a.com"), LinkKind::Internal);
    }

    #[test]
    fn test_link_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LinkKind::Internal).unwrap(),
            "\"internal\""
        );
        let kind: LinkKind = serde_json::from_str("\"external\"").unwrap();
        assert_eq!(kind, LinkKind::External);
    }
}

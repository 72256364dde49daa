use crate::state::issue::{deserialize_known_issues, Issue};
use crate::url::LinkKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which fetch strategy produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Direct,
    Proxy,
    Server,
    Headless,
    /// No strategy produced a response
    #[default]
    None,
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Proxy => "proxy",
            Self::Server => "server",
            Self::Headless => "headless",
            Self::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// An outbound `<a href>` link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

/// Kind of referenced resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Image,
    Stylesheet,
    Script,
}

/// A referenced image, stylesheet or script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: AssetKind,
    /// Alt text for images, empty if absent
    #[serde(default)]
    pub alt: String,
}

/// An `hreflang` alternate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hreflang {
    pub lang: String,
    pub url: String,
}

/// Structural SEO signals extracted from a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageDetails {
    pub title: String,
    pub description: String,
    pub h1: String,
    pub h2: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    pub meta_robots: String,
    pub x_robots_tag: String,
    pub hreflang: Vec<Hreflang>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amphtml: Option<String>,
    pub structured_data: Vec<serde_json::Value>,
    pub word_count: usize,
}

/// One fetched URL and everything learned about it
///
/// Records are replaced wholesale, never patched, so that cross-page
/// aggregates stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    #[serde(default)]
    pub url: String,
    /// HTTP status, or 0 when no response was obtained
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub byte_size: usize,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub source: FetchSource,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub details: PageDetails,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_known_issues")]
    pub issues: Vec<Issue>,
}

impl PageRecord {
    /// Creates an empty record for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 0,
            content_type: String::new(),
            byte_size: 0,
            latency_ms: 0,
            source: FetchSource::None,
            fetched_at: Utc::now(),
            details: PageDetails::default(),
            links: Vec::new(),
            assets: Vec::new(),
            custom_data: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// True when no response was obtained
    pub fn is_failure(&self) -> bool {
        self.status == 0
    }

    /// True for 3xx responses, whose body is a stub rather than content
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// An empty content type is treated as HTML
    pub fn is_html(&self) -> bool {
        self.content_type.is_empty() || self.content_type.to_ascii_lowercase().contains("html")
    }

    pub fn internal_links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|link| link.kind.is_internal())
    }

    pub fn images(&self) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Image)
    }
}

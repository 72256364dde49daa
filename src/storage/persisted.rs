//! On-disk shape of the crawl session
//!
//! Loading is lenient field by field: a field of the wrong shape falls back
//! to its empty value and individual malformed records are skipped, so a
//! partially corrupted blob still yields a usable session.

use crate::analysis::refresh_duplicates;
use crate::state::{CrawlSession, ExtractionRule, Frontier, PageRecord};
use crate::url::{extract_domain, within_scope};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

/// Serialized form of a [`CrawlSession`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    #[serde(deserialize_with = "lenient_pages")]
    pub pages: BTreeMap<String, PageRecord>,
    #[serde(deserialize_with = "lenient_vec")]
    pub frontier: Vec<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub visited: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub root_domain: String,
    #[serde(deserialize_with = "lenient_vec")]
    pub extraction_rules: Vec<ExtractionRule>,
    #[serde(deserialize_with = "lenient")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient")]
    pub config_hash: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub running: bool,
}

/// Any value of the wrong shape becomes `T::default()`
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keeps the well-formed elements of an array, anything else is empty
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Keeps the well-formed page records of an object keyed by URL
fn lenient_pages<'de, D>(deserializer: D) -> Result<BTreeMap<String, PageRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries,
        _ => return Ok(BTreeMap::new()),
    };

    let mut pages = BTreeMap::new();
    for (key, value) in entries {
        match serde_json::from_value::<PageRecord>(value) {
            Ok(mut record) => {
                if record.url.is_empty() {
                    record.url = key.clone();
                }
                pages.insert(key, record);
            }
            Err(e) => warn!("Skipping malformed page record {}: {}", key, e),
        }
    }
    Ok(pages)
}

impl PersistedState {
    /// Parses a stored blob, falling back to an empty state if unreadable
    pub fn from_json(blob: &str) -> Self {
        match serde_json::from_str(blob) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unreadable session blob: {}", e);
                Self::default()
            }
        }
    }

    /// Rebuilds a session
    ///
    /// The session is never running after load. Frontier, visited set and
    /// pages are restricted to the root-domain scope; every frontier entry
    /// is also considered visited.
    pub fn into_session(self) -> CrawlSession {
        let root = self.root_domain;
        let in_scope = |url: &str| {
            !root.is_empty()
                && Url::parse(url)
                    .ok()
                    .and_then(|u| extract_domain(&u))
                    .is_some_and(|host| within_scope(&root, &host))
        };

        // Enqueue first: enqueueing dedupes and marks visited in one step
        let mut frontier = Frontier::new();
        for url in self.frontier.iter().filter(|url| in_scope(url)) {
            frontier.enqueue(url.as_str());
        }
        for url in self.visited.iter().filter(|url| in_scope(url)) {
            frontier.mark_visited(url.as_str());
        }

        let mut pages: BTreeMap<String, PageRecord> = self
            .pages
            .into_iter()
            .filter(|(url, _)| in_scope(url))
            .collect();
        refresh_duplicates(&mut pages);

        CrawlSession {
            root_domain: root,
            frontier,
            pages,
            running: false,
            extraction_rules: self.extraction_rules,
            started_at: self.started_at,
            config_hash: self.config_hash,
        }
    }
}

impl From<&CrawlSession> for PersistedState {
    fn from(session: &CrawlSession) -> Self {
        let mut visited: Vec<String> = session.frontier.visited().cloned().collect();
        visited.sort();

        Self {
            pages: session.pages.clone(),
            frontier: session.frontier.pending().cloned().collect(),
            visited,
            root_domain: session.root_domain.clone(),
            extraction_rules: session.extraction_rules.clone(),
            started_at: session.started_at,
            config_hash: session.config_hash.clone(),
            running: session.running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{IssueCode, RuleMatcher};

    #[test]
    fn test_garbage_blob_is_fresh_session() {
        let session = PersistedState::from_json("not json at all").into_session();
        assert!(session.root_domain().is_empty());
        assert!(session.pages().is_empty());
        assert!(session.frontier().is_empty());
    }

    #[test]
    fn test_wrong_shapes_become_empty() {
        let blob = r#"{
            "rootDomain": "example.com",
            "visited": {},
            "frontier": "nope",
            "pages": [],
            "extractionRules": 7,
            "running": "yes"
        }"#;
        let session = PersistedState::from_json(blob).into_session();
        assert_eq!(session.root_domain(), "example.com");
        assert_eq!(session.frontier().visited_count(), 0);
        assert!(session.frontier().is_empty());
        assert!(session.pages().is_empty());
        assert!(session.extraction_rules().is_empty());
        assert!(!session.is_running());
    }

    #[test]
    fn test_running_cleared_and_frontier_scoped() {
        let blob = r#"{
            "rootDomain": "example.com",
            "running": true,
            "frontier": [
                "https://example.com/a",
                "https://example.com/a",
                "https://blog.example.com/",
                "https://other.org/",
                "garbage"
            ],
            "visited": ["https://example.com/", "https://other.org/x"]
        }"#;
        let session = PersistedState::from_json(blob).into_session();
        assert!(!session.is_running());

        let pending: Vec<&String> = session.frontier().pending().collect();
        assert_eq!(pending, vec!["https://example.com/a", "https://blog.example.com/"]);
        assert!(session.frontier().is_visited("https://example.com/"));
        assert!(session.frontier().is_visited("https://example.com/a"));
        assert!(!session.frontier().is_visited("https://other.org/x"));
    }

    #[test]
    fn test_malformed_records_skipped() {
        let blob = r#"{
            "rootDomain": "example.com",
            "pages": {
                "https://example.com/": {"status": 200, "details": {"title": "Home"}},
                "https://example.com/bad": {"status": "two hundred"},
                "https://elsewhere.net/": {"status": 200}
            },
            "extractionRules": [
                {"id": "r1", "name": "Prices", "kind": "css", "pattern": ".price"},
                {"id": "r2", "name": "Broken"}
            ]
        }"#;
        let session = PersistedState::from_json(blob).into_session();

        assert_eq!(session.pages().len(), 1);
        let home = session.page("https://example.com/").unwrap();
        assert_eq!(home.url, "https://example.com/");
        assert_eq!(home.details.title, "Home");

        assert_eq!(session.extraction_rules().len(), 1);
        assert_eq!(session.extraction_rules()[0].name, "Prices");
    }

    #[test]
    fn test_round_trip_recomputes_duplicates() {
        let mut session = CrawlSession::new();
        session.start("https://example.com").unwrap();
        session.add_rule(ExtractionRule::new("Price", RuleMatcher::Css(".p".into())));
        for url in ["https://example.com/a", "https://example.com/b"] {
            let mut record = PageRecord::new(url);
            record.status = 200;
            record.details.title = "Same".to_string();
            session.record_page(record);
        }

        let blob = serde_json::to_string(&PersistedState::from(&session)).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["rootDomain"], "example.com");
        assert!(value["visited"].is_array());

        let restored = PersistedState::from_json(&blob).into_session();
        assert!(!restored.is_running());
        assert_eq!(restored.extraction_rules().len(), 1);
        assert_eq!(restored.frontier().len(), 1);
        assert!(restored.pages().values().all(|page| page
            .issues
            .iter()
            .any(|issue| issue.code == IssueCode::TitleDuplicate)));
    }

    #[test]
    fn test_empty_root_drops_urls() {
        let blob = r#"{"frontier": ["https://example.com/"], "pages": {"https://example.com/": {}}}"#;
        let session = PersistedState::from_json(blob).into_session();
        assert!(session.frontier().is_empty());
        assert!(session.pages().is_empty());
    }
}

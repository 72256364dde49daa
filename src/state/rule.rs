use serde::{Deserialize, Serialize};
use std::fmt;

/// How an extraction rule selects content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleMatcher {
    /// CSS selector; each matched element's trimmed text is captured
    Css(String),
    /// Regular expression applied to the raw HTML; the first capture group
    /// (or the whole match) is captured per occurrence
    Regex(String),
}

impl RuleMatcher {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Css(_) => RuleKind::Css,
            Self::Regex(_) => RuleKind::Regex,
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Self::Css(pattern) | Self::Regex(pattern) => pattern,
        }
    }
}

/// Rule kind tag as it appears in persisted and delegated JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Css,
    Regex,
}

impl RuleKind {
    pub fn with_pattern(self, pattern: impl Into<String>) -> RuleMatcher {
        match self {
            Self::Css => RuleMatcher::Css(pattern.into()),
            Self::Regex => RuleMatcher::Regex(pattern.into()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// User-defined custom extraction
///
/// Serialized flat as `{id, name, kind, pattern}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRule", into = "RawRule")]
pub struct ExtractionRule {
    pub id: String,
    pub name: String,
    pub matcher: RuleMatcher,
}

impl ExtractionRule {
    /// Creates a rule with a fresh random id
    pub fn new(name: impl Into<String>, matcher: RuleMatcher) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            matcher,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawRule {
    id: String,
    name: String,
    kind: RuleKind,
    pattern: String,
}

impl From<RawRule> for ExtractionRule {
    fn from(raw: RawRule) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            matcher: raw.kind.with_pattern(raw.pattern),
        }
    }
}

impl From<ExtractionRule> for RawRule {
    fn from(rule: ExtractionRule) -> Self {
        Self {
            id: rule.id,
            name: rule.name,
            kind: rule.matcher.kind(),
            pattern: rule.matcher.pattern().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rule_gets_unique_id() {
        let a = ExtractionRule::new("price", RuleMatcher::Css(".price".into()));
        let b = ExtractionRule::new("price", RuleMatcher::Css(".price".into()));
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 36);
    }

    #[test]
    fn test_flat_json_shape() {
        let rule = ExtractionRule {
            id: "r1".into(),
            name: "sku".into(),
            matcher: RuleMatcher::Regex(r#"data-sku="(\w+)""#.into()),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["kind"], "regex");
        assert_eq!(json["pattern"], r#"data-sku="(\w+)""#);

        let back: ExtractionRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<ExtractionRule, _> =
            serde_json::from_str(r#"{"id":"x","name":"n","kind":"xpath","pattern":"//a"}"#);
        assert!(result.is_err());
    }
}

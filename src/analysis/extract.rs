//! Custom extraction rules
//!
//! Patterns come from the operator and are untrusted. A rule that fails to
//! compile contributes a single placeholder and never affects other rules.

use crate::state::{ExtractionRule, RuleMatcher};
use regex::RegexBuilder;
use scraper::{Html, Selector};
use std::collections::BTreeMap;

/// Value recorded for a rule whose pattern could not be applied
pub const EXTRACTION_ERROR: &str = "Extraction Error";

/// Compiled-size cap for operator-supplied regular expressions
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Result of running every rule against one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutput {
    /// Rule name to captured values; rules with no matches are absent
    pub values: BTreeMap<String, Vec<String>>,
    /// Names of rules that failed
    pub failures: Vec<String>,
}

/// Runs every rule against a parsed document and its raw HTML
pub fn apply_rules(document: &Html, html: &str, rules: &[ExtractionRule]) -> RuleOutput {
    let mut output = RuleOutput::default();

    for rule in rules {
        match apply_rule(document, html, &rule.matcher) {
            Ok(values) if values.is_empty() => {}
            Ok(values) => {
                output.values.insert(rule.name.clone(), values);
            }
            Err(reason) => {
                tracing::warn!("Extraction rule '{}' failed: {}", rule.name, reason);
                output
                    .values
                    .insert(rule.name.clone(), vec![EXTRACTION_ERROR.to_string()]);
                output.failures.push(rule.name.clone());
            }
        }
    }

    output
}

fn apply_rule(document: &Html, html: &str, matcher: &RuleMatcher) -> Result<Vec<String>, String> {
    match matcher {
        RuleMatcher::Css(pattern) => {
            let selector =
                Selector::parse(pattern).map_err(|e| format!("invalid selector: {:?}", e))?;
            Ok(document
                .select(&selector)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .collect())
        }
        RuleMatcher::Regex(pattern) => {
            let regex = RegexBuilder::new(pattern)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
                .map_err(|e| format!("invalid pattern: {}", e))?;
            Ok(regex
                .captures_iter(html)
                .filter_map(|caps| {
                    caps.get(1)
                        .filter(|group| !group.as_str().is_empty())
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_string())
                })
                .collect())
        }
    }
}

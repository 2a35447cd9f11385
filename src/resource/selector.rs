//! Label selectors
//!
//! Selectors are comma-joined terms: `key=value`, `key!=value`, `key`,
//! `!key`, `key in (a,b)` and `key notin (a,b)`. Commas inside a value set
//! do not split terms. The client validates them before any I/O; the server
//! evaluates them.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single selector term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorTerm {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists { key: String },
    NotExists { key: String },
    In { key: String, values: Vec<String> },
    NotIn { key: String, values: Vec<String> },
}

impl SelectorTerm {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            SelectorTerm::Equals { key, value } => labels.get(key) == Some(value),
            SelectorTerm::NotEquals { key, value } => labels.get(key) != Some(value),
            SelectorTerm::Exists { key } => labels.contains_key(key),
            SelectorTerm::NotExists { key } => !labels.contains_key(key),
            SelectorTerm::In { key, values } => labels.get(key).map_or(false, |v| values.contains(v)),
            SelectorTerm::NotIn { key, values } => labels.get(key).map_or(true, |v| !values.contains(v)),
        }
    }
}

impl fmt::Display for SelectorTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorTerm::Equals { key, value } => write!(f, "{}={}", key, value),
            SelectorTerm::NotEquals { key, value } => write!(f, "{}!={}", key, value),
            SelectorTerm::Exists { key } => write!(f, "{}", key),
            SelectorTerm::NotExists { key } => write!(f, "!{}", key),
            SelectorTerm::In { key, values } => write!(f, "{} in ({})", key, values.join(",")),
            SelectorTerm::NotIn { key, values } => write!(f, "{} notin ({})", key, values.join(",")),
        }
    }
}

/// Conjunction of selector terms; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    terms: Vec<SelectorTerm>,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

fn checked_key(key: &str, raw: &str) -> Result<String> {
    let key = key.trim();
    if valid_key(key) {
        Ok(key.to_string())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid label key in selector term {:?}",
            raw
        )))
    }
}

fn invalid_term(raw: &str, reason: &str) -> Error {
    Error::InvalidArgument(format!("{} in selector term {:?}", reason, raw))
}

/// Split on commas outside parentheses
fn split_terms(selector: &str) -> Result<Vec<&str>> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid_term(selector, "unbalanced parenthesis"))?;
            }
            ',' if depth == 0 => {
                terms.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid_term(selector, "unbalanced parenthesis"));
    }
    terms.push(&selector[start..]);
    Ok(terms)
}

/// `key in (a,b)` / `key notin (a,b)`
fn parse_set_term(raw: &str) -> Result<SelectorTerm> {
    let (head, rest) = raw
        .split_once('(')
        .ok_or_else(|| invalid_term(raw, "missing value set"))?;
    let inner = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| invalid_term(raw, "unterminated value set"))?;

    let mut words = head.split_whitespace();
    let (key, op) = match (words.next(), words.next(), words.next()) {
        (Some(key), Some(op), None) => (checked_key(key, raw)?, op),
        _ => return Err(invalid_term(raw, "expected `key in (...)` or `key notin (...)`")),
    };

    let values: Vec<String> = inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(invalid_term(raw, "empty value set"));
    }

    match op {
        "in" => Ok(SelectorTerm::In { key, values }),
        "notin" => Ok(SelectorTerm::NotIn { key, values }),
        _ => Err(invalid_term(raw, "unknown set operator")),
    }
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self> {
        let mut terms = Vec::new();

        for raw in split_terms(selector)? {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let term = if raw.contains('(') || raw.contains(')') {
                parse_set_term(raw)?
            } else if let Some((key, value)) = raw.split_once("!=") {
                SelectorTerm::NotEquals {
                    key: checked_key(key, raw)?,
                    value: value.trim().to_string(),
                }
            } else if let Some((key, value)) = raw.split_once('=') {
                SelectorTerm::Equals {
                    key: checked_key(key, raw)?,
                    value: value.trim_start_matches('=').trim().to_string(),
                }
            } else if let Some(key) = raw.strip_prefix('!') {
                SelectorTerm::NotExists {
                    key: checked_key(key, raw)?,
                }
            } else {
                SelectorTerm::Exists {
                    key: checked_key(raw, raw)?,
                }
            };

            terms.push(term);
        }

        Ok(Self { terms })
    }

    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push(SelectorTerm::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.terms.push(SelectorTerm::Exists { key: key.into() });
        self
    }

    pub fn not_exists(mut self, key: impl Into<String>) -> Self {
        self.terms.push(SelectorTerm::NotExists { key: key.into() });
        self
    }

    pub fn terms(&self) -> &[SelectorTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.terms.iter().all(|term| term.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.terms.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_and_match() {
        let selector = LabelSelector::parse("env=prod, !locked, fleet.dev/role").unwrap();
        assert_eq!(selector.terms().len(), 3);

        assert!(selector.matches(&labels(&[("env", "prod"), ("fleet.dev/role", "cp")])));
        assert!(!selector.matches(&labels(&[("env", "prod"), ("locked", ""), ("fleet.dev/role", "cp")])));
        assert!(!selector.matches(&labels(&[("env", "dev"), ("fleet.dev/role", "cp")])));
    }

    #[test]
    fn test_not_equals() {
        let selector = LabelSelector::parse("env!=prod").unwrap();
        assert!(selector.matches(&labels(&[("env", "dev")])));
        assert!(selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_set_terms() {
        let selector = LabelSelector::parse("env in (prod, staging),tier notin (edge),role").unwrap();
        assert_eq!(selector.terms().len(), 3);
        assert_eq!(
            selector.terms()[0],
            SelectorTerm::In {
                key: "env".into(),
                values: vec!["prod".into(), "staging".into()],
            }
        );

        assert!(selector.matches(&labels(&[("env", "staging"), ("role", "cp")])));
        assert!(!selector.matches(&labels(&[("env", "staging"), ("tier", "edge"), ("role", "cp")])));
        assert!(!selector.matches(&labels(&[("env", "dev"), ("role", "cp")])));
        assert!(!selector.matches(&labels(&[("role", "cp")])));

        assert_eq!(
            selector.to_string(),
            "env in (prod,staging),tier notin (edge),role"
        );
    }

    #[test]
    fn test_malformed_set_terms() {
        assert_matches!(LabelSelector::parse("env in (prod"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("env in prod)"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("env in ()"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("env within (a)"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("in (a)"), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_matches_all() {
        let selector = LabelSelector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[("a", "b")])));
    }

    #[test]
    fn test_invalid_key() {
        assert_matches!(LabelSelector::parse("=prod"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("bad key=1"), Err(Error::InvalidArgument(_)));
        assert_matches!(LabelSelector::parse("!"), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_display_roundtrip() {
        let selector = LabelSelector::new().equals("env", "prod").not_exists("locked");
        assert_eq!(selector.to_string(), "env=prod,!locked");
        assert_eq!(LabelSelector::parse(&selector.to_string()).unwrap(), selector);
    }
}

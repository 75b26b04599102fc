//! Label selector evaluation
//!
//! Two forms are supported:
//!
//! - structured `LabelSelector` objects found in specs (`matchLabels` and
//!   `matchExpressions`), via [`selects`]
//! - the string form used on the command line and in list calls
//!   (`app=web,tier!=db,env in (prod,staging),!legacy`), via [`SelectorExpr`]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid label selector '{selector}': {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// Does a spec `LabelSelector` select an object with these labels?
///
/// An empty selector selects everything. Unknown operators select nothing.
pub fn selects(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if let Some(match_labels) = &selector.match_labels {
        let all_match = match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value));
        if !all_match {
            return false;
        }
    }

    let Some(expressions) = &selector.match_expressions else {
        return true;
    };

    expressions.iter().all(|expr| {
        let values = expr.values.as_deref().unwrap_or_default();
        let current = labels.get(&expr.key);
        match expr.operator.as_str() {
            "In" => current.is_some_and(|v| values.contains(v)),
            "NotIn" => current.map_or(true, |v| !values.contains(v)),
            "Exists" => current.is_some(),
            "DoesNotExist" => current.is_none(),
            _ => false,
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, values) => labels.get(k).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(k, values) => labels.get(k).map_or(true, |v| !values.contains(v)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }
}

/// Parsed string-form selector; all requirements must hold
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorExpr {
    requirements: Vec<Requirement>,
}

impl SelectorExpr {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl FromStr for SelectorExpr {
    type Err = SelectorError;

    fn from_str(selector: &str) -> Result<Self, Self::Err> {
        let error = |message: &str| SelectorError {
            selector: selector.to_string(),
            message: message.to_string(),
        };

        let mut requirements = Vec::new();
        for term in split_terms(selector) {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            requirements.push(parse_term(term).map_err(|m| error(&m))?);
        }

        Ok(Self { requirements })
    }
}

/// Split on commas that are not inside a `(...)` value set
pub(crate) fn split_terms(selector: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&selector[start..]);
    terms
}

fn parse_term(term: &str) -> Result<Requirement, String> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::DoesNotExist(valid_key(key)?));
    }

    if let Some((key, value)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(valid_key(key)?, value.trim().to_string()));
    }

    if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
        return Ok(Requirement::Equals(valid_key(key)?, value.trim().to_string()));
    }

    if let Some((key, rest)) = split_set_operator(term, " notin ") {
        return Ok(Requirement::NotIn(valid_key(key)?, parse_set(rest)?));
    }

    if let Some((key, rest)) = split_set_operator(term, " in ") {
        return Ok(Requirement::In(valid_key(key)?, parse_set(rest)?));
    }

    Ok(Requirement::Exists(valid_key(term)?))
}

fn split_set_operator<'a>(term: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    term.find(op).map(|i| (&term[..i], &term[i + op.len()..]))
}

fn parse_set(rest: &str) -> Result<Vec<String>, String> {
    let inner = rest
        .trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| "value set must be wrapped in parentheses".to_string())?;

    Ok(inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

fn valid_key(key: &str) -> Result<String, String> {
    let key = key.trim();
    if key.is_empty() {
        return Err("empty label key".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("label key '{}' contains whitespace", key));
    }
    Ok(key.to_string())
}

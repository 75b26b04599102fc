//! Exception allow-list
//!
//! Entries come from the config file (plus built-ins) and are compiled once
//! per run. An entry matches a candidate when its `resourceName` and
//! `namespace` equal the candidate's, or, with `matchRegex`, when both fields
//! compile as regexes that match the candidate's name and namespace.
//! Regexes are unanchored.

use crate::cluster::ResourceKind;
use crate::config::Config;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// One allow-list entry as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExceptionResource {
    #[serde(alias = "Namespace")]
    pub namespace: String,
    #[serde(alias = "ResourceName")]
    pub resource_name: String,
    #[serde(alias = "MatchRegex")]
    pub match_regex: bool,
}

impl ExceptionResource {
    pub fn exact(namespace: &str, resource_name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            resource_name: resource_name.to_string(),
            match_regex: false,
        }
    }

    pub fn regex(namespace: &str, resource_name: &str) -> Self {
        Self {
            match_regex: true,
            ..Self::exact(namespace, resource_name)
        }
    }
}

/// Errors in the exception configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error(
        "Invalid pattern in {kind} exception #{index} (namespace '{namespace}', name '{resource_name}'): {message}"
    )]
    InvalidPattern {
        kind: ResourceKind,
        index: usize,
        namespace: String,
        resource_name: String,
        message: String,
    },
}

#[derive(Debug)]
enum CompiledEntry {
    Exact {
        namespace: String,
        name: String,
    },
    /// `matchRegex` entries still match exactly on the literal fields
    Pattern {
        namespace: String,
        name: String,
        namespace_re: Regex,
        name_re: Regex,
    },
}

impl CompiledEntry {
    fn matches(&self, name: &str, ns: &str) -> bool {
        match self {
            CompiledEntry::Exact { namespace, name: n } => n == name && namespace == ns,
            CompiledEntry::Pattern {
                namespace,
                name: n,
                namespace_re,
                name_re,
            } => {
                (n == name && namespace == ns)
                    || (namespace_re.is_match(ns) && name_re.is_match(name))
            }
        }
    }
}

/// Compiled allow-list for one kind
#[derive(Debug, Default)]
pub struct ExceptionMatcher {
    entries: Vec<CompiledEntry>,
}

impl ExceptionMatcher {
    /// Compile the entries for `kind`.
    ///
    /// Entries whose patterns do not compile are reported and left out, so
    /// they never match.
    pub fn compile(kind: ResourceKind, entries: &[ExceptionResource]) -> (Self, Vec<ConfigError>) {
        let mut compiled = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            if !entry.match_regex {
                compiled.push(CompiledEntry::Exact {
                    namespace: entry.namespace.clone(),
                    name: entry.resource_name.clone(),
                });
                continue;
            }

            let patterns = Regex::new(&entry.namespace)
                .and_then(|ns| Regex::new(&entry.resource_name).map(|name| (ns, name)));

            match patterns {
                Ok((namespace_re, name_re)) => compiled.push(CompiledEntry::Pattern {
                    namespace: entry.namespace.clone(),
                    name: entry.resource_name.clone(),
                    namespace_re,
                    name_re,
                }),
                Err(e) => {
                    let error = ConfigError::InvalidPattern {
                        kind,
                        index,
                        namespace: entry.namespace.clone(),
                        resource_name: entry.resource_name.clone(),
                        message: e.to_string(),
                    };
                    warn!("{}", error);
                    errors.push(error);
                }
            }
        }

        (Self { entries: compiled }, errors)
    }

    pub fn is_exception(&self, name: &str, namespace: &str) -> bool {
        self.entries.iter().any(|e| e.matches(name, namespace))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Matchers for every auditable kind, built once per run and shared
/// read-only by all workers
#[derive(Debug, Default)]
pub struct ExceptionSet {
    matchers: HashMap<ResourceKind, ExceptionMatcher>,
}

impl ExceptionSet {
    pub fn from_config(config: &Config) -> (Self, Vec<ConfigError>) {
        let mut matchers = HashMap::new();
        let mut errors = Vec::new();

        for kind in ResourceKind::AUDITABLE {
            let (matcher, mut kind_errors) = ExceptionMatcher::compile(kind, config.exceptions_for(kind));
            errors.append(&mut kind_errors);
            if !matcher.is_empty() {
                matchers.insert(kind, matcher);
            }
        }

        (Self { matchers }, errors)
    }

    pub fn matcher(&self, kind: ResourceKind) -> Option<&ExceptionMatcher> {
        self.matchers.get(&kind)
    }

    pub fn is_exception(&self, kind: ResourceKind, name: &str, namespace: &str) -> bool {
        self.matcher(kind)
            .is_some_and(|m| m.is_exception(name, namespace))
    }
}

//! Liveness classification
//!
//! Each candidate goes through the same chain:
//! enumerate -> filter chain -> usage predicate -> exception allow-list.
//! A [`Finding`] is produced only when the filters keep the candidate, its
//! kind's predicate says it is unused, and no exception entry matches it.

mod aggregate;
mod auditor;
mod enumerate;
pub mod exceptions;
mod lookup;
pub mod predicates;
pub mod selector;

pub use aggregate::{GroupBy, GroupedResults, ReportEntry};
pub use auditor::{AuditOutcome, Auditor};
pub use enumerate::{enumerate, resolve_namespaces};
pub use exceptions::{ConfigError, ExceptionMatcher, ExceptionSet};
pub use lookup::Lookup;

use crate::cluster::{ApiError, ResourceKind};
use thiserror::Error;

/// Sentinel label. `true` exempts an object from auditing, `false` marks it
/// unused regardless of its state.
pub const USED_LABEL: &str = "kor/used";

/// Outcome of a usage predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Used,
    Unused(String),
}

impl Verdict {
    pub fn unused(reason: impl Into<String>) -> Self {
        Verdict::Unused(reason.into())
    }

    pub fn is_unused(&self) -> bool {
        matches!(self, Verdict::Unused(_))
    }
}

/// A resource judged unused, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub name: String,
    pub reason: String,
}

impl ResourceInfo {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// One unused resource found by a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: ResourceKind,
    /// `""` for cluster-scoped kinds
    pub namespace: String,
    pub info: ResourceInfo,
}

impl Finding {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, info: ResourceInfo) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Per-unit failures collected during a run.
///
/// Only `Setup` aborts a run; everything else is recovered at the unit
/// boundary (namespace, candidate, exception entry or delete call) and
/// reported next to the results.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Failed to list {kind} in namespace '{namespace}': {source}")]
    List {
        kind: ResourceKind,
        namespace: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to classify {kind} '{name}' in namespace '{namespace}': {source}")]
    Lookup {
        kind: ResourceKind,
        namespace: String,
        name: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to delete {kind} '{name}' in namespace '{namespace}': {source}")]
    Delete {
        kind: ResourceKind,
        namespace: String,
        name: String,
        #[source]
        source: ApiError,
    },
}

impl RunError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunError::Setup(_))
    }
}

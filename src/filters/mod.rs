//! Exclusion filters
//!
//! Filters only see generic object metadata. They run in a fixed order and
//! the first one that skips a candidate ends the chain; the candidate never
//! reaches its usage predicate.

mod age;
mod annotations;
mod labels;

pub use age::{parse_duration, AgeFilter};
pub use annotations::ExcludeAnnotationFilter;
pub use labels::{ExcludeLabelFilter, UsedLabelFilter};

use crate::analysis::selector::{SelectorError, SelectorExpr};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use thiserror::Error;

/// Filter settings shared by every kind in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Label selector pushed down to list calls
    pub include_labels: Option<String>,
    pub exclude_labels: Vec<String>,
    pub exclude_annotations: Vec<String>,
    /// Keep only objects younger than this (`30s`, `15m`, `6h`, `7d`)
    pub newer_than: Option<String>,
    /// Keep only objects older than this
    pub older_than: Option<String>,
    pub include_namespaces: Vec<String>,
    pub exclude_namespaces: Vec<String>,
}

impl FilterOptions {
    /// Reject settings that can never be satisfied or parsed
    pub fn validate(&self) -> Result<(), FilterError> {
        if !self.include_namespaces.is_empty() && !self.exclude_namespaces.is_empty() {
            return Err(FilterError::ConflictingNamespaces);
        }
        if let Some(selector) = &self.include_labels {
            selector.parse::<SelectorExpr>()?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error(transparent)]
    InvalidSelector(#[from] SelectorError),

    #[error("invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    #[error("--include-namespaces and --exclude-namespaces cannot be used together")]
    ConflictingNamespaces,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Skip(String),
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip(_))
    }
}

/// One exclusion rule
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, meta: &ObjectMeta) -> Decision;
}

/// The ordered filter chain for a run
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Build the chain: used label, excluded labels, excluded annotations, age
    pub fn from_options(options: &FilterOptions) -> Result<Self, FilterError> {
        options.validate()?;

        let mut filters: Vec<Box<dyn Filter>> = vec![Box::new(UsedLabelFilter)];

        if !options.exclude_labels.is_empty() {
            filters.push(Box::new(ExcludeLabelFilter::new(&options.exclude_labels)?));
        }
        if !options.exclude_annotations.is_empty() {
            filters.push(Box::new(ExcludeAnnotationFilter::new(
                &options.exclude_annotations,
            )));
        }
        if options.newer_than.is_some() || options.older_than.is_some() {
            filters.push(Box::new(AgeFilter::new(
                options.newer_than.as_deref(),
                options.older_than.as_deref(),
            )?));
        }

        Ok(Self { filters })
    }

    /// Chain with explicit filters, in the given order
    pub fn with_filters(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn evaluate(&self, meta: &ObjectMeta) -> Decision {
        for filter in &self.filters {
            let decision = filter.check(meta);
            if decision.is_skip() {
                return decision;
            }
        }
        Decision::Keep
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::with_filters(vec![Box::new(UsedLabelFilter)])
    }
}

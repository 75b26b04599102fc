use super::{Decision, Filter, FilterError};
use crate::analysis::selector::{split_terms, SelectorExpr};
use crate::analysis::USED_LABEL;
use crate::cluster::{label_value, labels_of};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Skips objects labelled `kor/used=true`
pub struct UsedLabelFilter;

impl Filter for UsedLabelFilter {
    fn name(&self) -> &'static str {
        "used-label"
    }

    fn check(&self, meta: &ObjectMeta) -> Decision {
        if label_value(meta, USED_LABEL) == Some("true") {
            Decision::Skip("marked as used".to_string())
        } else {
            Decision::Keep
        }
    }
}

/// Skips objects matching any of the `--exclude-labels` terms.
///
/// Each flag value may hold several comma-separated terms; commas inside a
/// `(...)` value set belong to the term.
pub struct ExcludeLabelFilter {
    selectors: Vec<(String, SelectorExpr)>,
}

impl ExcludeLabelFilter {
    pub fn new(entries: &[String]) -> Result<Self, FilterError> {
        let selectors = entries
            .iter()
            .flat_map(|e| split_terms(e))
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| term.parse::<SelectorExpr>().map(|s| (term.to_string(), s)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }
}

impl Filter for ExcludeLabelFilter {
    fn name(&self) -> &'static str {
        "exclude-labels"
    }

    fn check(&self, meta: &ObjectMeta) -> Decision {
        let labels = labels_of(meta);
        match self.selectors.iter().find(|(_, s)| s.matches(labels)) {
            Some((entry, _)) => Decision::Skip(format!("excluded by label {}", entry)),
            None => Decision::Keep,
        }
    }
}

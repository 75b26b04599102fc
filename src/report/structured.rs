use super::ReportError;
use crate::analysis::GroupedResults;

/// `{"ns": {"Deployment": ["d1"]}}`, pretty-printed
pub struct JsonReporter;

impl JsonReporter {
    pub fn render(&self, results: &GroupedResults) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(results)?)
    }
}

/// Same shape as JSON
pub struct YamlReporter;

impl YamlReporter {
    pub fn render(&self, results: &GroupedResults) -> Result<String, ReportError> {
        Ok(serde_yaml::to_string(results)?)
    }
}

use super::{Decision, Filter};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Skips objects carrying any of the `--exclude-annotations` entries.
///
/// An entry is `key=value` (exact value) or a bare `key` (any value).
pub struct ExcludeAnnotationFilter {
    entries: Vec<(String, Option<String>)>,
}

impl ExcludeAnnotationFilter {
    pub fn new(entries: &[String]) -> Self {
        let entries = entries
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| match e.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
                None => (e.to_string(), None),
            })
            .collect();
        Self { entries }
    }
}

impl Filter for ExcludeAnnotationFilter {
    fn name(&self) -> &'static str {
        "exclude-annotations"
    }

    fn check(&self, meta: &ObjectMeta) -> Decision {
        let Some(annotations) = &meta.annotations else {
            return Decision::Keep;
        };

        for (key, expected) in &self.entries {
            let hit = match (annotations.get(key), expected) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if hit {
                return Decision::Skip(format!("excluded by annotation {}", key));
            }
        }
        Decision::Keep
    }
}

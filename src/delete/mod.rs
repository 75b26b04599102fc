//! Deletion of unused resources
//!
//! Runs after classification, over the findings of a pass. Nothing is
//! re-listed; an object that changed since it was listed is deleted (or
//! fails to delete) as-is.

mod safe_delete;

pub use safe_delete::{Answer, DialoguerPrompter, Prompter, SafeDeleter, ScriptedPrompter};

use crate::analysis::{Finding, GroupBy, GroupedResults, RunError};

/// What happened to one finding during deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    /// The user declined the deletion
    Skipped,
    /// The user declined and had the object labelled `kor/used=true`
    FlaggedUsed,
    Failed(String),
    /// Not attempted, the run was interrupted first
    Cancelled,
}

impl DeletionOutcome {
    /// Suffix appended to the name in structured output
    pub fn suffix(&self) -> &'static str {
        match self {
            DeletionOutcome::Deleted => "-DELETED",
            DeletionOutcome::Failed(_) => "-FAILED",
            DeletionOutcome::Skipped | DeletionOutcome::FlaggedUsed | DeletionOutcome::Cancelled => {
                "-SKIPPED"
            }
        }
    }

    /// Status column text in tables
    pub fn label(&self) -> &'static str {
        match self {
            DeletionOutcome::Deleted => "Deleted",
            DeletionOutcome::Skipped => "Skipped",
            DeletionOutcome::FlaggedUsed => "Flagged as used",
            DeletionOutcome::Failed(_) => "Failed",
            DeletionOutcome::Cancelled => "Cancelled",
        }
    }

    /// The object still exists and nothing marks it as used
    pub fn is_still_unused(&self) -> bool {
        matches!(
            self,
            DeletionOutcome::Skipped | DeletionOutcome::Failed(_) | DeletionOutcome::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub finding: Finding,
    pub outcome: DeletionOutcome,
}

/// Result of a deletion run
#[derive(Debug, Default)]
pub struct DeletionSummary {
    pub records: Vec<DeletionRecord>,
    pub errors: Vec<RunError>,
}

impl DeletionSummary {
    /// Everything the pass classified as unused, whatever happened next
    pub fn flagged(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.records.iter()
    }

    /// Only what is still unused after deletion: declined, failed or
    /// never attempted
    pub fn still_unused(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.records.iter().filter(|r| r.outcome.is_still_unused())
    }

    pub fn deleted(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == DeletionOutcome::Deleted)
            .count()
    }

    /// Report of every flagged resource, annotated with its outcome
    pub fn to_results(&self, group_by: GroupBy) -> GroupedResults {
        let mut results = GroupedResults::new(group_by);
        for record in &self.records {
            results.insert(record.finding.clone(), Some(record.outcome.clone()));
        }
        results
    }
}

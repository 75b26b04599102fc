//! Grouping of findings for reporting
//!
//! Groups keep insertion order, which follows the namespace scan and the
//! kind order of the run. Groups only exist once they hold an entry, so
//! empty groups never show up in a report.

use super::Finding;
use crate::delete::DeletionOutcome;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

/// Grouping strategy, chosen once per run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupBy {
    /// outer key = namespace, inner key = kind
    #[default]
    Namespace,
    /// outer key = kind, inner key = namespace
    Resource,
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "namespace" => Ok(GroupBy::Namespace),
            "resource" => Ok(GroupBy::Resource),
            other => Err(format!(
                "unknown grouping '{}', expected 'namespace' or 'resource'",
                other
            )),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::Namespace => f.write_str("namespace"),
            GroupBy::Resource => f.write_str("resource"),
        }
    }
}

/// One reported resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub name: String,
    pub reason: String,
    /// Set when the run deleted (or tried to delete) the resource
    pub deletion: Option<DeletionOutcome>,
}

impl ReportEntry {
    /// Name as shown in structured output, with the deletion suffix
    pub fn display_name(&self) -> String {
        match &self.deletion {
            Some(outcome) => format!("{}{}", self.name, outcome.suffix()),
            None => self.name.clone(),
        }
    }
}

type Group = (String, Vec<ReportEntry>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedResults {
    group_by: GroupBy,
    groups: Vec<(String, Vec<Group>)>,
}

impl GroupedResults {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: Vec::new(),
        }
    }

    pub fn from_findings(group_by: GroupBy, findings: impl IntoIterator<Item = Finding>) -> Self {
        let mut results = Self::new(group_by);
        for finding in findings {
            results.insert(finding, None);
        }
        results
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    pub fn insert(&mut self, finding: Finding, deletion: Option<DeletionOutcome>) {
        let kind = finding.kind.display_name().to_string();
        let (outer, inner) = match self.group_by {
            GroupBy::Namespace => (finding.namespace, kind),
            GroupBy::Resource => (kind, finding.namespace),
        };

        let entry = ReportEntry {
            name: finding.info.name,
            reason: finding.info.reason,
            deletion,
        };

        let outer_index = match self.groups.iter().position(|(key, _)| *key == outer) {
            Some(i) => i,
            None => {
                self.groups.push((outer, Vec::new()));
                self.groups.len() - 1
            }
        };
        let inner_groups = &mut self.groups[outer_index].1;
        match inner_groups.iter().position(|(key, _)| *key == inner) {
            Some(i) => inner_groups[i].1.push(entry),
            None => inner_groups.push((inner, vec![entry])),
        }
    }

    /// Outer groups in insertion order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[Group])> {
        self.groups
            .iter()
            .map(|(key, inner)| (key.as_str(), inner.as_slice()))
    }

    pub fn entries(&self, outer: &str, inner: &str) -> &[ReportEntry] {
        self.groups
            .iter()
            .find(|(key, _)| key == outer)
            .and_then(|(_, groups)| groups.iter().find(|(key, _)| key == inner))
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or_default()
    }

    /// Plain names under one (outer, inner) key, in insertion order
    pub fn names(&self, outer: &str, inner: &str) -> Vec<&str> {
        self.entries(outer, inner)
            .iter()
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|(_, inner)| inner.iter())
            .map(|(_, entries)| entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn all_entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.groups
            .iter()
            .flat_map(|(_, inner)| inner.iter())
            .flat_map(|(_, entries)| entries.iter())
    }
}

struct InnerGroups<'a>(&'a [Group]);

struct Names<'a>(&'a [ReportEntry]);

impl Serialize for Names<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(ReportEntry::display_name))
    }
}

impl Serialize for InnerGroups<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, entries) in self.0 {
            map.serialize_entry(key, &Names(entries))?;
        }
        map.end()
    }
}

/// `{outer: {inner: [name, ...]}}`
impl Serialize for GroupedResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (key, inner) in &self.groups {
            map.serialize_entry(key, &InnerGroups(inner))?;
        }
        map.end()
    }
}

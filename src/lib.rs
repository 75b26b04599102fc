//! kor - discover and remove unused Kubernetes resources
//!
//! This library audits a live cluster and reports objects that look unused:
//! idle workloads, unreferenced ConfigMaps and Secrets, Services without
//! endpoints and so on.
//!
//! # Architecture
//!
//! Every kind goes through the same pipeline:
//! 1. **Enumeration** - List candidates per namespace (or cluster-wide)
//! 2. **Filtering** - Drop candidates by label, annotation or age
//! 3. **Usage predicate** - Kind-specific rule, with cross-kind lookups
//! 4. **Exceptions** - Configured allow-list
//! 5. **Deletion** - Optional, interactive by default
//! 6. **Reporting** - Table, JSON or YAML, optionally sent to Slack

pub mod analysis;
pub mod cluster;
pub mod config;
pub mod delete;
pub mod filters;
pub mod notify;
pub mod report;
pub mod scan;

pub use analysis::{Finding, GroupBy, GroupedResults, ResourceInfo, RunError, Verdict};
pub use cluster::{ApiError, CancelFlag, ClusterApi, KubeClusterApi, MemoryCluster, Resource, ResourceKind};
pub use config::Config;
pub use delete::{DeletionOutcome, DeletionSummary, SafeDeleter};
pub use filters::{FilterChain, FilterOptions};
pub use report::{ReportFormat, Reporter};
pub use scan::{Opts, ScanReport, Scanner};

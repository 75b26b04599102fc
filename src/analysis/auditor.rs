//! One audit pass over a cluster snapshot
//!
//! The pass is split into units: one per namespace for namespaced kinds and
//! a single cluster unit for cluster-scoped kinds. Units run in parallel on
//! the rayon pool; each owns its [`Lookup`], so nothing is shared between
//! workers except read-only configuration. Results come back by value, in
//! unit order.

use super::enumerate::{enumerate, resolve_namespaces};
use super::predicates::classify;
use super::{ExceptionSet, Finding, Lookup, ResourceInfo, RunError, Verdict};
use crate::cluster::{ApiError, CancelFlag, ClusterApi, ResourceKind};
use crate::filters::{Decision, FilterChain, FilterOptions};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Everything a pass produced
#[derive(Debug, Default)]
pub struct AuditOutcome {
    pub findings: Vec<Finding>,
    /// Per-unit failures; none of them stopped the pass
    pub errors: Vec<RunError>,
    /// The pass was interrupted and may be incomplete
    pub cancelled: bool,
}

#[derive(Default)]
struct UnitOutcome {
    findings: Vec<Finding>,
    errors: Vec<RunError>,
    cancelled: bool,
}

/// A namespace, or `""` for the cluster scope
struct Unit {
    namespace: String,
    kinds: Vec<ResourceKind>,
}

pub struct Auditor<'a> {
    api: &'a dyn ClusterApi,
    options: &'a FilterOptions,
    filters: &'a FilterChain,
    exceptions: &'a ExceptionSet,
    cancel: CancelFlag,
    progress: Option<ProgressBar>,
}

impl<'a> Auditor<'a> {
    pub fn new(
        api: &'a dyn ClusterApi,
        options: &'a FilterOptions,
        filters: &'a FilterChain,
        exceptions: &'a ExceptionSet,
    ) -> Self {
        Self {
            api,
            options,
            filters,
            exceptions,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tick `progress` once per (unit, kind)
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run one pass over `kinds`.
    ///
    /// Fails only when the namespaces to scan cannot be determined.
    pub fn audit(&self, kinds: &[ResourceKind]) -> Result<AuditOutcome, RunError> {
        let units = self.plan(kinds)?;

        if let Some(pb) = &self.progress {
            let steps: usize = units.iter().map(|u| u.kinds.len()).sum();
            pb.set_length(steps as u64);
        }

        info!(
            units = units.len(),
            kinds = kinds.len(),
            "Auditing cluster"
        );

        let results: Vec<UnitOutcome> = units.par_iter().map(|unit| self.audit_unit(unit)).collect();

        let mut outcome = AuditOutcome::default();
        for unit in results {
            outcome.findings.extend(unit.findings);
            outcome.errors.extend(unit.errors);
            outcome.cancelled |= unit.cancelled;
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        info!(
            findings = outcome.findings.len(),
            errors = outcome.errors.len(),
            cancelled = outcome.cancelled,
            "Audit finished"
        );
        Ok(outcome)
    }

    fn plan(&self, kinds: &[ResourceKind]) -> Result<Vec<Unit>, RunError> {
        let (cluster_kinds, namespaced_kinds): (Vec<ResourceKind>, Vec<ResourceKind>) = kinds
            .iter()
            .copied()
            .filter(ResourceKind::is_auditable)
            .partition(ResourceKind::is_cluster_scoped);

        let mut units = Vec::new();
        if !namespaced_kinds.is_empty() {
            let namespaces = resolve_namespaces(self.api, self.options)
                .map_err(|e| RunError::Setup(format!("Failed to list namespaces: {}", e)))?;
            units.extend(namespaces.into_iter().map(|namespace| Unit {
                namespace,
                kinds: namespaced_kinds.clone(),
            }));
        }
        if !cluster_kinds.is_empty() {
            units.push(Unit {
                namespace: String::new(),
                kinds: cluster_kinds,
            });
        }
        Ok(units)
    }

    fn audit_unit(&self, unit: &Unit) -> UnitOutcome {
        let namespace = unit.namespace.as_str();
        let scope = (!namespace.is_empty()).then_some(namespace);
        let lookup = Lookup::new(self.api, scope).with_cancel(&self.cancel);
        let selector = self.options.include_labels.as_deref();

        let mut outcome = UnitOutcome::default();

        for &kind in &unit.kinds {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let candidates = match enumerate(self.api, kind, namespace, selector) {
                Ok(candidates) => candidates,
                Err(source) => {
                    warn!(kind = %kind, namespace, error = %source, "Listing failed, skipping");
                    outcome.errors.push(RunError::List {
                        kind,
                        namespace: namespace.to_string(),
                        source,
                    });
                    self.tick();
                    continue;
                }
            };

            for candidate in &candidates {
                let name = candidate.name();

                if let Decision::Skip(reason) = self.filters.evaluate(candidate.meta()) {
                    debug!(kind = %kind, namespace, name, reason = %reason, "Filtered out");
                    continue;
                }

                let reason = match classify(candidate, &lookup) {
                    Ok(Verdict::Used) => continue,
                    Ok(Verdict::Unused(reason)) => reason,
                    Err(ApiError::Cancelled) => {
                        outcome.cancelled = true;
                        break;
                    }
                    Err(source) => {
                        warn!(kind = %kind, namespace, name, error = %source, "Lookup failed, skipping");
                        outcome.errors.push(RunError::Lookup {
                            kind,
                            namespace: namespace.to_string(),
                            name: name.to_string(),
                            source,
                        });
                        continue;
                    }
                };

                if self.exceptions.is_exception(kind, name, candidate.namespace()) {
                    debug!(kind = %kind, namespace, name, "Matched exception");
                    continue;
                }

                outcome.findings.push(Finding::new(
                    kind,
                    namespace,
                    ResourceInfo::new(name, reason),
                ));
            }

            self.tick();
        }

        outcome
    }

    fn tick(&self) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }
}

//! Usage predicates
//!
//! One rule per auditable kind, looked up through a dispatch table built
//! once per process. A rule sees the candidate and a [`Lookup`] for the
//! candidate's unit, and answers [`Verdict::Used`] or
//! [`Verdict::Unused`] with a reason. Rules never mutate anything, so
//! candidates can be judged in any order.

mod network;
mod references;
mod storage;
mod workloads;

use super::{Lookup, Verdict, USED_LABEL};
use crate::cluster::{ApiError, Resource, ResourceKind};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Signature every rule implements
pub type UsagePredicate = fn(&Resource, &Lookup<'_>) -> Result<Verdict, ApiError>;

pub(crate) const MARKED_UNUSED: &str = "Marked with unused label";

static PREDICATES: LazyLock<HashMap<ResourceKind, UsagePredicate>> = LazyLock::new(|| {
    let table: [(ResourceKind, UsagePredicate); 14] = [
        (ResourceKind::Deployment, workloads::deployment),
        (ResourceKind::StatefulSet, workloads::stateful_set),
        (ResourceKind::DaemonSet, workloads::daemon_set),
        (ResourceKind::Job, workloads::job),
        (ResourceKind::Rollout, workloads::rollout),
        (ResourceKind::ConfigMap, references::config_map),
        (ResourceKind::Secret, references::secret),
        (ResourceKind::ServiceAccount, references::service_account),
        (ResourceKind::Service, network::service),
        (ResourceKind::NetworkPolicy, network::network_policy),
        (ResourceKind::PodDisruptionBudget, network::pod_disruption_budget),
        (ResourceKind::PersistentVolumeClaim, storage::persistent_volume_claim),
        (ResourceKind::PersistentVolume, storage::persistent_volume),
        (ResourceKind::StorageClass, storage::storage_class),
    ];
    table.into_iter().collect()
});

pub fn predicate_for(kind: ResourceKind) -> Option<UsagePredicate> {
    PREDICATES.get(&kind).copied()
}

/// Judge one candidate with its kind's rule.
///
/// Lookup-only kinds have no rule and are always used.
pub fn classify(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    match predicate_for(resource.kind()) {
        Some(predicate) => predicate(resource, lookup),
        None => Ok(Verdict::Used),
    }
}

/// Does the object carry `kor/used=false`?
pub(crate) fn marked_unused(resource: &Resource) -> bool {
    resource.label(USED_LABEL) == Some("false")
}

//! Rules for workload controllers

use super::{marked_unused, MARKED_UNUSED};
use crate::analysis::{Lookup, Verdict};
use crate::cluster::{ApiError, Resource, ResourceKind};

/// Zero replicas or the unused label, unless an Argo Rollout of the same
/// name manages the Deployment
pub(super) fn deployment(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::Deployment(deployment) = resource else {
        return Ok(Verdict::Used);
    };

    let replicas = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);

    let reason = if marked_unused(resource) {
        MARKED_UNUSED
    } else if replicas == 0 {
        "Deployment has no replicas"
    } else {
        return Ok(Verdict::Used);
    };

    if lookup.exists(ResourceKind::Rollout, resource.name())? {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused(reason))
}

pub(super) fn stateful_set(resource: &Resource, _lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::StatefulSet(set) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let replicas = set.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(1);
    if replicas == 0 {
        return Ok(Verdict::unused("StatefulSet has no replicas"));
    }

    Ok(Verdict::Used)
}

pub(super) fn daemon_set(resource: &Resource, _lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::DaemonSet(set) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let scheduled = set
        .status
        .as_ref()
        .map_or(0, |status| status.current_number_scheduled);
    if scheduled == 0 {
        return Ok(Verdict::unused("DaemonSet has no scheduled pods"));
    }

    Ok(Verdict::Used)
}

pub(super) fn job(resource: &Resource, _lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::Job(job) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let Some(status) = &job.status else {
        return Ok(Verdict::Used);
    };

    if status.completion_time.is_some() {
        return Ok(Verdict::unused("Job has completed"));
    }

    let failed = status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == "Failed" && c.status == "True");
    if let Some(condition) = failed {
        let why = condition.reason.as_deref().unwrap_or("unknown");
        return Ok(Verdict::unused(format!("Job has failed: {}", why)));
    }

    Ok(Verdict::Used)
}

/// A Rollout that points at a Deployment through `spec.workloadRef` is
/// unused once that Deployment is gone
pub(super) fn rollout(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::Rollout(rollout) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let workload_ref = rollout.data.get("spec").and_then(|spec| spec.get("workloadRef"));
    let Some(workload_ref) = workload_ref else {
        return Ok(Verdict::Used);
    };

    let kind = workload_ref.get("kind").and_then(|v| v.as_str());
    let name = workload_ref.get("name").and_then(|v| v.as_str());
    match (kind, name) {
        (Some("Deployment"), Some(name)) if !lookup.exists(ResourceKind::Deployment, name)? => Ok(
            Verdict::unused("Rollout references a non-existing Deployment"),
        ),
        _ => Ok(Verdict::Used),
    }
}

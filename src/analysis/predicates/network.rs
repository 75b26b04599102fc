//! Rules for objects that select pods or route traffic to them

use super::{marked_unused, MARKED_UNUSED};
use crate::analysis::lookup::pods_of;
use crate::analysis::selector::selects;
use crate::analysis::{Lookup, Verdict};
use crate::cluster::{labels_of, ApiError, Resource, ResourceKind};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

pub(super) fn service(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::Service(service) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let service_type = service.spec.as_ref().and_then(|s| s.type_.as_deref());
    if service_type == Some("ExternalName") {
        return Ok(Verdict::Used);
    }

    let has_addresses = match lookup.find(ResourceKind::Endpoints, resource.name())? {
        Some(Resource::Endpoints(endpoints)) => endpoints
            .subsets
            .iter()
            .flatten()
            .any(|subset| subset.addresses.as_ref().is_some_and(|a| !a.is_empty())),
        _ => false,
    };

    if has_addresses {
        Ok(Verdict::Used)
    } else {
        Ok(Verdict::unused("Service has no endpoints"))
    }
}

/// Does `selector` pick at least one pod of the unit?
fn selects_any_pod(selector: &LabelSelector, lookup: &Lookup<'_>) -> Result<bool, ApiError> {
    let pods = lookup.pods()?;
    let found = pods_of(&pods).any(|pod| selects(selector, labels_of(&pod.metadata)));
    Ok(found)
}

pub(super) fn network_policy(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::NetworkPolicy(policy) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    // A missing selector behaves like an empty one and selects every pod
    let selector: Option<LabelSelector> = policy
        .spec
        .as_ref()
        .and_then(|spec| spec.pod_selector.clone().into());
    let selector = selector.unwrap_or_default();

    if selects_any_pod(&selector, lookup)? {
        Ok(Verdict::Used)
    } else {
        Ok(Verdict::unused("NetworkPolicy selects no pods"))
    }
}

pub(super) fn pod_disruption_budget(
    resource: &Resource,
    lookup: &Lookup<'_>,
) -> Result<Verdict, ApiError> {
    let Resource::PodDisruptionBudget(budget) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let selector = budget.spec.as_ref().and_then(|spec| spec.selector.as_ref());
    match selector {
        Some(selector) if selects_any_pod(selector, lookup)? => Ok(Verdict::Used),
        _ => Ok(Verdict::unused("PodDisruptionBudget selects no pods")),
    }
}

use super::references::PodRefs;
use super::{marked_unused, MARKED_UNUSED};
use crate::analysis::lookup::pods_of;
use crate::analysis::{Lookup, Verdict};
use crate::cluster::{ApiError, Resource, ResourceKind};

pub(super) fn persistent_volume_claim(
    resource: &Resource,
    lookup: &Lookup<'_>,
) -> Result<Verdict, ApiError> {
    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let pods = lookup.pods()?;
    if PodRefs::collect(pods_of(&pods)).claims.contains(resource.name()) {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused("PVC is not in use"))
}

pub(super) fn persistent_volume(resource: &Resource, _lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::PersistentVolume(volume) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let phase = volume.status.as_ref().and_then(|s| s.phase.as_deref());
    if phase == Some("Bound") {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused("PV is not in use"))
}

/// Referenced by `storageClassName` of any PV or PVC in the cluster
pub(super) fn storage_class(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let name = Some(resource.name());

    let volumes = lookup.list(ResourceKind::PersistentVolume)?;
    let by_volume = volumes.iter().any(|r| match r {
        Resource::PersistentVolume(pv) => {
            pv.spec.as_ref().and_then(|s| s.storage_class_name.as_deref()) == name
        }
        _ => false,
    });
    if by_volume {
        return Ok(Verdict::Used);
    }

    let claims = lookup.list(ResourceKind::PersistentVolumeClaim)?;
    let by_claim = claims.iter().any(|r| match r {
        Resource::PersistentVolumeClaim(pvc) => {
            pvc.spec.as_ref().and_then(|s| s.storage_class_name.as_deref()) == name
        }
        _ => false,
    });
    if by_claim {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused("StorageClass is not used by any PV or PVC"))
}

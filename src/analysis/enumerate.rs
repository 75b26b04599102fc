use crate::cluster::{scope_of, ApiError, ClusterApi, Resource, ResourceKind};
use crate::filters::FilterOptions;
use tracing::debug;

/// Namespaces a run scans: the include list when given, otherwise every
/// namespace the API reports, minus the exclude list
pub fn resolve_namespaces(
    api: &dyn ClusterApi,
    options: &FilterOptions,
) -> Result<Vec<String>, ApiError> {
    let candidates = if options.include_namespaces.is_empty() {
        api.namespaces()?
    } else {
        options.include_namespaces.clone()
    };

    let mut namespaces: Vec<String> = Vec::with_capacity(candidates.len());
    for ns in candidates {
        if options.exclude_namespaces.contains(&ns) || namespaces.contains(&ns) {
            continue;
        }
        namespaces.push(ns);
    }

    debug!(count = namespaces.len(), "Resolved namespaces");
    Ok(namespaces)
}

/// Live snapshot of `kind` in `namespace` (`""` for cluster-scoped kinds),
/// with the include selector pushed down to the API.
///
/// A kind the cluster does not serve (Argo Rollouts without its CRD) has
/// no candidates.
pub fn enumerate(
    api: &dyn ClusterApi,
    kind: ResourceKind,
    namespace: &str,
    label_selector: Option<&str>,
) -> Result<Vec<Resource>, ApiError> {
    let items = match api.list(kind, scope_of(kind, namespace), label_selector) {
        Ok(items) => items,
        Err(ApiError::NotServed(_)) => {
            debug!(kind = %kind, namespace, "Kind not served by the cluster, nothing to audit");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };
    debug!(kind = %kind, namespace, count = items.len(), "Enumerated candidates");
    Ok(items)
}

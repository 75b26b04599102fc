//! Rules for objects that are only alive while something refers to them:
//! ConfigMaps, Secrets and ServiceAccounts.

use super::{marked_unused, MARKED_UNUSED};
use crate::analysis::lookup::pods_of;
use crate::analysis::{Lookup, Verdict};
use crate::cluster::{ApiError, Resource, ResourceKind};
use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::api::rbac::v1::Subject;
use std::collections::HashSet;

/// Secret types managed by the platform or by Helm
const MANAGED_SECRET_TYPES: [&str; 2] = ["kubernetes.io/service-account-token", "helm.sh/release.v1"];

/// Names referenced by a set of pods
#[derive(Debug, Default)]
pub(super) struct PodRefs {
    pub config_maps: HashSet<String>,
    pub secrets: HashSet<String>,
    pub claims: HashSet<String>,
    pub service_accounts: HashSet<String>,
}

/// Reference names are `String` or `Option<String>` depending on the API
/// version; both end up as an optional name here
fn ref_name<T: Clone + Into<Option<String>>>(name: &T) -> Option<String> {
    name.clone().into().filter(|n| !n.is_empty())
}

impl PodRefs {
    pub fn collect<'p>(pods: impl IntoIterator<Item = &'p Pod>) -> Self {
        let mut refs = Self::default();
        for pod in pods {
            refs.add_pod(pod);
        }
        refs
    }

    fn add_pod(&mut self, pod: &Pod) {
        let Some(spec) = &pod.spec else {
            return;
        };

        if let Some(sa) = &spec.service_account_name {
            self.service_accounts.insert(sa.clone());
        }

        for pull in spec.image_pull_secrets.iter().flatten() {
            self.secrets.extend(ref_name(&pull.name));
        }

        for volume in spec.volumes.iter().flatten() {
            if let Some(cm) = &volume.config_map {
                self.config_maps.extend(ref_name(&cm.name));
            }
            if let Some(secret) = &volume.secret {
                self.secrets.extend(secret.secret_name.clone());
            }
            if let Some(claim) = &volume.persistent_volume_claim {
                self.claims.insert(claim.claim_name.clone());
            }
            if let Some(projected) = &volume.projected {
                for source in projected.sources.iter().flatten() {
                    if let Some(cm) = &source.config_map {
                        self.config_maps.extend(ref_name(&cm.name));
                    }
                    if let Some(secret) = &source.secret {
                        self.secrets.extend(ref_name(&secret.name));
                    }
                }
            }
        }

        let init = spec.init_containers.iter().flatten();
        for container in spec.containers.iter().chain(init) {
            self.add_container(container);
        }
    }

    fn add_container(&mut self, container: &Container) {
        for env in container.env.iter().flatten() {
            let Some(source) = &env.value_from else {
                continue;
            };
            if let Some(key_ref) = &source.config_map_key_ref {
                self.config_maps.extend(ref_name(&key_ref.name));
            }
            if let Some(key_ref) = &source.secret_key_ref {
                self.secrets.extend(ref_name(&key_ref.name));
            }
        }

        for env_from in container.env_from.iter().flatten() {
            if let Some(cm) = &env_from.config_map_ref {
                self.config_maps.extend(ref_name(&cm.name));
            }
            if let Some(secret) = &env_from.secret_ref {
                self.secrets.extend(ref_name(&secret.name));
            }
        }
    }
}

pub(super) fn config_map(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let pods = lookup.pods()?;
    let refs = PodRefs::collect(pods_of(&pods));
    if refs.config_maps.contains(resource.name()) {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused("ConfigMap is not used in any pod or container"))
}

pub(super) fn secret(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    let Resource::Secret(secret) = resource else {
        return Ok(Verdict::Used);
    };

    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    if let Some(type_) = &secret.type_ {
        if MANAGED_SECRET_TYPES.contains(&type_.as_str()) {
            return Ok(Verdict::Used);
        }
    }

    let name = resource.name();
    let pods = lookup.pods()?;
    if PodRefs::collect(pods_of(&pods)).secrets.contains(name) {
        return Ok(Verdict::Used);
    }

    let accounts = lookup.list(ResourceKind::ServiceAccount)?;
    let referenced_by_account = accounts.iter().any(|r| match r {
        Resource::ServiceAccount(sa) => {
            let mounted = sa
                .secrets
                .iter()
                .flatten()
                .any(|s| s.name.as_deref() == Some(name));
            let pulled = sa
                .image_pull_secrets
                .iter()
                .flatten()
                .any(|s| ref_name(&s.name).as_deref() == Some(name));
            mounted || pulled
        }
        _ => false,
    });
    if referenced_by_account {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused(
        "Secret is not used in any pod, container or service account",
    ))
}

pub(super) fn service_account(resource: &Resource, lookup: &Lookup<'_>) -> Result<Verdict, ApiError> {
    if marked_unused(resource) {
        return Ok(Verdict::unused(MARKED_UNUSED));
    }

    let name = resource.name();
    let pods = lookup.pods()?;
    if PodRefs::collect(pods_of(&pods)).service_accounts.contains(name) {
        return Ok(Verdict::Used);
    }

    let namespace = resource.namespace();
    let bindings = lookup.list(ResourceKind::RoleBinding)?;
    let bound = bindings.iter().any(|r| match r {
        Resource::RoleBinding(binding) => {
            binds_account(binding.subjects.as_deref(), r.namespace(), name, namespace)
        }
        _ => false,
    });
    if bound {
        return Ok(Verdict::Used);
    }

    let cluster_bindings = lookup.list(ResourceKind::ClusterRoleBinding)?;
    let cluster_bound = cluster_bindings.iter().any(|r| match r {
        Resource::ClusterRoleBinding(binding) => {
            binds_account(binding.subjects.as_deref(), "", name, namespace)
        }
        _ => false,
    });
    if cluster_bound {
        return Ok(Verdict::Used);
    }

    Ok(Verdict::unused("ServiceAccount is not in use"))
}

/// Whether `subjects` name the account `name` in `namespace`. A subject
/// without a namespace lives in `default_namespace`.
fn binds_account(
    subjects: Option<&[Subject]>,
    default_namespace: &str,
    name: &str,
    namespace: &str,
) -> bool {
    subjects.into_iter().flatten().any(|subject| {
        subject.kind == "ServiceAccount"
            && subject.name == name
            && subject.namespace.as_deref().unwrap_or(default_namespace) == namespace
    })
}

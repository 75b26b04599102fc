//! Cluster access
//!
//! The audit engine never talks to Kubernetes directly. Everything goes
//! through [`ClusterApi`], which has two implementations:
//!
//! - [`KubeClusterApi`] - the real API server, via `kube`
//! - [`MemoryCluster`] - an in-memory snapshot with failure injection

mod kube_api;
pub mod memory;

pub use kube_api::{install_crypto_provider, KubeClusterApi, SetupError};
pub use memory::MemoryCluster;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, PersistentVolume, PersistentVolumeClaim, Pod, Secret, Service,
    ServiceAccount,
};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Kinds the transport understands.
///
/// Most are auditable. `Pod`, `Endpoints`, `RoleBinding` and
/// `ClusterRoleBinding` only exist so usage predicates can look them up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ConfigMap,
    DaemonSet,
    Deployment,
    Job,
    NetworkPolicy,
    PersistentVolume,
    PersistentVolumeClaim,
    PodDisruptionBudget,
    Rollout,
    Secret,
    Service,
    ServiceAccount,
    StatefulSet,
    StorageClass,
    Pod,
    Endpoints,
    RoleBinding,
    ClusterRoleBinding,
}

impl ResourceKind {
    /// Every kind the `all` command audits, in report order
    pub const AUDITABLE: [ResourceKind; 14] = [
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::Service,
        ResourceKind::ServiceAccount,
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Job,
        ResourceKind::Rollout,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::PersistentVolume,
        ResourceKind::StorageClass,
        ResourceKind::NetworkPolicy,
        ResourceKind::PodDisruptionBudget,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Job => "Job",
            ResourceKind::NetworkPolicy => "NetworkPolicy",
            ResourceKind::PersistentVolume => "Pv",
            ResourceKind::PersistentVolumeClaim => "Pvc",
            ResourceKind::PodDisruptionBudget => "Pdb",
            ResourceKind::Rollout => "ArgoRollout",
            ResourceKind::Secret => "Secret",
            ResourceKind::Service => "Service",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::StorageClass => "StorageClass",
            ResourceKind::Pod => "Pod",
            ResourceKind::Endpoints => "Endpoints",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
        }
    }

    /// Cluster-scoped kinds are listed once and grouped under the `""` namespace
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(
            self,
            ResourceKind::PersistentVolume
                | ResourceKind::StorageClass
                | ResourceKind::ClusterRoleBinding
        )
    }

    pub fn is_auditable(&self) -> bool {
        Self::AUDITABLE.contains(self)
    }

    /// Names accepted on the command line, first one canonical
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ConfigMap => &["configmap", "cm", "configmaps"],
            ResourceKind::DaemonSet => &["daemonset", "ds", "daemonsets"],
            ResourceKind::Deployment => &["deployment", "deploy", "deployments"],
            ResourceKind::Job => &["job", "jobs"],
            ResourceKind::NetworkPolicy => &["networkpolicy", "netpol", "networkpolicies"],
            ResourceKind::PersistentVolume => &["pv", "persistentvolume", "persistentvolumes"],
            ResourceKind::PersistentVolumeClaim => {
                &["pvc", "persistentvolumeclaim", "persistentvolumeclaims"]
            }
            ResourceKind::PodDisruptionBudget => &["pdb", "poddisruptionbudget", "pdbs"],
            ResourceKind::Rollout => &["argorollout", "argorollouts", "rollout", "rollouts"],
            ResourceKind::Secret => &["secret", "scrt", "secrets"],
            ResourceKind::Service => &["service", "svc", "services"],
            ResourceKind::ServiceAccount => &["serviceaccount", "sa", "serviceaccounts"],
            ResourceKind::StatefulSet => &["statefulset", "sts", "statefulsets"],
            ResourceKind::StorageClass => &["storageclass", "sc", "storageclasses"],
            ResourceKind::Pod => &["pod"],
            ResourceKind::Endpoints => &["endpoints"],
            ResourceKind::RoleBinding => &["rolebinding"],
            ResourceKind::ClusterRoleBinding => &["clusterrolebinding"],
        }
    }

    /// Auditable kind named by a CLI alias, case-insensitive
    pub fn from_alias(alias: &str) -> Option<ResourceKind> {
        let alias = alias.trim().to_ascii_lowercase();
        Self::AUDITABLE
            .into_iter()
            .find(|kind| kind.aliases().contains(&alias.as_str()))
    }

    /// Parse the positional kind argument: `all`, or a comma-separated list
    /// of aliases. Duplicates are dropped, order kept.
    pub fn parse_list(input: &str) -> Result<Vec<ResourceKind>, String> {
        if input.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::AUDITABLE.to_vec());
        }

        let mut kinds = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = Self::from_alias(part)
                .ok_or_else(|| format!("unknown resource kind '{}'", part))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        if kinds.is_empty() {
            return Err("no resource kind given".to_string());
        }
        Ok(kinds)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One live object, as returned by the transport.
#[derive(Debug, Clone)]
pub enum Resource {
    ConfigMap(ConfigMap),
    DaemonSet(DaemonSet),
    Deployment(Deployment),
    Job(Job),
    NetworkPolicy(NetworkPolicy),
    PersistentVolume(PersistentVolume),
    PersistentVolumeClaim(PersistentVolumeClaim),
    PodDisruptionBudget(PodDisruptionBudget),
    Rollout(DynamicObject),
    Secret(Secret),
    Service(Service),
    ServiceAccount(ServiceAccount),
    StatefulSet(StatefulSet),
    StorageClass(StorageClass),
    Pod(Pod),
    Endpoints(Endpoints),
    RoleBinding(RoleBinding),
    ClusterRoleBinding(ClusterRoleBinding),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::ConfigMap(_) => ResourceKind::ConfigMap,
            Resource::DaemonSet(_) => ResourceKind::DaemonSet,
            Resource::Deployment(_) => ResourceKind::Deployment,
            Resource::Job(_) => ResourceKind::Job,
            Resource::NetworkPolicy(_) => ResourceKind::NetworkPolicy,
            Resource::PersistentVolume(_) => ResourceKind::PersistentVolume,
            Resource::PersistentVolumeClaim(_) => ResourceKind::PersistentVolumeClaim,
            Resource::PodDisruptionBudget(_) => ResourceKind::PodDisruptionBudget,
            Resource::Rollout(_) => ResourceKind::Rollout,
            Resource::Secret(_) => ResourceKind::Secret,
            Resource::Service(_) => ResourceKind::Service,
            Resource::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Resource::StatefulSet(_) => ResourceKind::StatefulSet,
            Resource::StorageClass(_) => ResourceKind::StorageClass,
            Resource::Pod(_) => ResourceKind::Pod,
            Resource::Endpoints(_) => ResourceKind::Endpoints,
            Resource::RoleBinding(_) => ResourceKind::RoleBinding,
            Resource::ClusterRoleBinding(_) => ResourceKind::ClusterRoleBinding,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Resource::ConfigMap(o) => &o.metadata,
            Resource::DaemonSet(o) => &o.metadata,
            Resource::Deployment(o) => &o.metadata,
            Resource::Job(o) => &o.metadata,
            Resource::NetworkPolicy(o) => &o.metadata,
            Resource::PersistentVolume(o) => &o.metadata,
            Resource::PersistentVolumeClaim(o) => &o.metadata,
            Resource::PodDisruptionBudget(o) => &o.metadata,
            Resource::Rollout(o) => &o.metadata,
            Resource::Secret(o) => &o.metadata,
            Resource::Service(o) => &o.metadata,
            Resource::ServiceAccount(o) => &o.metadata,
            Resource::StatefulSet(o) => &o.metadata,
            Resource::StorageClass(o) => &o.metadata,
            Resource::Pod(o) => &o.metadata,
            Resource::Endpoints(o) => &o.metadata,
            Resource::RoleBinding(o) => &o.metadata,
            Resource::ClusterRoleBinding(o) => &o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Namespace of the object, `""` for cluster-scoped objects
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        label_value(self.meta(), key)
    }
}

pub fn label_value<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}

/// Labels of an object, empty when none are set
pub fn labels_of(meta: &ObjectMeta) -> &BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    meta.labels.as_ref().unwrap_or(&EMPTY)
}

/// Errors from a single transport call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request not issued, run was interrupted")]
    Cancelled,

    #[error("API request failed: {0}")]
    Request(String),

    /// The API server has no endpoint for the kind, e.g. a CRD that is not
    /// installed
    #[error("{0} is not served by this cluster")]
    NotServed(ResourceKind),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_not_served(&self) -> bool {
        matches!(self, ApiError::NotServed(_))
    }
}

/// Transport used by the engine to list, look up and delete objects.
///
/// `namespace = None` means "all namespaces" for namespaced kinds and is
/// required for cluster-scoped kinds.
pub trait ClusterApi: Send + Sync {
    /// Names of all namespaces in the cluster
    fn namespaces(&self) -> Result<Vec<String>, ApiError>;

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Resource>, ApiError>;

    /// Fetch one object; a missing object is `ApiError::NotFound`
    fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, ApiError>;

    fn delete(&self, kind: ResourceKind, namespace: Option<&str>, name: &str)
        -> Result<(), ApiError>;

    /// Label the object `kor/used=true` so later passes skip it
    fn flag_used(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError>;
}

/// Namespace argument for a transport call on `kind`
pub fn scope_of<'a>(kind: ResourceKind, namespace: &'a str) -> Option<&'a str> {
    if kind.is_cluster_scoped() || namespace.is_empty() {
        None
    } else {
        Some(namespace)
    }
}

/// Shared flag set on user interrupt.
///
/// Once set, no new list or delete calls are issued; calls already in
/// flight run to completion or hit their deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

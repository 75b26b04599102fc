//! In-memory cluster snapshot
//!
//! Implements [`ClusterApi`] over a fixed set of objects. Used by the test
//! suites, and handy for dry experiments: failures can be injected per
//! (kind, namespace) listing, per lookup and per delete, a kind can be made
//! unavailable, and every delete or flag call is recorded.

use super::{ApiError, ClusterApi, Resource, ResourceKind};
use crate::analysis::selector::SelectorExpr;
use crate::analysis::USED_LABEL;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A recorded delete or flag call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl Call {
    fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Default)]
struct State {
    namespaces: Vec<String>,
    objects: Vec<Resource>,
    failing_namespace_listing: bool,
    unserved: HashSet<ResourceKind>,
    failing_lists: HashSet<(ResourceKind, String)>,
    failing_gets: HashSet<(ResourceKind, String)>,
    failing_deletes: HashSet<(ResourceKind, String)>,
    deleted: Vec<Call>,
    flagged: Vec<Call>,
    list_calls: usize,
}

#[derive(Default)]
pub struct MemoryCluster {
    state: RwLock<State>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_namespace(&self, namespace: &str) {
        let mut state = self.write();
        if !state.namespaces.iter().any(|ns| ns == namespace) {
            state.namespaces.push(namespace.to_string());
        }
    }

    /// Add an object; its namespace is registered automatically
    pub fn insert(&self, resource: Resource) {
        let namespace = resource.namespace().to_string();
        if !namespace.is_empty() {
            self.add_namespace(&namespace);
        }
        self.write().objects.push(resource);
    }

    pub fn with(self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    /// Make listing the namespaces themselves fail
    pub fn fail_namespace_listing(&self) {
        self.write().failing_namespace_listing = true;
    }

    /// Behave like a cluster without `kind` installed: listings report the
    /// kind as not served and lookups find nothing
    pub fn unserve(&self, kind: ResourceKind) {
        self.write().unserved.insert(kind);
    }

    /// Make `list(kind, namespace)` fail; use `""` for cluster-wide listings
    pub fn fail_list(&self, kind: ResourceKind, namespace: &str) {
        self.write()
            .failing_lists
            .insert((kind, namespace.to_string()));
    }

    /// Make `get(kind, .., name)` fail with a non-404 error
    pub fn fail_get(&self, kind: ResourceKind, name: &str) {
        self.write().failing_gets.insert((kind, name.to_string()));
    }

    pub fn fail_delete(&self, kind: ResourceKind, name: &str) {
        self.write().failing_deletes.insert((kind, name.to_string()));
    }

    pub fn deleted(&self) -> Vec<Call> {
        self.read().deleted.clone()
    }

    pub fn flagged(&self) -> Vec<Call> {
        self.read().flagged.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.read().list_calls
    }

    pub fn contains(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        self.read()
            .objects
            .iter()
            .any(|r| r.kind() == kind && r.namespace() == namespace && r.name() == name)
    }
}

fn in_scope(resource: &Resource, kind: ResourceKind, namespace: Option<&str>) -> bool {
    resource.kind() == kind
        && match namespace {
            Some(ns) if !kind.is_cluster_scoped() => resource.namespace() == ns,
            _ => true,
        }
}

impl ClusterApi for MemoryCluster {
    fn namespaces(&self) -> Result<Vec<String>, ApiError> {
        let state = self.read();
        if state.failing_namespace_listing {
            return Err(ApiError::Request("namespaces is forbidden".to_string()));
        }
        Ok(state.namespaces.clone())
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Resource>, ApiError> {
        let selector = match label_selector {
            Some(s) => Some(
                s.parse::<SelectorExpr>()
                    .map_err(|e| ApiError::Request(e.to_string()))?,
            ),
            None => None,
        };

        let mut state = self.write();
        state.list_calls += 1;

        if state.unserved.contains(&kind) {
            return Err(ApiError::NotServed(kind));
        }

        let key = (kind, namespace.unwrap_or_default().to_string());
        if state.failing_lists.contains(&key) {
            return Err(ApiError::Request(format!(
                "{} is forbidden in namespace '{}'",
                kind, key.1
            )));
        }

        Ok(state
            .objects
            .iter()
            .filter(|r| in_scope(r, kind, namespace))
            .filter(|r| {
                selector
                    .as_ref()
                    .map_or(true, |s| s.matches(super::labels_of(r.meta())))
            })
            .cloned()
            .collect())
    }

    fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, ApiError> {
        let state = self.read();
        if state.failing_gets.contains(&(kind, name.to_string())) {
            return Err(ApiError::Request(format!("get {} '{}' failed", kind, name)));
        }
        if state.unserved.contains(&kind) {
            return Err(ApiError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        state
            .objects
            .iter()
            .find(|r| in_scope(r, kind, namespace) && r.name() == name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.write();
        if state.failing_deletes.contains(&(kind, name.to_string())) {
            return Err(ApiError::Request(format!(
                "delete {} '{}' is forbidden",
                kind, name
            )));
        }

        let before = state.objects.len();
        state
            .objects
            .retain(|r| !(in_scope(r, kind, namespace) && r.name() == name));
        if state.objects.len() == before {
            return Err(ApiError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        state.deleted.push(Call::new(kind, namespace, name));
        Ok(())
    }

    fn flag_used(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.write();
        let mut found = false;
        for resource in state.objects.iter_mut() {
            if in_scope(resource, kind, namespace) && resource.name() == name {
                set_used_label(resource);
                found = true;
            }
        }
        if !found {
            return Err(ApiError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        state.flagged.push(Call::new(kind, namespace, name));
        Ok(())
    }
}

fn set_used_label(resource: &mut Resource) {
    let meta = match resource {
        Resource::ConfigMap(o) => &mut o.metadata,
        Resource::DaemonSet(o) => &mut o.metadata,
        Resource::Deployment(o) => &mut o.metadata,
        Resource::Job(o) => &mut o.metadata,
        Resource::NetworkPolicy(o) => &mut o.metadata,
        Resource::PersistentVolume(o) => &mut o.metadata,
        Resource::PersistentVolumeClaim(o) => &mut o.metadata,
        Resource::PodDisruptionBudget(o) => &mut o.metadata,
        Resource::Rollout(o) => &mut o.metadata,
        Resource::Secret(o) => &mut o.metadata,
        Resource::Service(o) => &mut o.metadata,
        Resource::ServiceAccount(o) => &mut o.metadata,
        Resource::StatefulSet(o) => &mut o.metadata,
        Resource::StorageClass(o) => &mut o.metadata,
        Resource::Pod(o) => &mut o.metadata,
        Resource::Endpoints(o) => &mut o.metadata,
        Resource::RoleBinding(o) => &mut o.metadata,
        Resource::ClusterRoleBinding(o) => &mut o.metadata,
    };
    meta.labels
        .get_or_insert_with(Default::default)
        .insert(USED_LABEL.to_string(), "true".to_string());
}

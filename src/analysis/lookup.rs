//! Read-only view over the transport for one audit unit.
//!
//! A unit is one namespace (or the cluster scope for cluster-scoped kinds).
//! Listings of lookup kinds are memoised for the life of the unit, so the
//! pod list of a namespace is fetched at most once however many candidates
//! ask about it.

use crate::cluster::{ApiError, CancelFlag, ClusterApi, Resource, ResourceKind};
use k8s_openapi::api::core::v1::Pod;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Lookup<'a> {
    api: &'a dyn ClusterApi,
    namespace: Option<&'a str>,
    cancel: Option<&'a CancelFlag>,
    listings: RefCell<HashMap<ResourceKind, Rc<[Resource]>>>,
}

impl<'a> Lookup<'a> {
    /// `namespace = None` looks across all namespaces
    pub fn new(api: &'a dyn ClusterApi, namespace: Option<&'a str>) -> Self {
        Self {
            api,
            namespace,
            cancel: None,
            listings: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self) -> Result<(), ApiError> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(ApiError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Fetch one object by name; a missing object is `Ok(None)`
    pub fn find(&self, kind: ResourceKind, name: &str) -> Result<Option<Resource>, ApiError> {
        self.check_cancelled()?;
        let namespace = if kind.is_cluster_scoped() {
            None
        } else {
            self.namespace
        };

        match self.api.get(kind, namespace, name) {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, ApiError> {
        Ok(self.find(kind, name)?.is_some())
    }

    /// All objects of `kind` in the unit's scope, listed once per unit.
    /// A kind the cluster does not serve lists as empty.
    pub fn list(&self, kind: ResourceKind) -> Result<Rc<[Resource]>, ApiError> {
        if let Some(cached) = self.listings.borrow().get(&kind) {
            return Ok(Rc::clone(cached));
        }

        self.check_cancelled()?;
        let namespace = if kind.is_cluster_scoped() {
            None
        } else {
            self.namespace
        };
        let items: Rc<[Resource]> = match self.api.list(kind, namespace, None) {
            Ok(items) => items.into(),
            Err(e) if e.is_not_served() => Rc::from(Vec::new()),
            Err(e) => return Err(e),
        };
        self.listings.borrow_mut().insert(kind, Rc::clone(&items));
        Ok(items)
    }

    pub fn pods(&self) -> Result<Rc<[Resource]>, ApiError> {
        self.list(ResourceKind::Pod)
    }
}

/// The pods in a listing
pub fn pods_of(items: &[Resource]) -> impl Iterator<Item = &Pod> {
    items.iter().filter_map(|r| match r {
        Resource::Pod(pod) => Some(pod),
        _ => None,
    })
}

// Kubernetes-backed transport

use super::{ApiError, CancelFlag, ClusterApi, Resource, ResourceKind};
use crate::analysis::USED_LABEL;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch,
    PatchParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::sync::{LazyLock, Once};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Timeout for connecting to the API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall deadline for one call, including paging and retries inside kube
const CALL_TIMEOUT: Duration = Duration::from_secs(45);

static CRYPTO_PROVIDER: Once = Once::new();

static ROLLOUT_RESOURCE: LazyLock<ApiResource> = LazyLock::new(|| {
    ApiResource::from_gvk(&GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Rollout"))
});

/// Install the process-wide rustls crypto provider.
///
/// Safe to call any number of times; only the first call does work.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
    });
}

/// Failures while building a client. These abort the run.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Failed to infer Kubernetes config: {0}")]
    Infer(#[from] kube::config::InferConfigError),

    #[error("Failed to create Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Transport backed by a live API server.
///
/// Owns a tokio runtime so the engine can stay synchronous and fan out
/// over namespaces with rayon; each call blocks on its own future.
pub struct KubeClusterApi {
    runtime: Runtime,
    client: Client,
}

impl KubeClusterApi {
    /// Connect using an explicit kubeconfig, a context override, or the
    /// usual inference (in-cluster service account, `$KUBECONFIG`,
    /// `~/.kube/config`).
    pub fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
        cancel: CancelFlag,
    ) -> Result<Self, SetupError> {
        install_crypto_provider();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("kor-api")
            .build()?;

        let client = runtime.block_on(async {
            let mut config = match (kubeconfig, context) {
                (Some(path), _) => {
                    let kubeconfig = Kubeconfig::read_from(path)?;
                    Config::from_custom_kubeconfig(kubeconfig, &context_options(context)).await?
                }
                (None, Some(_)) => {
                    let kubeconfig = Kubeconfig::read()?;
                    Config::from_custom_kubeconfig(kubeconfig, &context_options(context)).await?
                }
                (None, None) => Config::infer().await?,
            };

            config.connect_timeout = Some(CONNECT_TIMEOUT);
            config.read_timeout = Some(READ_TIMEOUT);

            debug!(cluster_url = %config.cluster_url, "Creating Kubernetes client");
            Ok::<_, SetupError>(Client::try_from(config)?)
        })?;

        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        });

        Ok(Self { runtime, client })
    }

    /// Run one API future to completion under the call deadline
    fn call<T, F>(&self, future: F) -> Result<Result<T, kube::Error>, ApiError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        self.runtime.block_on(with_deadline(CALL_TIMEOUT, future))
    }

    fn namespaced_api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn rollout_api(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &*ROLLOUT_RESOURCE),
            None => Api::all_with(self.client.clone(), &*ROLLOUT_RESOURCE),
        }
    }

    /// A 404 on a collection means the API server has no such resource
    /// type, which is how a missing CRD shows up
    fn list_with<K>(
        &self,
        api: Api<K>,
        kind: ResourceKind,
        params: &ListParams,
        wrap: fn(K) -> Resource,
    ) -> Result<Vec<Resource>, ApiError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        let list = self.call(api.list(params))?.map_err(|e| {
            if is_not_found(&e) {
                ApiError::NotServed(kind)
            } else {
                request_error(e)
            }
        })?;
        Ok(list.items.into_iter().map(wrap).collect())
    }

    fn get_with<K>(
        &self,
        api: Api<K>,
        kind: ResourceKind,
        name: &str,
        wrap: fn(K) -> Resource,
    ) -> Result<Resource, ApiError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        self.call(api.get(name))?
            .map(wrap)
            .map_err(|e| classify_error(e, kind, name))
    }

    fn delete_with<K>(&self, api: Api<K>, kind: ResourceKind, name: &str) -> Result<(), ApiError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        self.call(api.delete(name, &DeleteParams::default()))?
            .map(|_| ())
            .map_err(|e| classify_error(e, kind, name))
    }

    fn flag_with<K>(&self, api: Api<K>, kind: ResourceKind, name: &str) -> Result<(), ApiError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        let patch = serde_json::json!({
            "metadata": { "labels": { USED_LABEL: "true" } }
        });
        self.call(api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)))?
            .map(|_| ())
            .map_err(|e| classify_error(e, kind, name))
    }
}

/// Bind `$api` to the typed API for `$kind` and `$wrap` to the matching
/// `Resource` constructor, then evaluate `$body`.
macro_rules! with_api {
    ($self:ident, $kind:expr, $namespace:expr, |$api:ident, $wrap:ident| $body:expr) => {
        match $kind {
            ResourceKind::ConfigMap => {
                let $api: Api<ConfigMap> = $self.namespaced_api($namespace);
                let $wrap: fn(ConfigMap) -> Resource = Resource::ConfigMap;
                $body
            }
            ResourceKind::DaemonSet => {
                let $api: Api<DaemonSet> = $self.namespaced_api($namespace);
                let $wrap: fn(DaemonSet) -> Resource = Resource::DaemonSet;
                $body
            }
            ResourceKind::Deployment => {
                let $api: Api<Deployment> = $self.namespaced_api($namespace);
                let $wrap: fn(Deployment) -> Resource = Resource::Deployment;
                $body
            }
            ResourceKind::Job => {
                let $api: Api<Job> = $self.namespaced_api($namespace);
                let $wrap: fn(Job) -> Resource = Resource::Job;
                $body
            }
            ResourceKind::NetworkPolicy => {
                let $api: Api<NetworkPolicy> = $self.namespaced_api($namespace);
                let $wrap: fn(NetworkPolicy) -> Resource = Resource::NetworkPolicy;
                $body
            }
            ResourceKind::PersistentVolume => {
                let $api: Api<PersistentVolume> = Api::all($self.client.clone());
                let $wrap: fn(PersistentVolume) -> Resource = Resource::PersistentVolume;
                $body
            }
            ResourceKind::PersistentVolumeClaim => {
                let $api: Api<PersistentVolumeClaim> = $self.namespaced_api($namespace);
                let $wrap: fn(PersistentVolumeClaim) -> Resource = Resource::PersistentVolumeClaim;
                $body
            }
            ResourceKind::PodDisruptionBudget => {
                let $api: Api<PodDisruptionBudget> = $self.namespaced_api($namespace);
                let $wrap: fn(PodDisruptionBudget) -> Resource = Resource::PodDisruptionBudget;
                $body
            }
            ResourceKind::Rollout => {
                let $api: Api<DynamicObject> = $self.rollout_api($namespace);
                let $wrap: fn(DynamicObject) -> Resource = Resource::Rollout;
                $body
            }
            ResourceKind::Secret => {
                let $api: Api<Secret> = $self.namespaced_api($namespace);
                let $wrap: fn(Secret) -> Resource = Resource::Secret;
                $body
            }
            ResourceKind::Service => {
                let $api: Api<Service> = $self.namespaced_api($namespace);
                let $wrap: fn(Service) -> Resource = Resource::Service;
                $body
            }
            ResourceKind::ServiceAccount => {
                let $api: Api<ServiceAccount> = $self.namespaced_api($namespace);
                let $wrap: fn(ServiceAccount) -> Resource = Resource::ServiceAccount;
                $body
            }
            ResourceKind::StatefulSet => {
                let $api: Api<StatefulSet> = $self.namespaced_api($namespace);
                let $wrap: fn(StatefulSet) -> Resource = Resource::StatefulSet;
                $body
            }
            ResourceKind::StorageClass => {
                let $api: Api<StorageClass> = Api::all($self.client.clone());
                let $wrap: fn(StorageClass) -> Resource = Resource::StorageClass;
                $body
            }
            ResourceKind::Pod => {
                let $api: Api<Pod> = $self.namespaced_api($namespace);
                let $wrap: fn(Pod) -> Resource = Resource::Pod;
                $body
            }
            ResourceKind::Endpoints => {
                let $api: Api<Endpoints> = $self.namespaced_api($namespace);
                let $wrap: fn(Endpoints) -> Resource = Resource::Endpoints;
                $body
            }
            ResourceKind::RoleBinding => {
                let $api: Api<RoleBinding> = $self.namespaced_api($namespace);
                let $wrap: fn(RoleBinding) -> Resource = Resource::RoleBinding;
                $body
            }
            ResourceKind::ClusterRoleBinding => {
                let $api: Api<ClusterRoleBinding> = Api::all($self.client.clone());
                let $wrap: fn(ClusterRoleBinding) -> Resource = Resource::ClusterRoleBinding;
                $body
            }
        }
    };
}

impl ClusterApi for KubeClusterApi {
    fn namespaces(&self) -> Result<Vec<String>, ApiError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .call(api.list(&ListParams::default()))?
            .map_err(request_error)?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Resource>, ApiError> {
        let params = list_params(label_selector);
        debug!(
            kind = %kind,
            namespace = namespace.unwrap_or("*"),
            label_selector = ?label_selector,
            "Listing objects"
        );
        with_api!(self, kind, namespace, |api, wrap| self.list_with(api, kind, &params, wrap))
    }

    fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, ApiError> {
        with_api!(self, kind, namespace, |api, wrap| self.get_with(api, kind, name, wrap))
    }

    fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        with_api!(self, kind, namespace, |api, _wrap| self.delete_with(api, kind, name))
    }

    fn flag_used(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        with_api!(self, kind, namespace, |api, _wrap| self.flag_with(api, kind, name))
    }
}

/// Await `future`, giving up after `deadline`
async fn with_deadline<F: Future>(deadline: Duration, future: F) -> Result<F::Output, ApiError> {
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| ApiError::Timeout(deadline))
}

fn context_options(context: Option<&str>) -> KubeConfigOptions {
    KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    }
}

fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector {
        Some(selector) if !selector.trim().is_empty() => ListParams::default().labels(selector),
        _ => ListParams::default(),
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(status) if status.code == 404)
}

fn classify_error(err: kube::Error, kind: ResourceKind, name: &str) -> ApiError {
    if is_not_found(&err) {
        ApiError::NotFound {
            kind,
            name: name.to_string(),
        }
    } else {
        request_error(err)
    }
}

fn request_error(err: kube::Error) -> ApiError {
    ApiError::Request(err.to_string())
}

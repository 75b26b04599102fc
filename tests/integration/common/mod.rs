//! Shared builders for the integration suites

#![allow(dead_code)]

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Endpoints, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeSpec, PersistentVolumeStatus, Pod, PodSpec,
    Service, Volume,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kor::analysis::exceptions::ExceptionResource;
use kor::cluster::{MemoryCluster, Resource, ResourceKind};
use kor::config::Config;
use kor::filters::FilterOptions;
use kor::scan::{Opts, ScanReport, Scanner};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};

pub fn meta(namespace: &str, name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        labels: (!labels.is_empty()).then(|| {
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
        ..Default::default()
    }
}

pub fn deployment(namespace: &str, name: &str, replicas: i32, labels: &[(&str, &str)]) -> Resource {
    Resource::Deployment(Deployment {
        metadata: meta(namespace, name, labels),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn rollout(namespace: &str, name: &str) -> Resource {
    let resource =
        ApiResource::from_gvk(&GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Rollout"));
    Resource::Rollout(DynamicObject::new(name, &resource).within(namespace))
}

pub fn config_map(namespace: &str, name: &str) -> Resource {
    Resource::ConfigMap(ConfigMap {
        metadata: meta(namespace, name, &[]),
        ..Default::default()
    })
}

/// Pod mounting the given ConfigMaps as volumes
pub fn pod_mounting(namespace: &str, name: &str, config_maps: &[&str]) -> Resource {
    let volumes = config_maps
        .iter()
        .map(|cm| Volume {
            name: format!("vol-{}", cm),
            config_map: Some(ConfigMapVolumeSource {
                name: cm.to_string().into(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    Resource::Pod(Pod {
        metadata: meta(namespace, name, &[]),
        spec: Some(PodSpec {
            volumes: Some(volumes),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn service(namespace: &str, name: &str) -> Resource {
    Resource::Service(Service {
        metadata: meta(namespace, name, &[]),
        ..Default::default()
    })
}

pub fn empty_endpoints(namespace: &str, name: &str) -> Resource {
    Resource::Endpoints(Endpoints {
        metadata: meta(namespace, name, &[]),
        ..Default::default()
    })
}

pub fn storage_class(name: &str) -> Resource {
    Resource::StorageClass(StorageClass {
        metadata: meta("", name, &[]),
        provisioner: "kubernetes.io/no-provisioner".to_string(),
        ..Default::default()
    })
}

pub fn persistent_volume(name: &str, phase: &str, class: &str) -> Resource {
    Resource::PersistentVolume(PersistentVolume {
        metadata: meta("", name, &[]),
        spec: Some(PersistentVolumeSpec {
            storage_class_name: Some(class.to_string()),
            ..Default::default()
        }),
        status: Some(PersistentVolumeStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn claim(namespace: &str, name: &str, class: &str) -> Resource {
    Resource::PersistentVolumeClaim(PersistentVolumeClaim {
        metadata: meta(namespace, name, &[]),
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(class.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// d1 idle, d2 running, d3 idle but marked used, d4 running but marked unused
pub fn scenario_cluster() -> MemoryCluster {
    MemoryCluster::new()
        .with(deployment("ns", "d1", 0, &[("app", "d1")]))
        .with(deployment("ns", "d2", 1, &[("app", "d2")]))
        .with(deployment("ns", "d3", 0, &[("kor/used", "true")]))
        .with(deployment("ns", "d4", 1, &[("kor/used", "false")]))
}

pub fn exception(namespace: &str, name: &str) -> ExceptionResource {
    ExceptionResource::exact(namespace, name)
}

/// Audit `kinds` without deletion
pub fn scan(cluster: &MemoryCluster, kinds: &[ResourceKind], config: &Config) -> ScanReport {
    scan_with(cluster, kinds, config, FilterOptions::default(), Opts::default())
}

pub fn scan_with(
    cluster: &MemoryCluster,
    kinds: &[ResourceKind],
    config: &Config,
    filters: FilterOptions,
    opts: Opts,
) -> ScanReport {
    Scanner::new(cluster, filters, config, opts)
        .expect("valid options")
        .scan(kinds)
        .expect("scan succeeds")
}

pub fn to_json(report: &ScanReport) -> serde_json::Value {
    serde_json::to_value(&report.results).expect("results serialize")
}

//! Usage rules exercised through full passes, with cross-kind lookups

mod common;

use common::*;
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{
    EnvFromSource, Pod, PodSpec, Secret, SecretEnvSource, ServiceAccount, Container,
};
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, Time};
use kor::analysis::predicates::{classify, predicate_for};
use kor::analysis::{Lookup, Verdict};
use kor::cluster::{MemoryCluster, Resource, ResourceKind};
use kor::config::Config;
use serde_json::json;

fn secret(namespace: &str, name: &str, type_: Option<&str>) -> Resource {
    Resource::Secret(Secret {
        metadata: meta(namespace, name, &[]),
        type_: type_.map(String::from),
        ..Default::default()
    })
}

fn pod_with_env_from_secret(namespace: &str, name: &str, secret: &str) -> Resource {
    Resource::Pod(Pod {
        metadata: meta(namespace, name, &[("app", "web")]),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                env_from: Some(vec![EnvFromSource {
                    secret_ref: Some(SecretEnvSource {
                        name: secret.to_string().into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn service_account(namespace: &str, name: &str) -> Resource {
    Resource::ServiceAccount(ServiceAccount {
        metadata: meta(namespace, name, &[]),
        ..Default::default()
    })
}

fn role_binding(namespace: &str, name: &str, account: &str) -> Resource {
    Resource::RoleBinding(RoleBinding {
        metadata: meta(namespace, name, &[]),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: "reader".to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: account.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    })
}

fn cluster_role_binding(name: &str, namespace: &str, account: &str) -> Resource {
    Resource::ClusterRoleBinding(ClusterRoleBinding {
        metadata: meta("", name, &[]),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: "view".to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: account.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    })
}

fn budget(namespace: &str, name: &str, app: &str) -> Resource {
    Resource::PodDisruptionBudget(PodDisruptionBudget {
        metadata: meta(namespace, name, &[]),
        spec: Some(PodDisruptionBudgetSpec {
            selector: Some(LabelSelector {
                match_labels: Some([("app".to_string(), app.to_string())].into()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn completed_job(namespace: &str, name: &str) -> Resource {
    let finished: Time = serde_json::from_value(json!("2024-03-01T10:00:00Z")).unwrap();
    Resource::Job(Job {
        metadata: meta(namespace, name, &[]),
        status: Some(JobStatus {
            completion_time: Some(finished),
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[test]
fn test_lookup_only_kinds_have_no_rule() {
    for kind in [
        ResourceKind::Pod,
        ResourceKind::Endpoints,
        ResourceKind::RoleBinding,
        ResourceKind::ClusterRoleBinding,
    ] {
        assert!(predicate_for(kind).is_none(), "unexpected rule for {}", kind);
    }
}

#[test]
fn test_kind_without_rule_is_used() {
    let cluster = MemoryCluster::new();
    let lookup = Lookup::new(&cluster, Some("ns"));
    let pod = pod_mounting("ns", "web", &[]);
    assert_eq!(classify(&pod, &lookup).unwrap(), Verdict::Used);
}

#[test]
fn test_secrets() {
    let cluster = MemoryCluster::new()
        .with(secret("ns", "env-creds", None))
        .with(secret("ns", "token", Some("kubernetes.io/service-account-token")))
        .with(secret("ns", "leftover", Some("Opaque")))
        .with(pod_with_env_from_secret("ns", "web", "env-creds"));

    let report = scan(&cluster, &[ResourceKind::Secret], &Config::default());
    assert_eq!(to_json(&report), json!({"ns": {"Secret": ["leftover"]}}));
}

#[test]
fn test_service_accounts_bound_by_role_binding() {
    let cluster = MemoryCluster::new()
        .with(service_account("ns", "bound"))
        .with(service_account("ns", "idle"))
        .with(role_binding("ns", "read", "bound"));

    let report = scan(&cluster, &[ResourceKind::ServiceAccount], &Config::default());
    assert_eq!(to_json(&report), json!({"ns": {"ServiceAccount": ["idle"]}}));
}

#[test]
fn test_service_accounts_bound_by_cluster_role_binding() {
    let cluster = MemoryCluster::new()
        .with(service_account("ns", "monitor"))
        .with(service_account("ns", "idle"))
        .with(cluster_role_binding("monitor-view", "ns", "monitor"));

    let report = scan(&cluster, &[ResourceKind::ServiceAccount], &Config::default());
    assert_eq!(to_json(&report), json!({"ns": {"ServiceAccount": ["idle"]}}));
}

#[test]
fn test_volumes_and_claims() {
    let cluster = MemoryCluster::new()
        .with(persistent_volume("bound", "Bound", "fast"))
        .with(persistent_volume("released", "Released", "fast"))
        .with(claim("ns", "data", "fast"));

    let report = scan(
        &cluster,
        &[ResourceKind::PersistentVolumeClaim, ResourceKind::PersistentVolume],
        &Config::default(),
    );
    assert_eq!(
        to_json(&report),
        json!({
            "ns": {"Pvc": ["data"]},
            "": {"Pv": ["released"]}
        })
    );
}

#[test]
fn test_budgets_and_jobs_with_reasons() {
    let cluster = MemoryCluster::new()
        .with(pod_with_env_from_secret("ns", "web", "creds"))
        .with(budget("ns", "web-pdb", "web"))
        .with(budget("ns", "api-pdb", "api"))
        .with(completed_job("ns", "migrate"));

    let report = scan(
        &cluster,
        &[ResourceKind::PodDisruptionBudget, ResourceKind::Job],
        &Config::default(),
    );

    let budgets = report.results.entries("ns", "Pdb");
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].name, "api-pdb");
    assert_eq!(budgets[0].reason, "PodDisruptionBudget selects no pods");

    let jobs = report.results.entries("ns", "Job");
    assert_eq!(jobs[0].reason, "Job has completed");
}

#[test]
fn test_mounted_config_map_is_used() {
    let cluster = MemoryCluster::new()
        .with(config_map("ns", "settings"))
        .with(config_map("ns", "stale"))
        .with(pod_mounting("ns", "web", &["settings"]));

    let report = scan(&cluster, &[ResourceKind::ConfigMap], &Config::default());
    assert_eq!(report.results.names("ns", "ConfigMap"), vec!["stale"]);
    assert_eq!(
        report.results.entries("ns", "ConfigMap")[0].reason,
        "ConfigMap is not used in any pod or container"
    );
}

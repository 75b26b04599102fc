//! End-to-end audit passes over an in-memory cluster

mod common;

use common::*;
use kor::analysis::{GroupBy, RunError};
use kor::cluster::{CancelFlag, MemoryCluster, ResourceKind};
use kor::config::Config;
use kor::filters::FilterOptions;
use kor::scan::{Opts, Scanner};
use serde_json::json;
use std::collections::HashSet;

fn name_set(names: Vec<&str>) -> HashSet<String> {
    names.into_iter().map(String::from).collect()
}

#[test]
fn test_deployment_scenario() {
    let cluster = scenario_cluster();
    let report = scan(&cluster, &[ResourceKind::Deployment], &Config::default());

    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d1", "d4"]}}));
    assert!(report.errors.is_empty());
}

#[test]
fn test_rollout_suppresses_idle_deployment() {
    let cluster = scenario_cluster();
    cluster.insert(rollout("ns", "d1"));

    let report = scan(&cluster, &[ResourceKind::Deployment], &Config::default());
    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d4"]}}));
}

#[test]
fn test_rollout_in_other_namespace_does_not_suppress() {
    let cluster = scenario_cluster();
    cluster.insert(rollout("other", "d1"));

    let report = scan(&cluster, &[ResourceKind::Deployment], &Config::default());
    assert_eq!(
        name_set(report.results.names("ns", "Deployment")),
        name_set(vec!["d1", "d4"])
    );
}

#[test]
fn test_two_passes_agree() {
    let cluster = scenario_cluster();
    cluster.insert(config_map("ns", "orphan"));
    cluster.insert(config_map("ns", "mounted"));
    cluster.insert(pod_mounting("ns", "web", &["mounted"]));

    let kinds = [ResourceKind::Deployment, ResourceKind::ConfigMap];
    let first = scan(&cluster, &kinds, &Config::default());
    let second = scan(&cluster, &kinds, &Config::default());

    assert_eq!(first.results, second.results);
    assert_eq!(first.results.names("ns", "ConfigMap"), vec!["orphan"]);
}

#[test]
fn test_listing_failure_isolated_to_one_namespace() {
    let cluster = MemoryCluster::new()
        .with(deployment("a", "idle-a", 0, &[]))
        .with(deployment("b", "idle-b", 0, &[]))
        .with(deployment("c", "idle-c", 0, &[]));
    cluster.fail_list(ResourceKind::Deployment, "b");

    let report = scan(&cluster, &[ResourceKind::Deployment], &Config::default());

    assert_eq!(report.results.names("a", "Deployment"), vec!["idle-a"]);
    assert!(report.results.names("b", "Deployment").is_empty());
    assert_eq!(report.results.names("c", "Deployment"), vec!["idle-c"]);

    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        RunError::List { kind, namespace, .. } => {
            assert_eq!(*kind, ResourceKind::Deployment);
            assert_eq!(namespace, "b");
        }
        other => panic!("expected a listing error, got {:?}", other),
    }
}

#[test]
fn test_all_kinds_without_rollouts_installed() {
    let cluster = scenario_cluster();
    cluster.add_namespace("a");
    cluster.add_namespace("b");
    cluster.unserve(ResourceKind::Rollout);

    let kinds = ResourceKind::parse_list("all").unwrap();
    assert!(kinds.contains(&ResourceKind::Rollout));

    let report = scan(&cluster, &kinds, &Config::default());
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.results.names("ns", "Deployment"), vec!["d1", "d4"]);
    assert!(report.results.names("ns", "ArgoRollout").is_empty());
}

#[test]
fn test_lookup_failure_skips_only_that_candidate() {
    let cluster = MemoryCluster::new()
        .with(service("ns", "broken"))
        .with(service("ns", "lonely"))
        .with(empty_endpoints("ns", "lonely"));
    cluster.fail_get(ResourceKind::Endpoints, "broken");

    let report = scan(&cluster, &[ResourceKind::Service], &Config::default());

    assert_eq!(report.results.names("ns", "Service"), vec!["lonely"]);
    assert!(matches!(report.errors[0], RunError::Lookup { .. }));
}

#[test]
fn test_cluster_scoped_kinds_group_under_empty_namespace() {
    let cluster = MemoryCluster::new()
        .with(storage_class("fast"))
        .with(storage_class("slow"))
        .with(persistent_volume("pv-1", "Bound", "fast"));

    let report = scan(&cluster, &[ResourceKind::StorageClass], &Config::default());
    assert_eq!(to_json(&report), json!({"": {"StorageClass": ["slow"]}}));
}

#[test]
fn test_group_by_resource() {
    let cluster = scenario_cluster();
    cluster.insert(config_map("other", "orphan"));

    let opts = Opts {
        group_by: GroupBy::Resource,
        ..Default::default()
    };
    let report = scan_with(
        &cluster,
        &[ResourceKind::Deployment, ResourceKind::ConfigMap],
        &Config::default(),
        FilterOptions::default(),
        opts,
    );

    assert_eq!(
        to_json(&report),
        json!({
            "Deployment": {"ns": ["d1", "d4"]},
            "ConfigMap": {"other": ["orphan"]}
        })
    );
}

#[test]
fn test_namespace_filters() {
    let cluster = MemoryCluster::new()
        .with(deployment("a", "idle-a", 0, &[]))
        .with(deployment("b", "idle-b", 0, &[]));

    let excluded = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions {
            exclude_namespaces: vec!["a".to_string()],
            ..Default::default()
        },
        Opts::default(),
    );
    assert_eq!(to_json(&excluded), json!({"b": {"Deployment": ["idle-b"]}}));

    let included = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions {
            include_namespaces: vec!["a".to_string()],
            ..Default::default()
        },
        Opts::default(),
    );
    assert_eq!(to_json(&included), json!({"a": {"Deployment": ["idle-a"]}}));
}

#[test]
fn test_include_label_selector_is_pushed_down() {
    let cluster = scenario_cluster();
    let report = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions {
            include_labels: Some("app=d1".to_string()),
            ..Default::default()
        },
        Opts::default(),
    );
    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d1"]}}));
}

#[test]
fn test_excluded_label_never_reaches_predicate() {
    let cluster = scenario_cluster();
    let report = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions {
            exclude_labels: vec!["app=d1".to_string()],
            ..Default::default()
        },
        Opts::default(),
    );
    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d4"]}}));
}

#[test]
fn test_cancelled_run_reports_nothing() {
    let cluster = scenario_cluster();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = Scanner::new(
        &cluster,
        FilterOptions::default(),
        &Config::default(),
        Opts::default(),
    )
    .unwrap()
    .with_cancel(cancel)
    .scan(&[ResourceKind::Deployment])
    .unwrap();

    assert!(report.cancelled);
    assert!(report.results.is_empty());
}

#[test]
fn test_conflicting_namespace_flags_fail_setup() {
    let cluster = MemoryCluster::new();
    let result = Scanner::new(
        &cluster,
        FilterOptions {
            include_namespaces: vec!["a".to_string()],
            exclude_namespaces: vec!["b".to_string()],
            ..Default::default()
        },
        &Config::default(),
        Opts::default(),
    );
    assert!(result.is_err());
}

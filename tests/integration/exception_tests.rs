//! Exception allow-list behaviour, from config files through full passes

mod common;

use common::*;
use kor::analysis::exceptions::ExceptionResource;
use kor::analysis::RunError;
use kor::cluster::{MemoryCluster, ResourceKind};
use kor::config::Config;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_exact_exception_removes_only_that_candidate() {
    let cluster = scenario_cluster();
    let config = Config {
        exception_deployments: vec![exception("ns", "d1")],
        ..Default::default()
    };

    let report = scan(&cluster, &[ResourceKind::Deployment], &config);
    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d4"]}}));
}

#[test]
fn test_exception_is_namespace_scoped() {
    let cluster = MemoryCluster::new()
        .with(config_map("a", "shared"))
        .with(config_map("b", "shared"));
    let config = Config {
        exception_config_maps: vec![exception("a", "shared")],
        ..Default::default()
    };

    let report = scan(&cluster, &[ResourceKind::ConfigMap], &config);
    assert_eq!(to_json(&report), json!({"b": {"ConfigMap": ["shared"]}}));
}

#[test]
fn test_regex_exceptions() {
    let cluster = MemoryCluster::new()
        .with(config_map("team-a", "cache-1"))
        .with(config_map("team-b", "cache-2"))
        .with(config_map("team-b", "keep-me"));
    let config = Config {
        exception_config_maps: vec![ExceptionResource::regex("^team-", "^cache-")],
        ..Default::default()
    };

    let report = scan(&cluster, &[ResourceKind::ConfigMap], &config);
    assert_eq!(to_json(&report), json!({"team-b": {"ConfigMap": ["keep-me"]}}));
}

#[test]
fn test_exception_for_other_kind_has_no_effect() {
    let cluster = scenario_cluster();
    let config = Config {
        exception_config_maps: vec![exception("ns", "d1")],
        ..Default::default()
    };

    let report = scan(&cluster, &[ResourceKind::Deployment], &config);
    assert_eq!(report.results.names("ns", "Deployment"), vec!["d1", "d4"]);
}

#[test]
fn test_invalid_pattern_keeps_other_entries() {
    let cluster = scenario_cluster();
    let config = Config {
        exception_deployments: vec![
            ExceptionResource::regex("ns", "(unclosed"),
            exception("ns", "d4"),
        ],
        ..Default::default()
    };

    let report = scan(&cluster, &[ResourceKind::Deployment], &config);
    assert_eq!(report.results.names("ns", "Deployment"), vec!["d1"]);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], RunError::Config(_)));
}

#[test]
fn test_builtin_exceptions() {
    let cluster = MemoryCluster::new()
        .with(config_map("ns", "kube-root-ca.crt"))
        .with(config_map("kube-system", "coredns"))
        .with(config_map("ns", "orphan"));

    let with_builtins = scan(&cluster, &[ResourceKind::ConfigMap], &Config::builtin());
    assert_eq!(
        to_json(&with_builtins),
        json!({"ns": {"ConfigMap": ["orphan"]}})
    );

    let without = scan(&cluster, &[ResourceKind::ConfigMap], &Config::default());
    assert_eq!(without.results.len(), 3);
}

#[test]
fn test_config_file_round_trip_through_a_pass() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kor.json");
    fs::write(
        &path,
        r#"{
            "exceptionDeployments": [
                {"namespace": "ns", "resourceName": "d1"}
            ],
            "somethingElse": true
        }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    let report = scan(&scenario_cluster(), &[ResourceKind::Deployment], &config);
    assert_eq!(to_json(&report), json!({"ns": {"Deployment": ["d4"]}}));
}

#[test]
fn test_yaml_config_with_regex() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".kor.yaml");
    fs::write(
        &path,
        "exceptionDeployments:\n  - namespace: ns\n    resourceName: \"d[0-9]\"\n    matchRegex: true\n",
    )
    .unwrap();

    let config = Config::from_default_locations(dir.path()).unwrap();
    let report = scan(&scenario_cluster(), &[ResourceKind::Deployment], &config);
    assert!(report.results.is_empty());
}

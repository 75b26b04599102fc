//! Rendering of full passes in every output format

mod common;

use common::*;
use kor::cluster::ResourceKind;
use kor::config::Config;
use kor::report::{ReportFormat, Reporter};

fn scenario_report(format: ReportFormat, show_reason: bool) -> String {
    let report = scan(
        &scenario_cluster(),
        &[ResourceKind::Deployment],
        &Config::default(),
    );
    Reporter::new(format)
        .with_show_reason(show_reason)
        .render(&report.results)
        .unwrap()
}

#[test]
fn test_json_report() {
    let output = scenario_report(ReportFormat::Json, false);
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value, serde_json::json!({"ns": {"Deployment": ["d1", "d4"]}}));
}

#[test]
fn test_json_ignores_show_reason() {
    let output = scenario_report(ReportFormat::Json, true);
    assert!(!output.contains("replicas"));
}

#[test]
fn test_yaml_report() {
    let output = scenario_report(ReportFormat::Yaml, false);
    let value: serde_json::Value = serde_yaml::from_str(&output).unwrap();
    assert_eq!(value, serde_json::json!({"ns": {"Deployment": ["d1", "d4"]}}));
}

#[test]
fn test_table_report() {
    let output = scenario_report(ReportFormat::Table, true);
    assert!(output.contains("ns"));
    assert!(output.contains("d1"));
    assert!(output.contains("d4"));
    assert!(!output.contains("d2"));
    assert!(output.contains("Deployment has no replicas"));
    assert!(output.contains("Marked with unused label"));
}

#[test]
fn test_empty_structured_report() {
    let report = scan(
        &kor::cluster::MemoryCluster::new(),
        &ResourceKind::AUDITABLE,
        &Config::default(),
    );
    let output = Reporter::new(ReportFormat::Json)
        .render(&report.results)
        .unwrap();
    assert_eq!(output.trim(), "{}");
}

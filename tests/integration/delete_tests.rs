//! Deletion after a pass, interactive and not

mod common;

use common::*;
use kor::analysis::RunError;
use kor::cluster::{MemoryCluster, ResourceKind};
use kor::config::Config;
use kor::delete::{Answer, DeletionOutcome, ScriptedPrompter};
use kor::filters::FilterOptions;
use kor::scan::{Opts, Scanner};
use serde_json::json;

fn delete_opts(interactive: bool) -> Opts {
    Opts {
        delete: true,
        no_interactive: !interactive,
        ..Default::default()
    }
}

#[test]
fn test_non_interactive_deletes_every_finding() {
    let cluster = scenario_cluster();
    let report = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions::default(),
        delete_opts(false),
    );

    assert_eq!(
        to_json(&report),
        json!({"ns": {"Deployment": ["d1-DELETED", "d4-DELETED"]}})
    );
    assert!(!cluster.contains(ResourceKind::Deployment, "ns", "d1"));
    assert!(cluster.contains(ResourceKind::Deployment, "ns", "d2"));
    assert!(cluster.contains(ResourceKind::Deployment, "ns", "d3"));
}

#[test]
fn test_both_views_after_interactive_deletion() {
    let cluster = scenario_cluster();
    // d1: delete; d4: decline, do not flag
    let prompter = ScriptedPrompter::new([true, false, false]);

    let report = Scanner::new(
        &cluster,
        FilterOptions::default(),
        &Config::default(),
        delete_opts(true),
    )
    .unwrap()
    .with_prompter(prompter)
    .scan(&[ResourceKind::Deployment])
    .unwrap();

    let summary = report.deletion.as_ref().unwrap();
    let flagged: Vec<_> = summary.flagged().map(|r| r.finding.name()).collect();
    assert_eq!(flagged, vec!["d1", "d4"]);

    let remaining: Vec<_> = summary.still_unused().map(|r| r.finding.name()).collect();
    assert_eq!(remaining, vec!["d4"]);

    assert_eq!(
        to_json(&report),
        json!({"ns": {"Deployment": ["d1-DELETED", "d4-SKIPPED"]}})
    );
    assert_eq!(report.still_unused().names("ns", "Deployment"), vec!["d4"]);
}

#[test]
fn test_declined_resource_flagged_as_used_is_skipped_next_pass() {
    let cluster = scenario_cluster();
    // d1: decline, then flag; d4: decline, then flag
    let prompter = ScriptedPrompter::new([false, true, false, true]);

    let report = Scanner::new(
        &cluster,
        FilterOptions::default(),
        &Config::default(),
        delete_opts(true),
    )
    .unwrap()
    .with_prompter(prompter)
    .scan(&[ResourceKind::Deployment])
    .unwrap();

    let outcomes: Vec<_> = report
        .deletion
        .as_ref()
        .unwrap()
        .records
        .iter()
        .map(|r| r.outcome.clone())
        .collect();
    assert_eq!(outcomes, vec![DeletionOutcome::FlaggedUsed; 2]);
    assert_eq!(cluster.flagged().len(), 2);

    let next = scan(&cluster, &[ResourceKind::Deployment], &Config::default());
    assert!(next.results.is_empty());
}

#[test]
fn test_failed_delete_continues_and_is_reported() {
    let cluster = scenario_cluster();
    cluster.fail_delete(ResourceKind::Deployment, "d1");

    let report = scan_with(
        &cluster,
        &[ResourceKind::Deployment],
        &Config::default(),
        FilterOptions::default(),
        delete_opts(false),
    );

    assert_eq!(
        to_json(&report),
        json!({"ns": {"Deployment": ["d1-FAILED", "d4-DELETED"]}})
    );
    assert!(matches!(
        &report.errors[..],
        [RunError::Delete { name, .. }] if name == "d1"
    ));
}

#[test]
fn test_cluster_scoped_delete_has_no_namespace() {
    let cluster = MemoryCluster::new().with(storage_class("slow"));

    scan_with(
        &cluster,
        &[ResourceKind::StorageClass],
        &Config::default(),
        FilterOptions::default(),
        delete_opts(false),
    );

    let deleted = cluster.deleted();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].namespace, "");
    assert_eq!(deleted[0].name, "slow");
}

#[test]
fn test_interrupt_at_first_prompt_deletes_nothing() {
    let cluster = scenario_cluster();
    let prompter = ScriptedPrompter::new([Answer::Interrupted, Answer::Yes]);

    let report = Scanner::new(
        &cluster,
        FilterOptions::default(),
        &Config::default(),
        delete_opts(true),
    )
    .unwrap()
    .with_prompter(prompter)
    .scan(&[ResourceKind::Deployment])
    .unwrap();

    assert!(report.cancelled);
    assert!(cluster.deleted().is_empty());
    assert!(cluster.flagged().is_empty());
    assert_eq!(
        to_json(&report),
        json!({"ns": {"Deployment": ["d1-SKIPPED", "d4-SKIPPED"]}})
    );
    assert_eq!(report.still_unused().names("ns", "Deployment"), vec!["d1", "d4"]);
}

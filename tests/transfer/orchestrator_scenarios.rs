use std::collections::HashSet;
use std::sync::atomic::Ordering;

use slicecast::models::Dimensions;
use slicecast::{Config, Orchestrator, Verdict};

mod common;
use common::ScriptedSession;

fn config() -> Config {
    let mut config = Config::default();
    config.synthesis.seed = Some(2024);
    config.transfer.pause_ms = 0;
    config
}

#[tokio::test]
async fn test_unreachable_archive_attempts_nothing() {
    let session = ScriptedSession::new(false, vec![]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let summary = orchestrator.run(5, Dimensions::new(64, 64)).await;

    assert_eq!(session.store_calls(), 0);
    assert_eq!(summary.attempted, 0);
    assert!(summary.unreachable);
    assert!(summary.study_uid.is_none());
    assert_eq!(orchestrator.verdict(&summary), Verdict::Unreachable);
}

#[tokio::test]
async fn test_optional_verification_continues() {
    let mut config = config();
    config.transfer.require_verification = false;
    let session = ScriptedSession::new(false, vec![]);
    let orchestrator = Orchestrator::new(&config, session.clone());

    let summary = orchestrator.run(2, Dimensions::new(16, 16)).await;

    assert_eq!(session.store_calls(), 2);
    assert_eq!(summary.succeeded, 2);
    assert!(!summary.unreachable);
}

#[tokio::test]
async fn test_every_store_failing_is_total_failure() {
    let session = ScriptedSession::new(true, vec![false; 4]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let summary = orchestrator.run(4, Dimensions::new(16, 16)).await;

    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.failures.len(), 4);
    assert_eq!(orchestrator.verdict(&summary), Verdict::TotalFailure);
    assert_eq!(session.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_survives_for_a_second_run() {
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let first = orchestrator.run(2, Dimensions::new(16, 16)).await;
    let second = orchestrator.run(3, Dimensions::new(16, 16)).await;

    assert_eq!(orchestrator.verdict(&first), Verdict::FullSuccess);
    assert!(!second.unreachable);
    assert_eq!(second.succeeded, 3);
    assert_ne!(first.study_uid, second.study_uid);
    assert_eq!(session.store_calls(), 5);
    assert_eq!(session.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unencodable_slices_are_never_sent() {
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    // wider than a 16-bit Columns value can describe
    let summary = orchestrator.run(2, Dimensions::new(70_000, 1)).await;

    assert_eq!(session.store_calls(), 0);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 2);
    assert!(summary.failures.iter().all(|f| f
        .reason
        .as_deref()
        .is_some_and(|r| r.contains("malformed geometry"))));
    assert_eq!(orchestrator.verdict(&summary), Verdict::TotalFailure);
}

#[tokio::test]
async fn test_two_of_five_failing_is_partial_below_threshold() {
    let session = ScriptedSession::new(true, vec![true, false, true, false, true]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let summary = orchestrator.run(5, Dimensions::new(64, 64)).await;

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(
        orchestrator.verdict(&summary),
        Verdict::PartialSuccess {
            below_threshold: true
        }
    );
    let failed: Vec<u32> = summary.failures.iter().map(|f| f.ordinal).collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(summary.failures.iter().all(|f| f.instance_uid.is_some()));
}

#[tokio::test]
async fn test_single_slice_run() {
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let summary = orchestrator.run(1, Dimensions::new(64, 64)).await;

    assert_eq!(session.store_calls(), 1);
    assert_eq!(summary.attempted, 1);
    assert_eq!(orchestrator.verdict(&summary), Verdict::FullSuccess);
}

#[tokio::test]
async fn test_identifiers_are_unique_within_a_run() {
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config(), session.clone());

    let summary = orchestrator.run(6, Dimensions::new(16, 16)).await;

    let stored = session.stored.lock().unwrap();
    let instances: HashSet<&str> = stored.iter().map(|s| s.sop_instance_uid.as_str()).collect();
    assert_eq!(instances.len(), 6);
    let study = summary.study_uid.as_ref().expect("study uid");
    let series = summary.series_uid.as_ref().expect("series uid");
    assert_ne!(study, series);
    assert!(!instances.contains(study.as_str()));
    assert!(!instances.contains(series.as_str()));

    let ordinals: Vec<u32> = stored.iter().map(|s| s.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_pauses_between_batches() {
    let mut config = config();
    config.transfer.batch_size = 2;
    config.transfer.pause_ms = 1_000;
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config, session.clone());

    let started = tokio::time::Instant::now();
    let summary = orchestrator.run(5, Dimensions::new(8, 8)).await;

    // pauses after slices 2 and 4, none after the last one
    assert_eq!(summary.succeeded, 5);
    assert_eq!(started.elapsed().as_millis() / 1_000, 2);
}

#[tokio::test]
async fn test_cancellation_stops_between_items() {
    let mut config = config();
    config.transfer.batch_size = 1;
    config.transfer.pause_ms = 60_000;
    let session = ScriptedSession::new(true, vec![]);
    let orchestrator = Orchestrator::new(&config, session.clone());
    let token = orchestrator.cancellation_token();

    let watched = session.clone();
    let canceller = tokio::spawn(async move {
        // the run is parked in its pause once the first slice is stored
        while watched.store_calls() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        token.cancel();
    });
    let summary = orchestrator.run(10, Dimensions::new(8, 8)).await;
    canceller.await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.attempted, 1);
    assert_eq!(
        orchestrator.verdict(&summary),
        Verdict::PartialSuccess {
            below_threshold: true
        }
    );
}

mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use chaintrace::checkpoints::CheckpointReason;
use chaintrace::control::{ControlError, ControlPlane};
use chaintrace::engine::TraceStatus;
use chaintrace::events::{ChannelSink, TraceEvent};
use chaintrace::sessions::{SessionManager, SessionStatus, TraceRequest};
use chaintrace::types::{Address, BlockRange};

fn request(origins: &[&str], destinations: &[&str], max_depth: u32) -> TraceRequest {
    TraceRequest {
        origins: addresses(origins),
        destinations: addresses(destinations),
        max_depth,
        range: BlockRange::OPEN,
    }
}

/// X -> m1 -> m2 -> m3 -> Y, four hops.
fn four_hop_source() -> ScriptedTxSource {
    ScriptedTxSource::new()
        .with_tx(spend("t1", 100, &["X"], &["m1"]))
        .with_tx(spend("t2", 101, &["m1"], &["m2"]))
        .with_tx(spend("t3", 102, &["m2"], &["m3"]))
        .with_tx(spend("t4", 103, &["m3"], &["Y"]))
}

fn manager_with(source: ScriptedTxSource, dir: &std::path::Path) -> Arc<SessionManager> {
    Arc::new(
        SessionManager::new(test_config(dir), Arc::new(source), memory_cache())
            .expect("manager should construct"),
    )
}

#[tokio::test]
async fn session_runs_to_completion_with_results_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_with(four_hop_source(), dir.path());

    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    let status = wait_for_terminal(&manager, &session_id).await;
    assert_eq!(status, SessionStatus::Completed);

    let results = manager.results(&session_id).unwrap();
    assert_eq!(results.status, TraceStatus::Connected);
    assert_eq!(results.connections_found.len(), 1);
    assert_eq!(
        results.connections_found[0].path,
        addresses(&["X", "m1", "m2", "m3", "Y"])
    );

    let exports = results.exports.expect("export paths recorded");
    assert!(exports.csv.exists());
    assert!(exports.json.exists());
    let csv = std::fs::read_to_string(&exports.csv).unwrap();
    assert!(csv.starts_with("source,target,path,path_length,discovered_at"));
    assert!(csv.contains("X|m1|m2|m3|Y"));

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&exports.json).unwrap()).unwrap();
    assert_eq!(doc["connections_found"].as_array().unwrap().len(), 1);
    assert_eq!(doc["summary"]["status"], "connected");
}

#[tokio::test]
async fn exhausted_search_completes_with_no_connection() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_with(ScriptedTxSource::new(), dir.path());

    let session_id = manager.start(request(&["X"], &["Y"], 3)).await.unwrap();
    assert_eq!(
        wait_for_terminal(&manager, &session_id).await,
        SessionStatus::Completed
    );
    let results = manager.results(&session_id).unwrap();
    assert_eq!(results.status, TraceStatus::NoConnection);
    assert!(results.connections_found.is_empty());
}

#[tokio::test]
async fn control_plane_validates_requests() {
    let dir = tempfile::tempdir().unwrap();
    let control = ControlPlane::new(manager_with(ScriptedTxSource::new(), dir.path()));

    let err = control.start(request(&[], &["Y"], 3)).await.unwrap_err();
    assert!(matches!(err, ControlError::BadRequest { .. }));

    let err = control
        .start(request(&["X"], &["Y"], 99))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::BadRequest { .. }));

    let err = control.status("unknown-session").unwrap_err();
    assert!(matches!(err, ControlError::NotFound { .. }));
}

#[tokio::test]
async fn results_of_a_running_session_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let control = ControlPlane::new(manager_with(source, dir.path()));

    let started = control.start(request(&["X"], &["Y"], 5)).await.unwrap();
    let err = control.results(&started.session_id).unwrap_err();
    assert!(matches!(err, ControlError::InvalidState { .. }));

    wait_for_terminal(control.manager(), &started.session_id).await;
    assert!(control.results(&started.session_id).is_ok());
}

#[tokio::test]
async fn cancel_writes_a_final_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());

    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.cancel(&session_id).await.unwrap();

    assert_eq!(
        wait_for_terminal(&manager, &session_id).await,
        SessionStatus::Cancelled
    );
    let view = manager.status(&session_id).unwrap();
    let checkpoint_id = view.record.checkpoint_id.expect("cancel checkpoint recorded");
    let record = manager.store().read(&session_id, &checkpoint_id).unwrap();
    assert_eq!(record.reason, CheckpointReason::Cancel);
    assert!(!record.trace_state.visited_forward.is_empty());

    // Cancelling again is an idempotent ack; results are unavailable.
    manager.cancel(&session_id).await.unwrap();
    assert!(manager.results(&session_id).is_err());
}

#[tokio::test]
async fn resume_after_cancel_reaches_the_same_connection() {
    // Reference: uninterrupted run.
    let reference_dir = tempfile::tempdir().unwrap();
    let reference = manager_with(four_hop_source(), reference_dir.path());
    let reference_id = reference.start(request(&["X"], &["Y"], 5)).await.unwrap();
    wait_for_terminal(&reference, &reference_id).await;
    let reference_results = reference.results(&reference_id).unwrap();

    // Interrupted run, slow enough to cancel mid-trace.
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());
    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.cancel(&session_id).await.unwrap();
    assert_eq!(
        wait_for_terminal(&manager, &session_id).await,
        SessionStatus::Cancelled
    );
    let checkpoint_id = manager
        .status(&session_id)
        .unwrap()
        .record
        .checkpoint_id
        .unwrap();

    // Resume into a fresh session; the original stays historical.
    let resumed_id = manager.resume(&session_id, &checkpoint_id).await.unwrap();
    assert_ne!(resumed_id, session_id);
    assert_eq!(
        wait_for_terminal(&manager, &resumed_id).await,
        SessionStatus::Completed
    );
    assert_eq!(
        manager.status(&session_id).unwrap().record.status,
        SessionStatus::Cancelled
    );

    let resumed_results = manager.results(&resumed_id).unwrap();
    assert_eq!(resumed_results.status, TraceStatus::Connected);
    assert_eq!(
        resumed_results.connections_found[0].path,
        reference_results.connections_found[0].path
    );
    let view = manager.status(&resumed_id).unwrap();
    assert_eq!(view.record.resumed_from, Some(session_id));
}

#[tokio::test]
async fn resume_survives_a_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());
    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.cancel(&session_id).await.unwrap();
    wait_for_terminal(&manager, &session_id).await;
    drop(manager);

    // A new manager over the same directories sees only the files.
    let restarted = manager_with(four_hop_source(), dir.path());
    let resumed_id = restarted.resume_auto().await.unwrap();
    assert_eq!(
        wait_for_terminal(&restarted, &resumed_id).await,
        SessionStatus::Completed
    );
    let results = restarted.results(&resumed_id).unwrap();
    assert_eq!(
        results.connections_found[0].path,
        addresses(&["X", "m1", "m2", "m3", "Y"])
    );
}

#[tokio::test]
async fn resuming_twice_from_one_checkpoint_does_not_duplicate_exports() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());
    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.cancel(&session_id).await.unwrap();
    wait_for_terminal(&manager, &session_id).await;
    let checkpoint_id = manager
        .status(&session_id)
        .unwrap()
        .record
        .checkpoint_id
        .unwrap();

    let first = manager.resume(&session_id, &checkpoint_id).await.unwrap();
    wait_for_terminal(&manager, &first).await;
    let second = manager.resume(&session_id, &checkpoint_id).await.unwrap();
    wait_for_terminal(&manager, &second).await;

    // Both resumed sessions share the original session's export files,
    // and the connection appears exactly once.
    let exports = manager
        .status(&second)
        .unwrap()
        .record
        .exports
        .expect("export paths recorded");
    assert!(exports
        .json
        .to_string_lossy()
        .contains(&format!("connections_{session_id}")));
    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&exports.json).unwrap()).unwrap();
    assert_eq!(doc["connections_found"].as_array().unwrap().len(), 1);

    let csv = std::fs::read_to_string(&exports.csv).unwrap();
    assert_eq!(csv.matches("X|m1|m2|m3|Y").count(), 1);
}

#[tokio::test]
async fn force_checkpoint_snapshots_without_interrupting() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());

    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let (checkpoint_id, _progress) = manager.force_checkpoint(&session_id).await.unwrap();
    let record = manager.store().read(&session_id, &checkpoint_id).unwrap();
    assert_eq!(record.reason, CheckpointReason::Manual);

    // The session keeps running to completion regardless.
    assert_eq!(
        wait_for_terminal(&manager, &session_id).await,
        SessionStatus::Completed
    );

    // Finished sessions refuse manual checkpoints.
    let err = manager.force_checkpoint(&session_id).await.unwrap_err();
    let control_err: ControlError = err.into();
    assert!(matches!(control_err, ControlError::InvalidState { .. }));
}

#[tokio::test]
async fn periodic_checkpoints_accumulate_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.checkpoint_interval = Duration::from_millis(100);

    // Long blind chain so the trace stays busy for a while.
    let mut source = ScriptedTxSource::new().with_delay(Duration::from_millis(60));
    for i in 0..8 {
        source = source.with_tx(spend(
            &format!("t{i}"),
            100 + i,
            &[format!("n{i}").as_str()],
            &[format!("n{}", i + 1).as_str()],
        ));
    }
    let manager = Arc::new(
        SessionManager::new(config, Arc::new(source), memory_cache()).unwrap(),
    );

    let session_id = manager.start(request(&["n0"], &["absent"], 8)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    let periodic = manager
        .store()
        .list(&session_id)
        .unwrap()
        .into_iter()
        .filter(|r| r.reason == CheckpointReason::Periodic)
        .count();
    assert!(periodic >= 1, "expected at least one periodic checkpoint");

    wait_for_terminal(&manager, &session_id).await;
}

#[tokio::test]
async fn delete_cancels_running_sessions_first() {
    let dir = tempfile::tempdir().unwrap();
    let source = four_hop_source().with_delay(Duration::from_millis(100));
    let manager = manager_with(source, dir.path());

    let session_id = manager.start(request(&["X"], &["Y"], 5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    manager.delete(&session_id).await.unwrap();

    assert!(manager.status(&session_id).is_err());
    // The cancel checkpoint still made it to disk.
    let checkpoints = manager.store().list(&session_id).unwrap();
    assert!(
        checkpoints
            .iter()
            .any(|r| r.reason == CheckpointReason::Cancel)
    );
}

#[tokio::test]
async fn panicking_collaborator_fails_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.checkpoint_interval = Duration::from_millis(50);
    let source = ScriptedTxSource::new().with_panic("X");
    let (sink, rx) = ChannelSink::unbounded();
    let manager = Arc::new(
        SessionManager::with_events(config, Arc::new(source), memory_cache(), Arc::new(sink))
            .unwrap(),
    );

    let session_id = manager.start(request(&["X"], &["Y"], 3)).await.unwrap();
    assert_eq!(
        wait_for_terminal(&manager, &session_id).await,
        SessionStatus::Failed
    );

    // The session failed cleanly: error recorded, accumulated trace
    // state preserved in a best-effort cancel checkpoint, lifecycle
    // event emitted, and the session still shows up in listings.
    let view = manager.status(&session_id).unwrap();
    assert!(view.record.error.as_deref().unwrap().contains("scripted panic"));
    assert!(view.progress.addresses_examined >= 1);

    let checkpoints = manager.store().list(&session_id).unwrap();
    assert!(
        checkpoints
            .iter()
            .any(|r| r.reason == CheckpointReason::Cancel)
    );
    assert!(
        checkpoints[0]
            .trace_state
            .visited_forward
            .contains_key(&Address::from("X"))
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events: Vec<TraceEvent> = rx.drain().collect();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, TraceEvent::SessionEnded { status, .. } if status == "failed"))
    );

    assert!(manager.list().iter().any(|v| v.record.session_id == session_id));
    let err = manager.cancel(&session_id).await.unwrap_err();
    let control_err: ControlError = err.into();
    assert!(matches!(control_err, ControlError::InvalidState { .. }));

    // The periodic checkpointer died with its session: no further
    // checkpoints accumulate after the failure.
    let count_before = manager.store().list(&session_id).unwrap().len();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let count_after = manager.store().list(&session_id).unwrap().len();
    assert_eq!(count_before, count_after);
}

#[tokio::test]
async fn events_narrate_the_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, rx) = ChannelSink::unbounded();
    let manager = Arc::new(
        SessionManager::with_events(
            test_config(dir.path()),
            Arc::new(ScriptedTxSource::new().with_tx(spend("t1", 100, &["X"], &["Y"]))),
            memory_cache(),
            Arc::new(sink),
        )
        .unwrap(),
    );

    let session_id = manager.start(request(&["X"], &["Y"], 2)).await.unwrap();
    wait_for_terminal(&manager, &session_id).await;
    // The terminal status lands just before the final event is emitted.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let events: Vec<TraceEvent> = rx.drain().collect();
    assert!(matches!(events.first(), Some(TraceEvent::SessionStarted { .. })));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, TraceEvent::ConnectionFound { connection, .. }
                if connection.target == Address::from("Y")))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, TraceEvent::SessionEnded { status, .. } if status == "completed"))
    );
}

#[tokio::test]
async fn list_shows_every_session_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_with(ScriptedTxSource::new(), dir.path());

    let first = manager.start(request(&["A1"], &["B1"], 2)).await.unwrap();
    wait_for_terminal(&manager, &first).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = manager.start(request(&["A2"], &["B2"], 2)).await.unwrap();
    wait_for_terminal(&manager, &second).await;

    let listed = manager.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].record.session_id, second);
    assert_eq!(listed[1].record.session_id, first);
}

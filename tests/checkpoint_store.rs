mod common;
use common::*;

use chrono::Utc;

use chaintrace::checkpoints::{
    CheckpointReason, CheckpointRecord, CheckpointStore, CheckpointStoreError, ProgressSummary,
};
use chaintrace::engine::TraceState;
use chaintrace::sessions::TraceRequest;
use chaintrace::types::{Address, BlockRange, Direction};

fn record_for(session_id: &str, reason: CheckpointReason) -> CheckpointRecord {
    let mut trace_state = TraceState::default();
    trace_state.seed(Direction::Forward, &addresses(&["X"]));
    trace_state.seed(Direction::Backward, &addresses(&["Y"]));
    CheckpointRecord {
        session_id: session_id.to_string(),
        export_root: session_id.to_string(),
        checkpoint_id: String::new(),
        created_at: Utc::now(),
        reason,
        request: TraceRequest {
            origins: addresses(&["X"]),
            destinations: addresses(&["Y"]),
            max_depth: 5,
            range: BlockRange::OPEN,
        },
        effective_range: BlockRange::new(Some(100), Some(900)),
        progress: ProgressSummary::default(),
        trace_state,
    }
}

#[test]
fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    let checkpoint_id = store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();
    let loaded = store.read("sess-1", &checkpoint_id).unwrap();

    assert_eq!(loaded.session_id, "sess-1");
    assert_eq!(loaded.checkpoint_id, checkpoint_id);
    assert_eq!(loaded.reason, CheckpointReason::Periodic);
    assert_eq!(
        loaded.trace_state.visited_forward[&Address::from("X")],
        vec![Address::from("X")]
    );
    assert_eq!(loaded.effective_range, BlockRange::new(Some(100), Some(900)));
}

#[test]
fn every_write_gets_a_fresh_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    let first = store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();
    let second = store
        .write(record_for("sess-1", CheckpointReason::Manual))
        .unwrap();

    assert_ne!(first, second);
    assert!(store.read("sess-1", &first).is_ok());
    assert!(store.read("sess-1", &second).is_ok());
}

#[test]
fn listing_is_newest_first_and_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    let mut older = record_for("sess-1", CheckpointReason::Periodic);
    older.created_at = Utc::now() - chrono::Duration::minutes(10);
    store.write(older).unwrap();
    let newest = store
        .write(record_for("sess-1", CheckpointReason::Manual))
        .unwrap();
    store
        .write(record_for("other", CheckpointReason::Periodic))
        .unwrap();

    let listed = store.list("sess-1").unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].checkpoint_id, newest);
    assert!(listed.iter().all(|r| r.session_id == "sess-1"));
}

#[test]
fn latest_overall_spans_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    let mut older = record_for("sess-1", CheckpointReason::Periodic);
    older.created_at = Utc::now() - chrono::Duration::minutes(5);
    store.write(older).unwrap();
    let newest = store
        .write(record_for("sess-2", CheckpointReason::Cancel))
        .unwrap();

    let latest = store.latest_overall().unwrap().unwrap();
    assert_eq!(latest.session_id, "sess-2");
    assert_eq!(latest.checkpoint_id, newest);
}

#[test]
fn missing_checkpoints_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    match store.read("nope", "missing") {
        Err(CheckpointStoreError::NotFound { session_id, .. }) => {
            assert_eq!(session_id, "nope");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(store.latest_overall().unwrap().is_none());
}

#[test]
fn delete_removes_exactly_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    let keep = store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();
    let drop_id = store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();

    store.delete("sess-1", &drop_id).unwrap();
    assert!(matches!(
        store.read("sess-1", &drop_id),
        Err(CheckpointStoreError::NotFound { .. })
    ));
    assert!(store.read("sess-1", &keep).is_ok());
    // Deleting again reports not-found.
    assert!(matches!(
        store.delete("sess-1", &drop_id),
        Err(CheckpointStoreError::NotFound { .. })
    ));
}

#[test]
fn cleanup_retains_only_the_newest_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();

    for minutes_ago in [30, 20, 10] {
        let mut record = record_for("sess-1", CheckpointReason::Periodic);
        record.created_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
        store.write(record).unwrap();
    }
    let newest = store
        .write(record_for("sess-1", CheckpointReason::Manual))
        .unwrap();
    let other = store
        .write(record_for("sess-2", CheckpointReason::Periodic))
        .unwrap();

    let deleted = store.cleanup_all().unwrap();
    assert_eq!(deleted, 3);
    let remaining = store.list("sess-1").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].checkpoint_id, newest);
    assert_eq!(store.list("sess-2").unwrap()[0].checkpoint_id, other);
}

#[test]
fn partial_and_foreign_files_are_invisible() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();
    let valid = store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();

    // A crashed write leaves a .tmp file; a stray file is not a
    // checkpoint. Neither may surface in listings.
    std::fs::write(dir.path().join("sess-1_partial.ckpt.tmp"), b"partial").unwrap();
    std::fs::write(dir.path().join("sess-1_garbage.ckpt"), b"not msgpack").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"unrelated").unwrap();

    let listed = store.list("sess-1").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].checkpoint_id, valid);
}

#[test]
fn open_is_idempotent_and_creates_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("deep").join("checkpoints");
    let store = CheckpointStore::open(&nested).unwrap();
    store
        .write(record_for("sess-1", CheckpointReason::Periodic))
        .unwrap();

    let reopened = CheckpointStore::open(&nested).unwrap();
    assert_eq!(reopened.list("sess-1").unwrap().len(), 1);
}

#[tokio::test]
async fn restored_state_resumes_identically() {
    // A checkpoint taken mid-trace and reloaded through the store must
    // drive the traversal to the same connection a fresh run finds.
    use chaintrace::engine::{CancelFlag, NoopObserver, SharedTraceState, TracePlan, TraceStatus, Tracer};
    use chaintrace::tx::{FilterConfig, TxFilter};
    use std::sync::Arc;

    let build_source = || {
        ScriptedTxSource::new()
            .with_tx(spend("t1", 100, &["X"], &["m1"]))
            .with_tx(spend("t2", 101, &["m1"], &["m2"]))
            .with_tx(spend("t3", 102, &["m2"], &["Y"]))
    };
    let plan = || TracePlan::new(addresses(&["X"]), addresses(&["Y"]), 4, BlockRange::OPEN);

    // Uninterrupted reference run.
    let tracer = Tracer::new(
        Arc::new(build_source()),
        memory_cache(),
        TxFilter::new(FilterConfig::default()),
    );
    let reference = SharedTraceState::default();
    let status = tracer
        .trace(&plan(), &reference, &mut NoopObserver, &CancelFlag::new())
        .await;
    assert_eq!(status, TraceStatus::Connected);
    let reference_connections = reference.snapshot().connections_found;

    // Interrupted run: cancel pre-armed so the engine stops immediately
    // after seeding, then checkpoint, reload, resume.
    let interrupted = SharedTraceState::default();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let status = tracer
        .trace(&plan(), &interrupted, &mut NoopObserver, &cancel)
        .await;
    assert_eq!(status, TraceStatus::Cancelled);

    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::open(dir.path()).unwrap();
    let mut record = record_for("sess-1", CheckpointReason::Cancel);
    record.trace_state = interrupted.snapshot();
    let checkpoint_id = store.write(record).unwrap();

    let restored = store.read("sess-1", &checkpoint_id).unwrap();
    let resumed = SharedTraceState::new(restored.trace_state);
    let status = tracer
        .trace(&plan(), &resumed, &mut NoopObserver, &CancelFlag::new())
        .await;

    assert_eq!(status, TraceStatus::Connected);
    let resumed_connections = resumed.snapshot().connections_found;
    assert_eq!(resumed_connections.len(), reference_connections.len());
    assert_eq!(resumed_connections[0].path, reference_connections[0].path);
}

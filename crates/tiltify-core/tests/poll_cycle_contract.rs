//! Contract Test: Poll Cycle
//!
//! This test verifies what a single tick delivers and persists.
//!
//! Constraints verified:
//! - Each donation id is emitted once, however often the source returns it
//! - Emission order follows completion time, not id or response order
//! - `lastId` only advances over emitted donations
//! - A failed fetch leaves the delivery state byte-identical
//! - A restarted engine resumes "after" the persisted cursor

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use tiltify_core::config::EngineConfig;
use tiltify_core::engine::PollEngine;
use tiltify_core::error::Error;
use tiltify_core::state::MemoryStateStore;
use tokio_test::assert_ok;

fn engine(
    source: &Arc<ScriptedSource>,
    store: &FlakyStateStore,
    sink: &RecordingSink,
    config: &EngineConfig,
) -> PollEngine {
    PollEngine::new(
        CAMPAIGN_ID,
        context(),
        source.clone(),
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        Duration::from_secs(5),
        config,
    )
}

fn store_with(document: serde_json::Value) -> FlakyStateStore {
    FlakyStateStore::new(MemoryStateStore::with_document(document))
}

fn delivery(last_id: i64, ids: serde_json::Value) -> serde_json::Value {
    json!({"tiltify": {CAMPAIGN_ID: {"lastId": last_id, "ids": ids}}})
}

#[tokio::test]
async fn first_tick_fetches_everything_in_completion_order() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(1, 100), donation(2, 50)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    let report = assert_ok!(engine(&source, &store, &sink, &engine_config()).tick().await);

    assert_eq!(source.donation_requests(), vec![None]);
    assert_eq!(sink.ids(), vec![2, 1]);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.last_id, Some(1));
    assert_eq!(store.snapshot().await, delivery(1, json!([2, 1])));
}

#[tokio::test]
async fn emission_order_ignores_response_order() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(30, 3), donation(10, 1), donation(20, 2)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    let times: Vec<_> = sink.events().iter().map(|e| e.completed_at).collect();
    assert_eq!(times, vec![1, 2, 3]);
}

#[tokio::test]
async fn equal_timestamps_keep_response_order() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(9, 10), donation(3, 10), donation(6, 10)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert_eq!(sink.ids(), vec![9, 3, 6]);
}

#[tokio::test]
async fn marker_tracks_last_emitted_donation() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(5, 1), donation(7, 2), donation(9, 3)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot["tiltify"][CAMPAIGN_ID]["lastId"], json!(9));
    assert_eq!(snapshot["tiltify"][CAMPAIGN_ID]["ids"], json!([5, 7, 9]));
}

#[tokio::test]
async fn same_response_twice_delivers_once() {
    let source = Arc::new(ScriptedSource::new());
    source
        .push_donations(vec![donation(4, 1)])
        .push_donations(vec![donation(4, 1)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();
    let engine = engine(&source, &store, &sink, &engine_config());

    engine.tick().await.unwrap();
    let second = engine.tick().await.unwrap();

    assert_eq!(sink.ids(), vec![4]);
    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(source.donation_requests(), vec![None, Some(4)]);
}

#[tokio::test]
async fn duplicate_within_one_response_is_emitted_once() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(4, 1), donation(4, 1)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    let report = engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert_eq!(sink.ids(), vec![4]);
    assert_eq!(report.skipped_duplicates, 1);
}

#[tokio::test]
async fn overlapping_window_emits_nothing_and_keeps_state() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(1, 100)]);
    let store = store_with(delivery(2, json!([1, 2])));
    let sink = RecordingSink::new();

    let report = engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert!(sink.events().is_empty());
    assert_eq!(report.last_id, Some(2));
    assert_eq!(store.snapshot().await, delivery(2, json!([1, 2])));
}

#[tokio::test]
async fn restart_resumes_after_persisted_marker() {
    let source = Arc::new(ScriptedSource::new());
    let store = store_with(delivery(9, json!([9])));
    let before = store.snapshot().await;
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert_eq!(source.donation_requests(), vec![Some(9)]);
    assert!(sink.events().is_empty());
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn sentinel_marker_requests_full_list() {
    let source = Arc::new(ScriptedSource::new());
    let store = store_with(delivery(-1, json!([])));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert_eq!(source.donation_requests(), vec![None]);
}

#[tokio::test]
async fn empty_first_tick_initializes_state() {
    let source = Arc::new(ScriptedSource::new());
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    assert_eq!(store.snapshot().await, delivery(-1, json!([])));
}

#[tokio::test]
async fn upstream_failure_leaves_state_byte_identical() {
    let source = Arc::new(ScriptedSource::new());
    source.push(Scripted::Upstream("HTTP 500"));
    let store = store_with(delivery(3, json!([1, 2, 3])));
    let before = serde_json::to_vec(&store.snapshot().await).unwrap();
    let sink = RecordingSink::new();

    let err = engine(&source, &store, &sink, &engine_config())
        .tick()
        .await
        .unwrap_err();

    assert!(err.is_upstream());
    assert!(sink.events().is_empty());
    assert_eq!(store.commit_calls(), 0);
    assert_eq!(serde_json::to_vec(&store.snapshot().await).unwrap(), before);
}

#[tokio::test]
async fn failed_tick_is_retried_from_same_state() {
    let source = Arc::new(ScriptedSource::new());
    source
        .push(Scripted::Upstream("HTTP 502"))
        .push_donations(vec![donation(4, 1)]);
    let store = store_with(delivery(3, json!([3])));
    let sink = RecordingSink::new();
    let engine = engine(&source, &store, &sink, &engine_config());

    assert!(engine.tick().await.is_err());
    engine.tick().await.unwrap();

    assert_eq!(source.donation_requests(), vec![Some(3), Some(3)]);
    assert_eq!(sink.ids(), vec![4]);
}

#[tokio::test]
async fn store_read_failure_aborts_before_fetch() {
    let source = Arc::new(ScriptedSource::new());
    let store = store_with(json!({}));
    store.set_fail_get(true);
    let sink = RecordingSink::new();

    let err = engine(&source, &store, &sink, &engine_config())
        .tick()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateStore(_)));
    assert_eq!(source.donation_calls(), 0);
}

#[tokio::test]
async fn commit_failure_leaves_state_and_redelivers_next_tick() {
    let source = Arc::new(ScriptedSource::new());
    source
        .push_donations(vec![donation(1, 1)])
        .push_donations(vec![donation(1, 1)]);
    let store = store_with(json!({}));
    store.set_fail_commit(true);
    let sink = RecordingSink::new();
    let engine = engine(&source, &store, &sink, &engine_config());

    assert!(matches!(engine.tick().await, Err(Error::StateStore(_))));
    assert_eq!(store.snapshot().await, json!({}));

    // At-least-once: the donation comes again after the store recovers
    store.set_fail_commit(false);
    engine.tick().await.unwrap();
    assert_eq!(sink.ids(), vec![1, 1]);
    assert_eq!(store.snapshot().await, delivery(1, json!([1])));
}

#[tokio::test]
async fn sink_failure_commits_emitted_prefix() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations(vec![donation(1, 1), donation(2, 2), donation(3, 3)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::failing_after(1);

    let err = engine(&source, &store, &sink, &engine_config())
        .tick()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EventSink(_)));
    assert_eq!(sink.ids(), vec![1]);
    assert_eq!(store.snapshot().await, delivery(1, json!([1])));
}

#[tokio::test]
async fn events_carry_campaign_context() {
    let source = Arc::new(ScriptedSource::new());
    let mut gift = donation(8, 1);
    gift.reward_id = Some(2);
    gift.comment = Some("gg".to_string());
    source.push_donations(vec![gift]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    engine(&source, &store, &sink, &engine_config()).tick().await.unwrap();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.from, "donor-8");
    assert_eq!(event.reward_id, Some(2));
    assert_eq!(event.comment.as_deref(), Some("gg"));
    assert_eq!(event.campaign_info.name, "Charity Stream");
    assert_eq!(event.campaign_info.cause_legal_name, "Good Cause Foundation");
    assert_eq!(event.campaign_info.total_raised, 300.0);
}

#[tokio::test]
async fn recency_window_is_bounded() {
    let source = Arc::new(ScriptedSource::new());
    source.push_donations((1..=5).map(|id| donation(id, id)).collect());
    let store = store_with(json!({}));
    let sink = RecordingSink::new();
    let config = EngineConfig {
        max_tracked_ids: 3,
        ..engine_config()
    };

    engine(&source, &store, &sink, &config).tick().await.unwrap();

    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(store.snapshot().await, delivery(5, json!([3, 4, 5])));
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out_as_upstream_failure() {
    let source = Arc::new(ScriptedSource::new());
    source.set_donation_delay(Duration::from_secs(30));
    let store = store_with(json!({}));
    let sink = RecordingSink::new();

    let err = engine(&source, &store, &sink, &engine_config())
        .tick()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(store.commit_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_ticks_are_serialized() {
    let source = Arc::new(ScriptedSource::new());
    source.set_donation_delay(Duration::from_secs(1));
    source
        .push_donations(vec![donation(1, 1)])
        .push_donations(vec![donation(1, 1)]);
    let store = store_with(json!({}));
    let sink = RecordingSink::new();
    let engine = engine(&source, &store, &sink, &engine_config());

    let (a, b) = tokio::join!(engine.tick(), engine.tick());
    a.unwrap();
    b.unwrap();

    assert_eq!(source.max_in_flight(), 1);
    assert_eq!(sink.ids(), vec![1]);
    // The second tick saw the first one's commit
    assert_eq!(source.donation_requests(), vec![None, Some(1)]);
}

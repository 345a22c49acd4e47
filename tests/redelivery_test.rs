//! At-least-once delivery: duplicate and redelivered messages never
//! reprocess a unit or move state backwards.

mod common;

use common::{eventually, make_transfer_area, ScriptedPipeline, TestHarness, SETTLE, WAIT};

use ingest_core::messaging::{DispatchMessage, MessageChannel};
use ingest_core::orchestration::{DispatchDisposition, DropReason, Worker};
use ingest_core::state_machine::{BatchState, UnitState};
use ingest_core::store::StateStore;

#[tokio::test]
async fn duplicate_dispatch_for_terminal_unit_is_dropped() {
    let harness = TestHarness::new(ScriptedPipeline::new(), 1);
    let area = make_transfer_area(&["a.zip", "b.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();

    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Processed
        })
        .await
    );
    assert_eq!(harness.pipeline.invocation_count(), 2);

    // Redeliver a message for an already processed unit
    let unit_id = harness.batch(batch_id).await.unit_ids[0];
    harness
        .channel
        .publish(DispatchMessage::new(unit_id, batch_id))
        .await
        .unwrap();

    tokio::time::sleep(SETTLE).await;

    // No state change, no second pipeline invocation
    assert_eq!(harness.pipeline.invocation_count(), 2);
    assert_eq!(harness.batch_state(batch_id).await, BatchState::Processed);
    let unit = harness.store.unit(unit_id).await.unwrap().unwrap();
    assert_eq!(unit.state, UnitState::Processed);

    harness.shutdown().await;
}

#[tokio::test]
async fn unacked_deliveries_are_redelivered_and_processed_once() {
    let harness = TestHarness::new(ScriptedPipeline::new(), 2);
    let area = make_transfer_area(&["a.zip", "b.zip", "c.zip"]);

    // Workers not running yet; simulate a consumer that crashed before ack
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();
    let _lost_delivery = harness.channel.consume().await.unwrap();
    assert_eq!(harness.channel.in_flight_count(), 1);
    let redelivered = harness.channel.redeliver_unacked().unwrap();
    assert_eq!(redelivered, 1);

    harness.start_workers();
    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Processed
        })
        .await
    );

    // Every unit ran exactly once despite the redelivery
    assert_eq!(harness.pipeline.invocation_count(), 3);

    harness.shutdown().await;
}

#[tokio::test]
async fn worker_dispositions_report_drop_reasons() {
    let harness = TestHarness::new(ScriptedPipeline::new(), 1);
    let area = make_transfer_area(&["a.zip"]);

    let batch_id = harness.coordinator.start(area.path()).await.unwrap();
    let unit_id = harness.batch(batch_id).await.unit_ids[0];

    // Drive deliveries by hand instead of through the pool
    let worker = Worker::new(
        0,
        harness.store.clone(),
        harness.channel.clone(),
        harness.pipeline.clone(),
        harness.publisher.clone(),
    );

    // First handling processes the unit
    let disposition = worker
        .handle_message(&DispatchMessage::new(unit_id, batch_id))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        DispatchDisposition::Processed(UnitState::Processed)
    );

    // Second handling is a redelivery of handled work
    let disposition = worker
        .handle_message(&DispatchMessage::new(unit_id, batch_id))
        .await
        .unwrap();
    // The batch finalized after the first pass, so the batch gate reports
    // the drop before the unit guard is ever consulted
    assert_eq!(
        disposition,
        DispatchDisposition::Dropped(DropReason::BatchNotAcceptingDispatch(BatchState::Processed))
    );

    assert_eq!(harness.pipeline.invocation_count(), 1);
}

#[tokio::test]
async fn dispatch_for_suspended_batch_leaves_unit_untouched() {
    let harness = TestHarness::new(ScriptedPipeline::new(), 1);
    let area = make_transfer_area(&["a.zip", "b.zip"]);

    let batch_id = harness.coordinator.start(area.path()).await.unwrap();
    harness.coordinator.suspend(batch_id).await.unwrap();

    let unit_id = harness.batch(batch_id).await.unit_ids[0];
    let worker = Worker::new(
        0,
        harness.store.clone(),
        harness.channel.clone(),
        harness.pipeline.clone(),
        harness.publisher.clone(),
    );

    let disposition = worker
        .handle_message(&DispatchMessage::new(unit_id, batch_id))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        DispatchDisposition::Dropped(DropReason::BatchNotAcceptingDispatch(BatchState::Suspended))
    );

    let unit = harness.store.unit(unit_id).await.unwrap().unwrap();
    assert_eq!(unit.state, UnitState::New);
    assert_eq!(harness.pipeline.invocation_count(), 0);
}

#[tokio::test]
async fn duplicate_start_for_claimed_unit_is_dropped() {
    // Hold the unit in flight, then replay its dispatch message
    let pipeline = ScriptedPipeline::new().holding(&["a.zip"]);
    let harness = TestHarness::new(pipeline, 1);
    let area = make_transfer_area(&["a.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();
    assert!(
        eventually(WAIT, || async {
            harness.counts(batch_id).await.processing == 1
        })
        .await
    );

    let unit_id = harness.batch(batch_id).await.unit_ids[0];
    let worker = Worker::new(
        1,
        harness.store.clone(),
        harness.channel.clone(),
        harness.pipeline.clone(),
        harness.publisher.clone(),
    );
    let disposition = worker
        .handle_message(&DispatchMessage::new(unit_id, batch_id))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        DispatchDisposition::Dropped(DropReason::AlreadyHandled)
    );

    harness.pipeline.release_held();
    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Processed
        })
        .await
    );
    // The pipeline ran once for the unit, not twice
    assert_eq!(harness.pipeline.invocation_count(), 1);

    harness.shutdown().await;
}

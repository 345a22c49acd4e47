//! Failure accounting: partial failure, the fifty-percent boundary, and the
//! automatic cancellation of batches that fail past it.

mod common;

use common::{eventually, make_transfer_area, ScriptedPipeline, TestHarness, SETTLE, WAIT};

use ingest_core::state_machine::{BatchState, UnitState};
use ingest_core::store::StateStore;

#[tokio::test]
async fn exactly_half_failed_is_processed_with_failures() {
    let pipeline = ScriptedPipeline::new().failing(&["a_bad.zip"]);
    let harness = TestHarness::new(pipeline, 1);
    let area = make_transfer_area(&["a_bad.zip", "b_good.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();

    // One of two failed: exactly half never aborts the batch
    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::ProcessedWithFailures
        })
        .await
    );

    let units = harness.store.units_of_batch(batch_id).await.unwrap();
    assert_eq!(units[0].state, UnitState::Failed);
    assert!(units[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("simulated pipeline failure"));
    assert_eq!(units[1].state, UnitState::Processed);
    assert!(units[1].last_error.is_none());

    harness.shutdown().await;
}

#[tokio::test]
async fn majority_failure_cancels_batch_and_skips_remaining_units() {
    // Single worker, sorted order: the two failing units run first
    let pipeline = ScriptedPipeline::new().failing(&["a_bad.zip", "b_bad.zip"]);
    let harness = TestHarness::new(pipeline, 1);
    let area = make_transfer_area(&["a_bad.zip", "b_bad.zip", "c_good.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();

    // Two of three failed: the batch cancels without waiting for the third
    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Canceled
        })
        .await
    );

    tokio::time::sleep(SETTLE).await;
    let batch = harness.batch(batch_id).await;
    assert_eq!(batch.state, BatchState::Canceled);
    assert!(batch.cancellation_reason.is_some());

    // The third unit was never dispatched into the pipeline
    let states = harness.unit_states(batch_id).await;
    assert_eq!(states[2], UnitState::New);
    assert_eq!(harness.pipeline.invocation_count(), 2);

    harness.shutdown().await;
}

#[tokio::test]
async fn threshold_cancel_does_not_revert_for_in_flight_unit() {
    // Two workers: c_good runs held while both failures land
    let pipeline = ScriptedPipeline::new()
        .failing(&["b_bad.zip", "c_bad.zip"])
        .holding(&["a_good.zip"]);
    let harness = TestHarness::new(pipeline, 2);
    let area = make_transfer_area(&["a_good.zip", "b_bad.zip", "c_bad.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();

    // Both failures land while a_good is still mid-pipeline; the second
    // failure crosses the majority line and cancels the batch immediately
    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Canceled
        })
        .await
    );
    assert_eq!(harness.counts(batch_id).await.processing, 1);

    // The in-flight unit completes and records its own result; the batch
    // does not revert from canceled
    harness.pipeline.release_held();
    assert!(
        eventually(WAIT, || async {
            harness.unit_states(batch_id).await[0] == UnitState::Processed
        })
        .await
    );
    tokio::time::sleep(SETTLE).await;
    assert_eq!(harness.batch_state(batch_id).await, BatchState::Canceled);

    harness.shutdown().await;
}

#[tokio::test]
async fn all_units_failing_cancels_batch() {
    let pipeline = ScriptedPipeline::new().failing(&["a.zip", "b.zip", "c.zip", "d.zip"]);
    let harness = TestHarness::new(pipeline, 2);
    let area = make_transfer_area(&["a.zip", "b.zip", "c.zip", "d.zip"]);

    harness.start_workers();
    let batch_id = harness.coordinator.start(area.path()).await.unwrap();

    assert!(
        eventually(WAIT, || async {
            harness.batch_state(batch_id).await == BatchState::Canceled
        })
        .await
    );

    // The threshold fired after the third failure at the latest
    tokio::time::sleep(SETTLE).await;
    let counts = harness.counts(batch_id).await;
    assert!(counts.failed >= 3);
    assert!(counts.processed == 0);

    harness.shutdown().await;
}

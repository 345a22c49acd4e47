//! # Worker
//!
//! Consumes dispatch messages, drives units through the processing pipeline,
//! and evaluates the batch completion rule after every unit it finishes.
//!
//! ## Handling discipline
//!
//! For each delivery the worker re-resolves all state from the store; the
//! message itself carries nothing but ids. The sequence realizes cooperative
//! suspend/cancel and redelivery safety:
//!
//! 1. batch not `Processing`: drop the message, unit stays as-is;
//! 2. failure threshold already exceeded: cancel the batch, drop;
//! 3. claim the unit via `New -> Processing` compare-and-swap; a redelivered
//!    message for a claimed or terminal unit loses the swap and is dropped
//!    without touching the pipeline;
//! 4. run the pipeline; any error or panic becomes the unit's failure detail;
//! 5. record the unit's terminal state, then evaluate the completion and
//!    threshold rule;
//! 6. acknowledge the delivery only after all of the above, so a crash in
//!    the middle leads to redelivery, which step 3 makes harmless.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

use crate::constants::events as lifecycle;
use crate::events::EventPublisher;
use crate::logging::{log_error, log_unit_operation};
use crate::messaging::{Delivery, DispatchMessage, MessageChannel, MessagingError};
use crate::models::Unit;
use crate::state_machine::{
    BatchState, StateMachineError, UnitEvent, UnitState, UnitStateMachine,
};
use crate::store::{StateStore, StoreError};
use thiserror::Error;

use super::batch_finalizer::{BatchFinalizer, FinalizationError};
use super::pipeline::{BatchContext, ProcessingPipeline};

/// Why a delivery was dropped without running the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The referenced batch no longer exists
    BatchMissing,
    /// The referenced unit no longer exists
    UnitMissing,
    /// Batch is suspended, canceled, or already finalized
    BatchNotAcceptingDispatch(BatchState),
    /// The failure-threshold rule fired before this unit started
    ThresholdExceeded,
    /// The unit is already claimed or terminal (redelivery)
    AlreadyHandled,
}

/// Outcome of handling one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDisposition {
    /// The unit was processed and reached the given terminal state
    Processed(UnitState),
    /// The message was dropped without invoking the pipeline
    Dropped(DropReason),
}

/// Errors that abort handling of a delivery.
///
/// These leave the delivery unacknowledged; the channel redelivers and the
/// state guards make the retry safe.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State machine error: {0}")]
    StateMachine(String),

    #[error("Finalization error: {0}")]
    Finalization(#[from] FinalizationError),
}

/// One member of the worker pool.
pub struct Worker {
    id: usize,
    store: Arc<dyn StateStore>,
    channel: Arc<dyn MessageChannel>,
    pipeline: Arc<dyn ProcessingPipeline>,
    event_publisher: EventPublisher,
    finalizer: BatchFinalizer,
}

impl Worker {
    /// Create a new Worker
    pub fn new(
        id: usize,
        store: Arc<dyn StateStore>,
        channel: Arc<dyn MessageChannel>,
        pipeline: Arc<dyn ProcessingPipeline>,
        event_publisher: EventPublisher,
    ) -> Self {
        let finalizer = BatchFinalizer::new(store.clone(), event_publisher.clone());
        Self {
            id,
            store,
            channel,
            pipeline,
            event_publisher,
            finalizer,
        }
    }

    /// Consume-and-handle loop; runs until the shutdown signal flips or the
    /// channel closes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(worker_id = self.id, "Worker started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender means the pool is gone; stop either way
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                delivery = self.channel.consume() => {
                    match delivery {
                        Ok(delivery) => self.handle_delivery(delivery).await,
                        Err(MessagingError::ChannelClosed { .. }) => break,
                        Err(e) => {
                            log_error("worker", "consume", &e.to_string(), None);
                        }
                    }
                }
            }
        }
        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let message = delivery.message.clone();
        match self.handle_message(&message).await {
            Ok(disposition) => {
                tracing::debug!(
                    worker_id = self.id,
                    unit_id = %message.unit_id,
                    disposition = ?disposition,
                    "Delivery handled"
                );
                // Acknowledge only after full handling; see module docs
                if let Err(e) = self.channel.ack(delivery.receipt).await {
                    log_error("worker", "ack", &e.to_string(), None);
                }
            }
            Err(e) => {
                // Leave unacknowledged; the channel will redeliver and the
                // transition guards make the retry safe
                log_error(
                    "worker",
                    "handle_delivery",
                    &e.to_string(),
                    Some(&format!("unit {}", message.unit_id)),
                );
            }
        }
    }

    /// Handle a single dispatch message through steps 1-5.
    ///
    /// Exposed for tests that need to drive deliveries without a running
    /// pool.
    pub async fn handle_message(
        &self,
        message: &DispatchMessage,
    ) -> Result<DispatchDisposition, WorkerError> {
        let unit_id = message.unit_id;
        let batch_id = message.batch_id;

        tracing::debug!(
            worker_id = self.id,
            unit_id = %unit_id,
            batch_id = %batch_id,
            "Dispatch message received"
        );

        // 1. Batch gate: suspended/canceled/finalized batches accept nothing
        let Some(batch) = self.store.batch(batch_id).await? else {
            tracing::warn!(batch_id = %batch_id, "Dropping dispatch for unknown batch");
            return Ok(DispatchDisposition::Dropped(DropReason::BatchMissing));
        };
        if !batch.state.accepts_dispatch() {
            self.publish_dropped(unit_id, batch_id, &batch.state.to_string())
                .await;
            return Ok(DispatchDisposition::Dropped(
                DropReason::BatchNotAcceptingDispatch(batch.state),
            ));
        }

        // 2. Fail fast before starting a unit of a doomed batch
        let counts = self.store.unit_state_counts(batch_id).await?;
        if counts.has_excess_failures() {
            tracing::error!(
                batch_id = %batch_id,
                failed = counts.failed,
                total = counts.total,
                "Too many failed units; canceling batch"
            );
            self.finalizer.evaluate_batch(batch_id).await?;
            return Ok(DispatchDisposition::Dropped(DropReason::ThresholdExceeded));
        }

        // 3. Claim the unit; a lost swap means redelivery of handled work
        let unit_machine =
            UnitStateMachine::new(unit_id, self.store.clone(), self.event_publisher.clone());
        match unit_machine.transition(UnitEvent::Start).await {
            Ok(_) => {}
            Err(StateMachineError::InvalidTransition { .. })
            | Err(StateMachineError::Conflict { .. }) => {
                tracing::debug!(unit_id = %unit_id, "Unit already claimed or terminal; dropping redelivery");
                return Ok(DispatchDisposition::Dropped(DropReason::AlreadyHandled));
            }
            Err(StateMachineError::Store(StoreError::NotFound { .. })) => {
                tracing::warn!(unit_id = %unit_id, "Dropping dispatch for unknown unit");
                return Ok(DispatchDisposition::Dropped(DropReason::UnitMissing));
            }
            Err(e) => return Err(WorkerError::StateMachine(e.to_string())),
        }

        let Some(unit) = self.store.unit(unit_id).await? else {
            return Ok(DispatchDisposition::Dropped(DropReason::UnitMissing));
        };
        log_unit_operation("start", Some(batch_id), Some(unit_id), "processing", None);

        // 4. Run the pipeline; failure and panic both become unit failure
        let context = BatchContext {
            batch_id,
            source_path: batch.source_path.clone(),
            debug_mode: batch.debug_mode,
        };
        let event = match self.invoke_pipeline(&unit, &context).await {
            Ok(()) => UnitEvent::Complete,
            Err(detail) => UnitEvent::fail_with_error(detail),
        };

        // 5. Record the terminal state, then evaluate the completion rule
        let terminal_state = unit_machine
            .transition(event)
            .await
            .map_err(|e| WorkerError::StateMachine(e.to_string()))?;
        log_unit_operation(
            "finish",
            Some(batch_id),
            Some(unit_id),
            &terminal_state.to_string(),
            None,
        );

        self.finalizer.evaluate_batch(batch_id).await?;

        Ok(DispatchDisposition::Processed(terminal_state))
    }

    /// Invoke the pipeline, converting errors and panics into failure detail.
    async fn invoke_pipeline(&self, unit: &Unit, context: &BatchContext) -> Result<(), String> {
        let invocation = std::panic::AssertUnwindSafe(self.pipeline.process(unit, context));
        match invocation.catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "pipeline panicked".to_string());
                Err(format!("Pipeline panicked: {detail}"))
            }
        }
    }

    async fn publish_dropped(&self, unit_id: Uuid, batch_id: Uuid, batch_state: &str) {
        tracing::warn!(
            unit_id = %unit_id,
            batch_id = %batch_id,
            batch_state = %batch_state,
            "Batch does not accept dispatch; dropping message"
        );
        let context = json!({
            "unit_id": unit_id,
            "batch_id": batch_id,
            "batch_state": batch_state,
        });
        if let Err(e) = self
            .event_publisher
            .publish(lifecycle::UNIT_DROPPED, context)
            .await
        {
            tracing::warn!(unit_id = %unit_id, error = %e, "Failed to publish unit dropped event");
        }
    }

    /// Worker id within the pool
    pub fn id(&self) -> usize {
        self.id
    }
}

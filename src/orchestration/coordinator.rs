//! # Coordinator
//!
//! Services the control surface of the ingest core: `start`, `suspend`,
//! `resume`, `cancel`. Control operations may race worker completions and
//! each other; every batch mutation goes through the state machine's
//! compare-and-swap, and a lost race is resolved by re-reading the batch
//! rather than by locking workers out.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::events::EventPublisher;
use crate::logging::log_batch_operation;
use crate::messaging::{DispatchMessage, MessageChannel, MessagingError};
use crate::models::Batch;
use crate::state_machine::{BatchEvent, BatchState, BatchStateMachine, StateMachineError, UnitState};
use crate::store::{StateStore, StoreError};

use super::batch_finalizer::{BatchFinalizer, FinalizationError};
use super::batch_initializer::BatchInitializer;

/// How often a control operation retries a lost compare-and-swap before
/// giving up. Contention on a single batch is operator-scale, not
/// worker-scale, so one retry is almost always enough.
const CAS_RETRY_LIMIT: usize = 3;

/// Errors surfaced by control operations
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Unknown batch id on a control operation
    #[error("Batch not found: {0}")]
    MissingBatch(Uuid),

    #[error("Invalid source path {path}: {message}")]
    InvalidSourcePath { path: String, message: String },

    #[error("No source items found at {path}")]
    EmptySource { path: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State machine error: {0}")]
    StateMachine(String),

    #[error("Finalization error: {0}")]
    Finalization(#[from] FinalizationError),
}

/// Creates batches and services suspend/resume/cancel control requests.
pub struct Coordinator {
    store: Arc<dyn StateStore>,
    channel: Arc<dyn MessageChannel>,
    event_publisher: EventPublisher,
    initializer: BatchInitializer,
    finalizer: BatchFinalizer,
    debug_mode: bool,
}

impl Coordinator {
    /// Create a new Coordinator
    pub fn new(
        store: Arc<dyn StateStore>,
        channel: Arc<dyn MessageChannel>,
        event_publisher: EventPublisher,
    ) -> Self {
        let initializer =
            BatchInitializer::new(store.clone(), channel.clone(), event_publisher.clone());
        let finalizer = BatchFinalizer::new(store.clone(), event_publisher.clone());
        Self {
            store,
            channel,
            event_publisher,
            initializer,
            finalizer,
            debug_mode: false,
        }
    }

    /// Create a Coordinator whose batches run with the debug flag set
    pub fn with_debug_mode(
        store: Arc<dyn StateStore>,
        channel: Arc<dyn MessageChannel>,
        event_publisher: EventPublisher,
        debug_mode: bool,
    ) -> Self {
        let mut coordinator = Self::new(store, channel, event_publisher);
        coordinator.debug_mode = debug_mode;
        coordinator
    }

    /// Start processing a batch of source items.
    ///
    /// Scans `source_path`, persists the batch and its units as one unit of
    /// work, dispatches every unit, and returns the new batch id.
    pub async fn start(&self, source_path: impl AsRef<Path>) -> Result<Uuid, CoordinatorError> {
        let source_path = source_path.as_ref();
        tracing::info!(path = %source_path.display(), "Batch processing triggered");

        let result = self
            .initializer
            .initialize(source_path, self.debug_mode)
            .await?;

        tracing::info!(
            batch_id = %result.batch_id,
            unit_count = result.unit_count,
            "New batch created and dispatched"
        );
        Ok(result.batch_id)
    }

    /// Suspend processing of a batch.
    ///
    /// Blocks new dispatch only; units already in flight complete normally
    /// and record their own state. Idempotent on an already suspended batch;
    /// a no-op on a batch that finalized concurrently.
    pub async fn suspend(&self, batch_id: Uuid) -> Result<(), CoordinatorError> {
        for _ in 0..CAS_RETRY_LIMIT {
            let batch = self.load_batch(batch_id).await?;
            if batch.state.is_terminal() {
                tracing::warn!(
                    batch_id = %batch_id,
                    state = %batch.state,
                    "Suspend requested for a finalized batch; nothing to do"
                );
                return Ok(());
            }

            match self.machine(batch_id).transition(BatchEvent::Suspend).await {
                Ok(_) => {
                    log_batch_operation("suspend", Some(batch_id), "suspended", None);
                    return Ok(());
                }
                // Lost a race against a worker finalization; re-read and
                // decide again
                Err(StateMachineError::Conflict { .. }) => continue,
                Err(e) => return Err(CoordinatorError::StateMachine(e.to_string())),
            }
        }
        Err(CoordinatorError::StateMachine(format!(
            "suspend of batch {batch_id} kept losing state races"
        )))
    }

    /// Resume processing of a suspended batch.
    ///
    /// Returns `false` without mutating when any unit is still in flight
    /// (resuming would race a duplicate dispatch) or when the batch already
    /// finalized. Otherwise re-dispatches the remaining `New` units and
    /// returns `true`; when every unit is already terminal, it instead
    /// finalizes the batch immediately per the completion rule.
    pub async fn resume(&self, batch_id: Uuid) -> Result<bool, CoordinatorError> {
        let batch = self.load_batch(batch_id).await?;
        if batch.state.is_terminal() {
            tracing::warn!(
                batch_id = %batch_id,
                state = %batch.state,
                "Resume requested for a finalized batch; nothing to do"
            );
            return Ok(false);
        }

        let counts = self.store.unit_state_counts(batch_id).await?;
        if counts.any_in_flight() {
            tracing::info!(
                batch_id = %batch_id,
                in_flight = counts.processing,
                "Batch still has units in flight; resume rejected"
            );
            return Ok(false);
        }

        if batch.state == BatchState::Suspended {
            match self.machine(batch_id).transition(BatchEvent::Resume).await {
                Ok(_) => {}
                // The guard re-checks in-flight units inside the transition;
                // losing here means a worker finished a unit or an operator
                // raced us, and the caller should retry
                Err(StateMachineError::Conflict { .. }) => return Ok(false),
                Err(StateMachineError::Guard(_)) => return Ok(false),
                Err(e) => return Err(CoordinatorError::StateMachine(e.to_string())),
            }
        }

        if counts.all_terminal() {
            // Nothing left to dispatch; apply the completion rule directly
            self.finalizer.evaluate_batch(batch_id).await?;
            log_batch_operation("resume", Some(batch_id), "finalized", None);
            return Ok(true);
        }

        // Re-dispatch the units suspension left behind, in discovery order
        let units = self.store.units_of_batch(batch_id).await?;
        let mut redispatched = 0;
        for unit in units.iter().filter(|unit| unit.state == UnitState::New) {
            self.channel
                .publish(DispatchMessage::new(unit.id, batch_id))
                .await?;
            redispatched += 1;
        }

        log_batch_operation(
            "resume",
            Some(batch_id),
            "processing",
            Some(&format!("{redispatched} unit(s) re-dispatched")),
        );
        Ok(true)
    }

    /// Cancel processing of a batch.
    ///
    /// The reason is recorded for audit only. Units in flight complete
    /// normally; units never started stay `New` forever. Idempotent on an
    /// already canceled batch; a no-op on a completed one.
    pub async fn cancel(
        &self,
        batch_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), CoordinatorError> {
        for _ in 0..CAS_RETRY_LIMIT {
            let batch = self.load_batch(batch_id).await?;
            if batch.state.is_terminal() {
                if batch.state != BatchState::Canceled {
                    tracing::warn!(
                        batch_id = %batch_id,
                        state = %batch.state,
                        "Cancel requested for a completed batch; nothing to do"
                    );
                }
                return Ok(());
            }

            match self
                .machine(batch_id)
                .transition(BatchEvent::Cancel(reason.clone()))
                .await
            {
                Ok(_) => {
                    log_batch_operation("cancel", Some(batch_id), "canceled", reason.as_deref());
                    return Ok(());
                }
                Err(StateMachineError::Conflict { .. }) => continue,
                Err(e) => return Err(CoordinatorError::StateMachine(e.to_string())),
            }
        }
        Err(CoordinatorError::StateMachine(format!(
            "cancel of batch {batch_id} kept losing state races"
        )))
    }

    async fn load_batch(&self, batch_id: Uuid) -> Result<Batch, CoordinatorError> {
        self.store
            .batch(batch_id)
            .await?
            .ok_or(CoordinatorError::MissingBatch(batch_id))
    }

    fn machine(&self, batch_id: Uuid) -> BatchStateMachine {
        BatchStateMachine::new(batch_id, self.store.clone(), self.event_publisher.clone())
    }
}

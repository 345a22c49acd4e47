use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::BatchEvent,
    guards::{NoUnitsInFlightGuard, StateGuard},
    states::BatchState,
};
use crate::constants::events as lifecycle;
use crate::events::EventPublisher;
use crate::store::StateStore;

/// Batch state machine with compare-and-swap persistence.
///
/// Transitions resolve the current state from the store, compute the target
/// through a pure transition table, run guards, and persist through the
/// store's conditional update. A concurrent state change between resolve and
/// persist surfaces as [`StateMachineError::Conflict`], which callers racing
/// toward the same terminal state treat as "someone else won".
pub struct BatchStateMachine {
    batch_id: Uuid,
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl BatchStateMachine {
    /// Create a new batch state machine instance
    pub fn new(batch_id: Uuid, store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            batch_id,
            store,
            event_publisher,
        }
    }

    /// Get the current state of the batch
    pub async fn current_state(&self) -> StateMachineResult<BatchState> {
        let batch = self
            .store
            .batch(self.batch_id)
            .await?
            .ok_or_else(|| crate::store::StoreError::batch_not_found(self.batch_id))?;
        Ok(batch.state)
    }

    /// Attempt to transition the batch state
    pub async fn transition(&self, event: BatchEvent) -> StateMachineResult<BatchState> {
        let batch = self
            .store
            .batch(self.batch_id)
            .await?
            .ok_or_else(|| crate::store::StoreError::batch_not_found(self.batch_id))?;
        let current_state = batch.state;
        let target_state = Self::determine_target_state(current_state, &event)?;

        // Check guards
        match (current_state, target_state, &event) {
            (BatchState::Suspended, BatchState::Processing, BatchEvent::Resume) => {
                NoUnitsInFlightGuard.check(&batch, self.store.as_ref()).await?;
            }
            _ => {}
        }

        // Persist through conditional update; a lost race is a conflict
        let applied = self
            .store
            .transition_batch(self.batch_id, current_state, &event, target_state)
            .await?;
        if !applied {
            return Err(StateMachineError::Conflict {
                entity: "batch",
                id: self.batch_id,
                expected: current_state.to_string(),
            });
        }

        self.publish_transition(current_state, target_state, &event)
            .await;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event.
    ///
    /// Pure function; terminal states absorb everything except an idempotent
    /// re-cancel.
    pub fn determine_target_state(
        current_state: BatchState,
        event: &BatchEvent,
    ) -> StateMachineResult<BatchState> {
        let target = match (current_state, event) {
            // Suspension; re-suspending an already suspended batch is a no-op
            (BatchState::Processing, BatchEvent::Suspend) => BatchState::Suspended,
            (BatchState::Suspended, BatchEvent::Suspend) => BatchState::Suspended,

            // Resumption (guarded)
            (BatchState::Suspended, BatchEvent::Resume) => BatchState::Processing,

            // Cancellation: operator request or failure-threshold policy
            (BatchState::Processing, BatchEvent::Cancel(_)) => BatchState::Canceled,
            (BatchState::Suspended, BatchEvent::Cancel(_)) => BatchState::Canceled,
            (BatchState::Canceled, BatchEvent::Cancel(_)) => BatchState::Canceled,

            // Completion
            (BatchState::Processing, BatchEvent::Complete) => BatchState::Processed,
            (BatchState::Processing, BatchEvent::CompleteWithFailures) => {
                BatchState::ProcessedWithFailures
            }

            // Invalid transitions
            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    async fn publish_transition(&self, from: BatchState, to: BatchState, event: &BatchEvent) {
        let event_name = match to {
            BatchState::Suspended => lifecycle::BATCH_SUSPENDED,
            BatchState::Processing => lifecycle::BATCH_RESUMED,
            BatchState::Canceled => lifecycle::BATCH_CANCELED,
            BatchState::Processed => lifecycle::BATCH_PROCESSED,
            BatchState::ProcessedWithFailures => lifecycle::BATCH_PROCESSED_WITH_FAILURES,
        };
        let context = json!({
            "batch_id": self.batch_id,
            "from_state": from.to_string(),
            "to_state": to.to_string(),
            "event": event.event_type(),
            "reason": event.cancellation_reason(),
        });
        // Lifecycle events are observability, not control flow; a publish
        // failure must never fail the transition itself
        if let Err(e) = self.event_publisher.publish(event_name, context).await {
            tracing::warn!(batch_id = %self.batch_id, error = %e, "Failed to publish batch transition event");
        }
    }

    /// Check if the batch is in a terminal state
    pub async fn is_terminal(&self) -> StateMachineResult<bool> {
        let current_state = self.current_state().await?;
        Ok(current_state.is_terminal())
    }

    /// Get batch ID
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }
}

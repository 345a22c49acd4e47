//! # Batch Finalizer
//!
//! The completion and failure-threshold rule, evaluated against a consistent
//! unit-state snapshot.
//!
//! ## Overview
//!
//! Workers call [`BatchFinalizer::evaluate_batch`] after every unit they
//! finish; the coordinator calls it when a resume finds no work left. The
//! decision itself is a pure function over [`UnitStateCounts`]:
//!
//! - strictly more than half the units failed: cancel the whole batch, even
//!   while units are still outstanding (fail-fast);
//! - all units terminal and none failed: `Processed`;
//! - all units terminal, some failed (up to and including exactly half):
//!   `ProcessedWithFailures`;
//! - otherwise: no batch-level transition yet.
//!
//! Applying the decision goes through the batch state machine's
//! compare-and-swap, so two workers finishing the last two units
//! concurrently cannot double-apply a terminal transition: the loser
//! observes a conflict and stands down.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::events::EventPublisher;
use crate::state_machine::{BatchEvent, BatchStateMachine, StateMachineError};
use crate::store::{StateStore, StoreError, UnitStateCounts};

/// Audit reason recorded when the failure-threshold rule cancels a batch
const THRESHOLD_CANCEL_REASON: &str = "More than half of the batch units failed";

/// Result of a finalization evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationResult {
    /// Batch the evaluation ran against
    pub batch_id: Uuid,
    /// Action taken
    pub action: FinalizationAction,
    /// Unit-state snapshot the decision was based on
    pub counts: UnitStateCounts,
}

/// Batch-level action decided by the completion/threshold rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizationAction {
    /// Every unit processed successfully; batch marked `Processed`
    Completed,
    /// All units terminal with some failures; batch marked
    /// `ProcessedWithFailures`
    CompletedWithFailures,
    /// Failure threshold exceeded; batch canceled
    Canceled,
    /// Units still outstanding, or another actor already finalized
    NoAction,
}

/// Errors raised during finalization
#[derive(Error, Debug)]
pub enum FinalizationError {
    #[error("Batch not found: {0}")]
    BatchNotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("State machine error: {0}")]
    StateMachine(String),
}

/// Evaluates and applies the batch completion/failure-threshold rule.
pub struct BatchFinalizer {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl BatchFinalizer {
    /// Create a new BatchFinalizer
    pub fn new(store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    /// Decide the batch-level action for a unit-state snapshot.
    ///
    /// Pure function; the threshold branch comes first so a doomed batch
    /// cancels without waiting for stragglers.
    pub fn decide(counts: &UnitStateCounts) -> FinalizationAction {
        if counts.has_excess_failures() {
            return FinalizationAction::Canceled;
        }
        if !counts.all_terminal() {
            return FinalizationAction::NoAction;
        }
        if counts.failed == 0 {
            FinalizationAction::Completed
        } else {
            FinalizationAction::CompletedWithFailures
        }
    }

    /// Evaluate the rule for a batch and apply at most one transition.
    ///
    /// Safe to call from any number of workers concurrently; a lost
    /// compare-and-swap race degrades to `NoAction`.
    pub async fn evaluate_batch(&self, batch_id: Uuid) -> Result<FinalizationResult, FinalizationError> {
        let batch = self
            .store
            .batch(batch_id)
            .await?
            .ok_or(FinalizationError::BatchNotFound(batch_id))?;

        let counts = self.store.unit_state_counts(batch_id).await?;

        // A finalized batch never moves again; redundant evaluations after a
        // threshold cancel land here
        if batch.state.is_terminal() {
            return Ok(FinalizationResult {
                batch_id,
                action: FinalizationAction::NoAction,
                counts,
            });
        }

        let action = Self::decide(&counts);
        let event = match action {
            FinalizationAction::Canceled => BatchEvent::cancel_with_reason(THRESHOLD_CANCEL_REASON),
            FinalizationAction::Completed => BatchEvent::Complete,
            FinalizationAction::CompletedWithFailures => BatchEvent::CompleteWithFailures,
            FinalizationAction::NoAction => {
                return Ok(FinalizationResult {
                    batch_id,
                    action,
                    counts,
                })
            }
        };

        let machine =
            BatchStateMachine::new(batch_id, self.store.clone(), self.event_publisher.clone());
        match machine.transition(event).await {
            Ok(state) => {
                tracing::info!(
                    batch_id = %batch_id,
                    state = %state,
                    failed = counts.failed,
                    total = counts.total,
                    "Batch finalized"
                );
                Ok(FinalizationResult {
                    batch_id,
                    action,
                    counts,
                })
            }
            // Another worker finalized concurrently, or the operator
            // suspended between snapshot and apply; both mean stand down
            Err(StateMachineError::Conflict { .. })
            | Err(StateMachineError::InvalidTransition { .. }) => Ok(FinalizationResult {
                batch_id,
                action: FinalizationAction::NoAction,
                counts,
            }),
            Err(e) => Err(FinalizationError::StateMachine(e.to_string())),
        }
    }
}

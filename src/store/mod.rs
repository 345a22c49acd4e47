//! # State Store Contract
//!
//! Repository seam for Batch and Unit aggregates.
//!
//! ## Overview
//!
//! The coordination core never talks to a database directly; it goes through
//! [`StateStore`], one repository call per aggregate. Two operations carry the
//! concurrency discipline the coordination logic depends on:
//!
//! - `transition_batch` / `transition_unit` are **compare-and-swap** writes:
//!   the mutation applies only when the record is still in the expected state,
//!   so exactly one of several racing actors wins a contested transition.
//! - `unit_state_counts` returns a snapshot taken consistently across all
//!   units of the batch, which is what makes "are all units terminal" a
//!   decidable question under concurrent writers.
//!
//! Every successful transition is appended to a per-record audit trail,
//! readable through the history accessors.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Batch, Unit};
use crate::state_machine::events::{BatchEvent, UnitEvent};
use crate::state_machine::states::{BatchState, UnitState};

pub use memory::InMemoryStateStore;

/// Errors raised by state store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: Uuid },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn batch_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "batch", id }
    }

    pub fn unit_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "unit", id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counts of a batch's units by state, taken as one consistent snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStateCounts {
    pub total: usize,
    pub new: usize,
    pub processing: usize,
    pub processed: usize,
    pub failed: usize,
}

impl UnitStateCounts {
    /// Number of units in a terminal state
    pub fn terminal(&self) -> usize {
        self.processed + self.failed
    }

    /// True when every unit of the batch is terminal
    pub fn all_terminal(&self) -> bool {
        self.terminal() == self.total
    }

    /// True when any unit is currently owned by a worker
    pub fn any_in_flight(&self) -> bool {
        self.processing > 0
    }

    /// Failure-threshold rule: strictly more than half the units failed.
    ///
    /// Exact integer arithmetic; exactly half failing never trips the rule.
    pub fn has_excess_failures(&self) -> bool {
        self.failed * 2 > self.total
    }
}

/// One audit-trail entry for a batch or unit state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: String,
    pub to_state: String,
    pub event_type: String,
    /// Serialized triggering event, including any carried detail
    pub event: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for Batch and Unit aggregates.
///
/// Implementations must provide per-record atomic read-modify-write and a
/// consistent cross-unit snapshot for `unit_state_counts`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist a batch and its units as a single unit of work.
    ///
    /// Either everything is visible afterwards or nothing is.
    async fn insert_batch_with_units(&self, batch: Batch, units: Vec<Unit>) -> StoreResult<()>;

    /// Point read of a batch record.
    async fn batch(&self, batch_id: Uuid) -> StoreResult<Option<Batch>>;

    /// Point read of a unit record.
    async fn unit(&self, unit_id: Uuid) -> StoreResult<Option<Unit>>;

    /// All units of a batch, in discovery order.
    async fn units_of_batch(&self, batch_id: Uuid) -> StoreResult<Vec<Unit>>;

    /// Consistent per-state counts across all units of a batch.
    async fn unit_state_counts(&self, batch_id: Uuid) -> StoreResult<UnitStateCounts>;

    /// Compare-and-swap batch transition.
    ///
    /// Applies `to` (recording the triggering event in the audit trail, and
    /// the cancellation reason when the event carries one) only when the
    /// batch is still in `expected`. Returns `false` without mutating when
    /// the state changed concurrently.
    async fn transition_batch(
        &self,
        batch_id: Uuid,
        expected: BatchState,
        event: &BatchEvent,
        to: BatchState,
    ) -> StoreResult<bool>;

    /// Compare-and-swap unit transition.
    ///
    /// Same contract as [`StateStore::transition_batch`]; a `Fail` event also
    /// records its error detail on the unit.
    async fn transition_unit(
        &self,
        unit_id: Uuid,
        expected: UnitState,
        event: &UnitEvent,
        to: UnitState,
    ) -> StoreResult<bool>;

    /// Audit trail of a batch's transitions, oldest first.
    async fn batch_transition_history(&self, batch_id: Uuid) -> StoreResult<Vec<TransitionRecord>>;

    /// Audit trail of a unit's transitions, oldest first.
    async fn unit_transition_history(&self, unit_id: Uuid) -> StoreResult<Vec<TransitionRecord>>;
}

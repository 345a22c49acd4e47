//! # Batch Model
//!
//! Aggregate record grouping one ingest run's set of units.
//!
//! ## Overview
//!
//! A `Batch` is created by the coordinator when a transfer area is scanned.
//! It references its units by id, in discovery order, and carries the
//! aggregate lifecycle state that the coordinator and workers negotiate over.
//! The unit id list is set once at creation and never reordered or mutated.
//!
//! State is managed through [`crate::state_machine::BatchStateMachine`]; this
//! record only holds the materialized current value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::states::BatchState;

/// Aggregate over one ingest run's units, with its own lifecycle state.
///
/// The `unit_ids` ordering is significant: it reflects the order in which
/// source items were discovered in the transfer area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub state: BatchState,
    /// Unit ids in discovery order. Immutable after creation.
    pub unit_ids: Vec<Uuid>,
    /// Transfer area this batch was scanned from.
    pub source_path: String,
    /// Propagated to pipeline invocations; no effect on coordination.
    pub debug_mode: bool,
    /// Operator- or policy-supplied reason, recorded for audit when the
    /// batch is canceled.
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Create a new batch in the initial `Processing` state.
    pub fn new(unit_ids: Vec<Uuid>, source_path: impl Into<String>, debug_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: BatchState::Processing,
            unit_ids,
            source_path: source_path.into(),
            debug_mode,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of units belonging to this batch.
    pub fn unit_count(&self) -> usize {
        self.unit_ids.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

//! # Unit Model
//!
//! One discrete source item (SIP package) submitted for processing within a
//! batch.
//!
//! A unit holds a lookup-by-id reference to its batch, never an owning
//! pointer; batch membership is fixed for the unit's lifetime. State moves
//! monotonically along `New -> Processing -> {Processed | Failed}` and a
//! terminal unit is never handed to the pipeline again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::states::UnitState;

/// One item of a batch, with its own lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    /// Batch membership, by id. Fixed for the unit's lifetime.
    pub batch_id: Uuid,
    pub state: UnitState,
    /// File name of the source item as discovered in the transfer area.
    pub original_file_name: String,
    /// Error detail, present only when `state == Failed`.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Create a new unit in the initial `New` state.
    pub fn new(batch_id: Uuid, original_file_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            batch_id,
            state: UnitState::New,
            original_file_name: original_file_name.into(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

//! # Dispatch Message Structures
//!
//! The unit of work handed from the coordinator to a worker. The payload is
//! deliberately minimal, just `(unit_id, batch_id)`, because workers
//! re-resolve all state from the store on receipt; a stale message can never
//! carry stale state into a decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message dispatching one unit of a batch to the worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub unit_id: Uuid,
    pub batch_id: Uuid,
    /// Message metadata
    pub metadata: DispatchMessageMetadata,
}

/// Metadata for dispatch messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMessageMetadata {
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// Correlation ID for tracking a unit across redeliveries
    pub correlation_id: Uuid,
}

impl Default for DispatchMessageMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            correlation_id: Uuid::new_v4(),
        }
    }
}

impl DispatchMessage {
    /// Create a new dispatch message
    pub fn new(unit_id: Uuid, batch_id: Uuid) -> Self {
        Self {
            unit_id,
            batch_id,
            metadata: DispatchMessageMetadata::default(),
        }
    }
}

//! # Processing Pipeline Contract
//!
//! The per-unit processing collaborator (format identification, validation,
//! metadata generation, archival upload) is opaque to this crate: one call
//! per unit, success or failure out. The worker converts every failure,
//! whether an explicit result, a returned error, or a panic, into the unit's
//! `Failed` state; nothing a pipeline does can crash a worker.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Unit;

/// Batch-level context handed to every pipeline invocation
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: Uuid,
    /// Transfer area the batch was scanned from
    pub source_path: String,
    /// Debug flag propagated from the batch; interpretation is the
    /// pipeline's business
    pub debug_mode: bool,
}

/// Errors a pipeline invocation may surface
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline failure: {0}")]
    Failure(String),

    #[error("Pipeline internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

/// Opaque per-unit processing collaborator.
///
/// Must be safely callable once per unit per dispatch; the caller guarantees
/// (through unit state guards) that a terminal unit is never processed again.
#[async_trait]
pub trait ProcessingPipeline: Send + Sync {
    async fn process(&self, unit: &Unit, context: &BatchContext) -> Result<(), PipelineError>;
}

/// Pipeline that succeeds without doing anything. Placeholder for wiring
/// examples and smoke tests.
pub struct NoopPipeline;

#[async_trait]
impl ProcessingPipeline for NoopPipeline {
    async fn process(&self, _unit: &Unit, _context: &BatchContext) -> Result<(), PipelineError> {
        Ok(())
    }
}

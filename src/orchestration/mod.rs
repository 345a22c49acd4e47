//! # Orchestration
//!
//! Coordination logic between the control surface and the worker pool:
//!
//! - [`Coordinator`] - services `start` / `suspend` / `resume` / `cancel`
//! - [`BatchInitializer`] - scans a transfer area into a batch of units and
//!   dispatches them
//! - [`Worker`] - consumes dispatch messages and drives units through the
//!   pipeline
//! - [`BatchFinalizer`] - the completion and failure-threshold rule
//! - [`WorkerPool`] - fixed-size pool of workers with graceful shutdown
//! - [`ProcessingPipeline`] - the opaque per-unit processing collaborator

pub mod batch_finalizer;
pub mod batch_initializer;
pub mod coordinator;
pub mod pipeline;
pub mod worker;
pub mod worker_pool;

pub use batch_finalizer::{BatchFinalizer, FinalizationAction, FinalizationError, FinalizationResult};
pub use batch_initializer::{BatchInitializationResult, BatchInitializer};
pub use coordinator::{Coordinator, CoordinatorError};
pub use pipeline::{BatchContext, NoopPipeline, PipelineError, ProcessingPipeline};
pub use worker::{DispatchDisposition, DropReason, Worker, WorkerError};
pub use worker_pool::WorkerPool;

#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ingest Core
//!
//! Rust implementation of the batch-coordination core of an archival ingest
//! system.
//!
//! ## Overview
//!
//! Source items discovered in a transfer area are grouped into a **batch** of
//! **units**, each unit travelling through an external processing pipeline
//! (format identification, validation, metadata generation; opaque to this
//! crate). This core owns everything between "a batch was requested" and
//! "the batch reached a terminal state":
//!
//! - per-unit and per-batch lifecycle state machines with transition guards
//! - a coordinator servicing `start` / `suspend` / `resume` / `cancel`
//! - a pool of workers consuming dispatch messages and driving units through
//!   the pipeline
//! - the completion rule that finalizes a batch, including the automatic
//!   cancellation of batches whose failure rate climbs above one half
//!
//! Persistence and message transport are reached through the [`store`] and
//! [`messaging`] trait seams; in-memory implementations back the test suite
//! and embedded deployments.
//!
//! ## Module Organization
//!
//! - [`models`] - Batch and Unit records
//! - [`state_machine`] - lifecycle states, events, guards and transitions
//! - [`store`] - state store contract and in-memory implementation
//! - [`messaging`] - dispatch message channel contract and in-memory queue
//! - [`orchestration`] - coordinator, worker, initializer, finalizer, pool
//! - [`events`] - lifecycle event publishing
//! - [`config`] - configuration management
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ingest_core::config::IngestConfig;
//! use ingest_core::events::EventPublisher;
//! use ingest_core::messaging::InMemoryChannel;
//! use ingest_core::orchestration::{Coordinator, NoopPipeline, WorkerPool};
//! use ingest_core::store::InMemoryStateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IngestConfig::default();
//! let store = Arc::new(InMemoryStateStore::new());
//! let channel = Arc::new(InMemoryChannel::new());
//! let publisher = EventPublisher::new(config.event_capacity);
//!
//! let coordinator = Coordinator::new(store.clone(), channel.clone(), publisher.clone());
//! let pool = WorkerPool::new(store, channel, Arc::new(NoopPipeline), publisher, config);
//! pool.start();
//!
//! let batch_id = coordinator.start("/var/ingest/transfer-area").await?;
//! println!("batch {batch_id} dispatched");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use models::{Batch, Unit};
pub use state_machine::{BatchEvent, BatchState, UnitEvent, UnitState};

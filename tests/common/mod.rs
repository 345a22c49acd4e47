//! Shared fixtures for the integration test suite.
//!
//! `TestHarness` wires the in-memory store and channel to a coordinator and
//! a worker pool, with a `ScriptedPipeline` standing in for the external
//! processing pipeline. Scripts are keyed by the unit's original file name:
//! a name can be told to fail, or to block until the test releases it
//! (keeping that unit in flight while the test exercises control
//! operations).

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use ingest_core::config::IngestConfig;
use ingest_core::events::EventPublisher;
use ingest_core::messaging::InMemoryChannel;
use ingest_core::models::{Batch, Unit};
use ingest_core::orchestration::{
    BatchContext, Coordinator, PipelineError, ProcessingPipeline, WorkerPool,
};
use ingest_core::state_machine::{BatchState, UnitState};
use ingest_core::store::{InMemoryStateStore, StateStore, UnitStateCounts};

/// Pipeline double scripted by unit file name.
pub struct ScriptedPipeline {
    fail_names: HashSet<String>,
    hold_names: HashSet<String>,
    release_tx: watch::Sender<bool>,
    release_rx: watch::Receiver<bool>,
    invocations: Mutex<Vec<String>>,
}

impl ScriptedPipeline {
    pub fn new() -> Self {
        let (release_tx, release_rx) = watch::channel(false);
        Self {
            fail_names: HashSet::new(),
            hold_names: HashSet::new(),
            release_tx,
            release_rx,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Units with these file names report pipeline failure
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.fail_names = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Units with these file names block in the pipeline until
    /// `release_held` is called
    pub fn holding(mut self, names: &[&str]) -> Self {
        self.hold_names = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Unblock every held unit
    pub fn release_held(&self) {
        let _ = self.release_tx.send(true);
    }

    /// File names the pipeline has been invoked for, in invocation order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl ProcessingPipeline for ScriptedPipeline {
    async fn process(&self, unit: &Unit, _context: &BatchContext) -> Result<(), PipelineError> {
        self.invocations.lock().push(unit.original_file_name.clone());

        if self.hold_names.contains(&unit.original_file_name) {
            let mut release = self.release_rx.clone();
            while !*release.borrow() {
                if release.changed().await.is_err() {
                    break;
                }
            }
        }

        if self.fail_names.contains(&unit.original_file_name) {
            return Err(PipelineError::failure(format!(
                "simulated pipeline failure for {}",
                unit.original_file_name
            )));
        }
        Ok(())
    }
}

/// Fully wired in-memory coordination stack.
pub struct TestHarness {
    pub store: Arc<InMemoryStateStore>,
    pub channel: Arc<InMemoryChannel>,
    pub publisher: EventPublisher,
    pub pipeline: Arc<ScriptedPipeline>,
    pub coordinator: Coordinator,
    pub pool: WorkerPool,
}

impl TestHarness {
    pub fn new(pipeline: ScriptedPipeline, worker_count: usize) -> Self {
        let config = IngestConfig {
            worker_count,
            ..IngestConfig::default()
        };
        let store = Arc::new(InMemoryStateStore::new());
        let channel = Arc::new(InMemoryChannel::new());
        let publisher = EventPublisher::new(config.event_capacity);
        let pipeline = Arc::new(pipeline);

        let coordinator = Coordinator::new(store.clone(), channel.clone(), publisher.clone());
        let pool = WorkerPool::new(
            store.clone(),
            channel.clone(),
            pipeline.clone(),
            publisher.clone(),
            config,
        );

        Self {
            store,
            channel,
            publisher,
            pipeline,
            coordinator,
            pool,
        }
    }

    pub fn start_workers(&self) {
        self.pool.start();
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    pub async fn batch(&self, batch_id: Uuid) -> Batch {
        self.store
            .batch(batch_id)
            .await
            .expect("store read failed")
            .expect("batch missing")
    }

    pub async fn batch_state(&self, batch_id: Uuid) -> BatchState {
        self.batch(batch_id).await.state
    }

    pub async fn unit_states(&self, batch_id: Uuid) -> Vec<UnitState> {
        self.store
            .units_of_batch(batch_id)
            .await
            .expect("store read failed")
            .into_iter()
            .map(|unit| unit.state)
            .collect()
    }

    pub async fn counts(&self, batch_id: Uuid) -> UnitStateCounts {
        self.store
            .unit_state_counts(batch_id)
            .await
            .expect("store read failed")
    }
}

/// Create a transfer area directory containing one file per name.
pub fn make_transfer_area(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create transfer area");
    for name in names {
        std::fs::write(dir.path().join(name), b"sip content").expect("failed to seed transfer area");
    }
    dir
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Default timeout for `eventually` in these tests
pub const WAIT: Duration = Duration::from_secs(5);

/// A settle delay for asserting that something does NOT happen
pub const SETTLE: Duration = Duration::from_millis(200);

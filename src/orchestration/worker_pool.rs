//! # Worker Pool
//!
//! Fixed-size pool of [`Worker`]s sharing one dispatch channel. Each worker
//! pulls and fully handles one delivery at a time; parallelism comes from
//! the pool width, never from intra-worker concurrency.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::IngestConfig;
use crate::events::EventPublisher;
use crate::messaging::MessageChannel;
use crate::store::StateStore;

use super::pipeline::ProcessingPipeline;
use super::worker::Worker;

/// Pool of dispatch workers with graceful shutdown.
pub struct WorkerPool {
    store: Arc<dyn StateStore>,
    channel: Arc<dyn MessageChannel>,
    pipeline: Arc<dyn ProcessingPipeline>,
    event_publisher: EventPublisher,
    worker_count: usize,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new WorkerPool
    pub fn new(
        store: Arc<dyn StateStore>,
        channel: Arc<dyn MessageChannel>,
        pipeline: Arc<dyn ProcessingPipeline>,
        event_publisher: EventPublisher,
        config: IngestConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            channel,
            pipeline,
            event_publisher,
            worker_count: config.worker_count,
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn all workers.
    ///
    /// Idempotent only in the sense that calling it twice spawns a second
    /// generation of workers; callers are expected to start a pool once.
    pub fn start(&self) {
        tracing::info!(worker_count = self.worker_count, "Starting worker pool");

        let mut handles = self.handles.lock();
        for worker_id in 0..self.worker_count {
            let worker = Worker::new(
                worker_id,
                self.store.clone(),
                self.channel.clone(),
                self.pipeline.clone(),
                self.event_publisher.clone(),
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                worker.run(shutdown_rx).await;
            }));
        }
    }

    /// Signal every worker to stop and wait for them to finish.
    ///
    /// Workers complete the delivery they are handling before exiting;
    /// nothing is interrupted mid-pipeline.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down worker pool");
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker task terminated abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }

    /// Number of workers this pool spawns
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

//! # Batch Initializer
//!
//! Turns a transfer area into a persisted batch of units and dispatches them.
//!
//! The scan enumerates the direct entries of the source directory, one unit
//! per entry, skipping hidden files. Entries are sorted by file name so that
//! discovery order (which fixes the batch's unit ordering forever) is
//! deterministic across platforms and filesystems.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::constants::events as lifecycle;
use crate::events::EventPublisher;
use crate::logging::log_batch_operation;
use crate::messaging::{DispatchMessage, MessageChannel};
use crate::models::{Batch, Unit};
use crate::store::StateStore;

use super::coordinator::CoordinatorError;

/// Result of a successful batch initialization
#[derive(Debug, Clone)]
pub struct BatchInitializationResult {
    pub batch_id: Uuid,
    pub unit_count: usize,
    /// Unit ids in discovery order
    pub unit_ids: Vec<Uuid>,
}

/// Creates batches from a source directory and dispatches their units.
pub struct BatchInitializer {
    store: Arc<dyn StateStore>,
    channel: Arc<dyn MessageChannel>,
    event_publisher: EventPublisher,
}

impl BatchInitializer {
    /// Create a new BatchInitializer
    pub fn new(
        store: Arc<dyn StateStore>,
        channel: Arc<dyn MessageChannel>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            store,
            channel,
            event_publisher,
        }
    }

    /// Scan `source_path`, persist one batch with one unit per discovered
    /// item, and dispatch every unit to the worker queue.
    pub async fn initialize(
        &self,
        source_path: &Path,
        debug_mode: bool,
    ) -> Result<BatchInitializationResult, CoordinatorError> {
        let item_names = scan_source_items(source_path)?;
        if item_names.is_empty() {
            return Err(CoordinatorError::EmptySource {
                path: source_path.display().to_string(),
            });
        }

        let batch_id = Uuid::new_v4();
        let units: Vec<Unit> = item_names
            .iter()
            .map(|name| Unit::new(batch_id, name.clone()))
            .collect();
        let unit_ids: Vec<Uuid> = units.iter().map(|unit| unit.id).collect();

        let mut batch = Batch::new(
            unit_ids.clone(),
            source_path.display().to_string(),
            debug_mode,
        );
        batch.id = batch_id;

        // Batch and units become visible together or not at all
        self.store
            .insert_batch_with_units(batch, units)
            .await
            .map_err(CoordinatorError::Store)?;

        log_batch_operation(
            "create",
            Some(batch_id),
            "processing",
            Some(&format!("{} unit(s) discovered", unit_ids.len())),
        );
        if let Err(e) = self
            .event_publisher
            .publish(
                lifecycle::BATCH_CREATED,
                json!({
                    "batch_id": batch_id,
                    "unit_count": unit_ids.len(),
                    "source_path": source_path.display().to_string(),
                }),
            )
            .await
        {
            tracing::warn!(batch_id = %batch_id, error = %e, "Failed to publish batch created event");
        }

        // Dispatch in discovery order
        for unit_id in &unit_ids {
            self.channel
                .publish(DispatchMessage::new(*unit_id, batch_id))
                .await
                .map_err(CoordinatorError::Messaging)?;
        }

        Ok(BatchInitializationResult {
            batch_id,
            unit_count: unit_ids.len(),
            unit_ids,
        })
    }
}

/// Enumerate discrete source items, sorted by file name.
fn scan_source_items(source_path: &Path) -> Result<Vec<String>, CoordinatorError> {
    if !source_path.is_dir() {
        return Err(CoordinatorError::InvalidSourcePath {
            path: source_path.display().to_string(),
            message: "not an existing directory".to_string(),
        });
    }

    let entries = std::fs::read_dir(source_path).map_err(|e| CoordinatorError::InvalidSourcePath {
        path: source_path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoordinatorError::InvalidSourcePath {
            path: source_path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

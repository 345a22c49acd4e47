use crate::error::{IngestError, Result};

/// Runtime configuration for the coordination core.
///
/// Every field has a sensible default and can be overridden from the
/// environment; collaborator-specific settings (database URLs, broker
/// endpoints) belong to the store/channel implementations, not here.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of workers consuming dispatch messages in parallel.
    pub worker_count: usize,
    /// Capacity of the lifecycle event broadcast channel.
    pub event_capacity: usize,
    /// Default debug-mode flag for newly created batches, propagated to
    /// pipeline invocations.
    pub debug_mode: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            event_capacity: 1000,
            debug_mode: false,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(worker_count) = std::env::var("INGEST_WORKER_COUNT") {
            config.worker_count = worker_count.parse().map_err(|e| {
                IngestError::ConfigurationError(format!("Invalid worker_count: {e}"))
            })?;
            if config.worker_count == 0 {
                return Err(IngestError::ConfigurationError(
                    "worker_count must be at least 1".to_string(),
                ));
            }
        }

        if let Ok(event_capacity) = std::env::var("INGEST_EVENT_CAPACITY") {
            config.event_capacity = event_capacity.parse().map_err(|e| {
                IngestError::ConfigurationError(format!("Invalid event_capacity: {e}"))
            })?;
        }

        if let Ok(debug_mode) = std::env::var("INGEST_DEBUG_MODE") {
            config.debug_mode = debug_mode.parse().map_err(|e| {
                IngestError::ConfigurationError(format!("Invalid debug_mode: {e}"))
            })?;
        }

        Ok(config)
    }
}

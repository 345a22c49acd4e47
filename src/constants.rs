//! Shared constants: queue names and lifecycle event names.

/// Name of the point-to-point queue carrying dispatch messages from the
/// coordinator to the worker pool.
pub const DISPATCH_QUEUE: &str = "ingest_dispatch";

/// Lifecycle event names published through the [`crate::events::EventPublisher`].
pub mod events {
    pub const BATCH_CREATED: &str = "batch.created";
    pub const BATCH_SUSPENDED: &str = "batch.suspended";
    pub const BATCH_RESUMED: &str = "batch.resumed";
    pub const BATCH_CANCELED: &str = "batch.canceled";
    pub const BATCH_PROCESSED: &str = "batch.processed";
    pub const BATCH_PROCESSED_WITH_FAILURES: &str = "batch.processed_with_failures";

    pub const UNIT_STARTED: &str = "unit.started";
    pub const UNIT_PROCESSED: &str = "unit.processed";
    pub const UNIT_FAILED: &str = "unit.failed";
    pub const UNIT_DROPPED: &str = "unit.dropped";
}

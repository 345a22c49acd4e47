// Lifecycle event system
//
// Broadcast-based publisher for batch/unit lifecycle events. Consumers
// subscribe for observability (audit, notifications); the coordination logic
// never depends on anyone listening.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};

//! # Message Channel Contract
//!
//! At-least-once, point-to-point delivery of dispatch messages. Consumers
//! acknowledge a delivery only after fully handling it; an implementation may
//! redeliver anything unacknowledged (consumer crash, visibility timeout).
//! Redelivery is safe because every handling step is guarded by
//! compare-and-swap state transitions.

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::MessagingError;
use super::message::DispatchMessage;

/// Opaque handle identifying one delivery for acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageReceipt {
    pub delivery_id: Uuid,
}

/// One delivered message plus the receipt needed to acknowledge it
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: DispatchMessage,
    pub receipt: MessageReceipt,
}

/// Point-to-point dispatch channel between coordinator and worker pool
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publish a dispatch message to the queue
    async fn publish(&self, message: DispatchMessage) -> Result<(), MessagingError>;

    /// Block until the next message is available.
    ///
    /// Each delivery goes to exactly one consumer. Returns
    /// [`MessagingError::ChannelClosed`] once the queue is closed and drained.
    async fn consume(&self) -> Result<Delivery, MessagingError>;

    /// Acknowledge a delivery as fully handled.
    ///
    /// An unacknowledged delivery is eligible for redelivery.
    async fn ack(&self, receipt: MessageReceipt) -> Result<(), MessagingError>;
}

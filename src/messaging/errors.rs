//! # Messaging Error Types
//!
//! Structured error handling for the messaging seam using thiserror.

use thiserror::Error;

/// Messaging error types
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Channel closed: {queue_name}")]
    ChannelClosed { queue_name: String },

    #[error("Unknown delivery receipt: {receipt_id}")]
    UnknownReceipt { receipt_id: uuid::Uuid },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a channel closed error
    pub fn channel_closed(queue_name: impl Into<String>) -> Self {
        Self::ChannelClosed {
            queue_name: queue_name.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::MessageSerialization {
            message: err.to_string(),
        }
    }
}

//! In-memory [`MessageChannel`] implementation.
//!
//! An unbounded in-process queue with explicit acknowledgement. Consumed but
//! unacknowledged deliveries sit in an in-flight map; `redeliver_unacked`
//! pushes them back onto the queue, which is how tests exercise the
//! at-least-once crash path.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::constants::DISPATCH_QUEUE;

use super::channel::{Delivery, MessageChannel, MessageReceipt};
use super::errors::MessagingError;
use super::message::DispatchMessage;

/// In-memory dispatch queue with at-least-once semantics.
pub struct InMemoryChannel {
    sender: UnboundedSender<DispatchMessage>,
    receiver: Mutex<UnboundedReceiver<DispatchMessage>>,
    in_flight: DashMap<Uuid, DispatchMessage>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            in_flight: DashMap::new(),
        }
    }

    /// Number of consumed-but-unacknowledged deliveries.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Push every unacknowledged delivery back onto the queue.
    ///
    /// Simulates a consumer crash or visibility timeout; the affected
    /// messages will be delivered again, possibly to a different worker.
    pub fn redeliver_unacked(&self) -> Result<usize, MessagingError> {
        let delivery_ids: Vec<Uuid> = self.in_flight.iter().map(|entry| *entry.key()).collect();
        let mut redelivered = 0;
        for delivery_id in delivery_ids {
            if let Some((_, message)) = self.in_flight.remove(&delivery_id) {
                self.sender
                    .send(message)
                    .map_err(|_| MessagingError::channel_closed(DISPATCH_QUEUE))?;
                redelivered += 1;
            }
        }
        Ok(redelivered)
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, message: DispatchMessage) -> Result<(), MessagingError> {
        self.sender
            .send(message)
            .map_err(|_| MessagingError::channel_closed(DISPATCH_QUEUE))
    }

    async fn consume(&self) -> Result<Delivery, MessagingError> {
        // One consumer at a time holds the receiver; each message is handed
        // to exactly one worker
        let mut receiver = self.receiver.lock().await;
        let message = receiver
            .recv()
            .await
            .ok_or_else(|| MessagingError::channel_closed(DISPATCH_QUEUE))?;
        drop(receiver);

        let receipt = MessageReceipt {
            delivery_id: Uuid::new_v4(),
        };
        self.in_flight.insert(receipt.delivery_id, message.clone());
        Ok(Delivery { message, receipt })
    }

    async fn ack(&self, receipt: MessageReceipt) -> Result<(), MessagingError> {
        self.in_flight
            .remove(&receipt.delivery_id)
            .map(|_| ())
            .ok_or(MessagingError::UnknownReceipt {
                receipt_id: receipt.delivery_id,
            })
    }
}

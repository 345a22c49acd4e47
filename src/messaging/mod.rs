// Messaging module for worker dispatch
//
// Point-to-point, at-least-once delivery of dispatch messages from the
// coordinator to the worker pool, behind the `MessageChannel` trait.

pub mod channel;
pub mod errors;
pub mod memory;
pub mod message;

pub use channel::{Delivery, MessageChannel, MessageReceipt};
pub use errors::MessagingError;
pub use memory::InMemoryChannel;
pub use message::{DispatchMessage, DispatchMessageMetadata};

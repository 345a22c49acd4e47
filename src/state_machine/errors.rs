//! Structured error types for state machine transitions and guards.

use thiserror::Error;

/// Errors raised while resolving or applying a state transition
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Invalid transition from {from:?} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Transition conflict: {entity} {id} changed concurrently (expected state {expected})")]
    Conflict {
        entity: &'static str,
        id: uuid::Uuid,
        expected: String,
    },

    #[error("Guard check failed: {0}")]
    Guard(#[from] GuardError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal state machine error: {0}")]
    Internal(String),
}

/// Errors raised by transition guard checks
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Business rule violation: {message}")]
    BusinessRuleViolation { message: String },

    #[error("Store error during guard check: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Create a business rule violation guard error
pub fn business_rule_violation(message: impl Into<String>) -> GuardError {
    GuardError::BusinessRuleViolation {
        message: message.into(),
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    StoreError(String),
    MessagingError(String),
    StateTransitionError(String),
    OrchestrationError(String),
    EventError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::StoreError(msg) => write!(f, "Store error: {msg}"),
            IngestError::MessagingError(msg) => write!(f, "Messaging error: {msg}"),
            IngestError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            IngestError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            IngestError::EventError(msg) => write!(f, "Event error: {msg}"),
            IngestError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            IngestError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

pub type Result<T> = std::result::Result<T, IngestError>;

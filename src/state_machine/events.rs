use serde::{Deserialize, Serialize};

/// Events that can trigger batch state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    /// Pause dispatch of remaining units
    Suspend,
    /// Re-enable dispatch after a suspension
    Resume,
    /// Cancel the batch, with an optional audit reason
    Cancel(Option<String>),
    /// Finalize with every unit processed successfully
    Complete,
    /// Finalize with at least one failed unit
    CompleteWithFailures,
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Cancel(_) => "cancel",
            Self::Complete => "complete",
            Self::CompleteWithFailures => "complete_with_failures",
        }
    }

    /// Extract the audit reason if this is a cancellation event
    pub fn cancellation_reason(&self) -> Option<&str> {
        match self {
            Self::Cancel(reason) => reason.as_deref(),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancel(_) | Self::Complete | Self::CompleteWithFailures
        )
    }

    /// Create a cancellation event with the given audit reason
    pub fn cancel_with_reason(reason: impl Into<String>) -> Self {
        Self::Cancel(Some(reason.into()))
    }
}

/// Events that can trigger unit state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UnitEvent {
    /// A worker claimed the unit and is about to run the pipeline
    Start,
    /// The pipeline finished successfully
    Complete,
    /// The pipeline reported failure or raised an error
    Fail(String),
}

impl UnitEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Fail(_))
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

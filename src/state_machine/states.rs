use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Initial state; workers are dispatching and processing units
    Processing,
    /// Operator paused the batch; no new units are started
    Suspended,
    /// Terminal: canceled by an operator or by the failure-threshold rule
    Canceled,
    /// Terminal: every unit processed successfully
    Processed,
    /// Terminal: every unit terminal, at least one failed
    ProcessedWithFailures,
}

impl BatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Processed | Self::ProcessedWithFailures
        )
    }

    /// Check if workers may start units of a batch in this state
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Suspended => write!(f, "suspended"),
            Self::Canceled => write!(f, "canceled"),
            Self::Processed => write!(f, "processed"),
            Self::ProcessedWithFailures => write!(f, "processed_with_failures"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "suspended" => Ok(Self::Suspended),
            "canceled" => Ok(Self::Canceled),
            "processed" => Ok(Self::Processed),
            "processed_with_failures" => Ok(Self::ProcessedWithFailures),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}

/// Unit (SIP package) lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Initial state; dispatched but not yet picked up
    New,
    /// A worker is running the pipeline for this unit
    Processing,
    /// Terminal: pipeline succeeded
    Processed,
    /// Terminal: pipeline reported failure or raised an error
    Failed,
}

impl UnitState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    /// Check if this is an active state (a worker owns the unit)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for UnitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid unit state: {s}")),
        }
    }
}

/// Default state for new batches
impl Default for BatchState {
    fn default() -> Self {
        Self::Processing
    }
}

/// Default state for new units
impl Default for UnitState {
    fn default() -> Self {
        Self::New
    }
}

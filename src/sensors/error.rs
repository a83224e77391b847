//! Sensor acquisition error types

use std::fmt;
use thiserror::Error;

/// Sensor a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Location,
    Orientation,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Location => write!(f, "location"),
            SensorKind::Orientation => write!(f, "orientation"),
        }
    }
}

/// Failures surfaced by location and orientation streams
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The user or platform refused access
    #[error("Permission denied for {sensor} sensor")]
    PermissionDenied { sensor: SensorKind },
    /// The API does not exist on this platform
    #[error("The {sensor} sensor is not supported on this platform")]
    Unsupported { sensor: SensorKind },
    /// Access was granted but no data can be obtained
    #[error("The {sensor} sensor is unavailable: {details}")]
    Unavailable { sensor: SensorKind, details: String },
    /// No sample arrived within the configured window
    #[error("No {sensor} sample within {timeout_ms}ms")]
    Timeout { sensor: SensorKind, timeout_ms: u64 },
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// What a collaborator can reasonably do about a failure.
///
/// The streams never act on this themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Ask the user to grant access, then call `start()` again
    PromptUser,
    /// Calling `start()` again may succeed
    RestartStream,
    /// Nothing will change on this device
    Abandon,
}

impl SensorError {
    pub fn sensor(&self) -> SensorKind {
        match self {
            SensorError::PermissionDenied { sensor }
            | SensorError::Unsupported { sensor }
            | SensorError::Unavailable { sensor, .. }
            | SensorError::Timeout { sensor, .. } => *sensor,
        }
    }

    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            SensorError::PermissionDenied { .. } => RecoveryHint::PromptUser,
            SensorError::Unsupported { .. } => RecoveryHint::Abandon,
            SensorError::Unavailable { .. } | SensorError::Timeout { .. } => {
                RecoveryHint::RestartStream
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_hint(), RecoveryHint::Abandon)
    }
}

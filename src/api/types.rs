//! Placement snapshots, engine events and API-level errors

use crate::algorithms::GeofenceStatus;
use crate::core::{GeometryError, HeadingReference, LocalOffset};
use crate::sensors::SensorError;
use crate::utils::config::ConfigError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the tracking API
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Which way to turn the device to face the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnHint {
    Aligned,
    TurnLeft,
    TurnRight,
}

impl TurnHint {
    /// `Aligned` strictly inside the tolerance band, otherwise by sign
    pub fn from_relative_bearing(relative_bearing_deg: f64, tolerance_deg: f64) -> Self {
        if relative_bearing_deg.abs() < tolerance_deg {
            TurnHint::Aligned
        } else if relative_bearing_deg > 0.0 {
            TurnHint::TurnRight
        } else {
            TurnHint::TurnLeft
        }
    }
}

/// Immutable snapshot of where the target is relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Target position relative to the user, east/north meters
    pub offset: LocalOffset,
    pub distance_m: f64,
    /// `distance_m <= visibility_radius_m`
    pub is_visible: bool,
    /// Great-circle bearing from user to target, [0, 360)
    pub bearing_to_target_deg: f64,
    /// Bearing minus heading, wrapped to (-180, 180]; positive means turn right
    pub relative_bearing_deg: f64,
    /// Frame of the heading the relative bearing was computed against
    pub heading_reference: HeadingReference,
    pub turn_hint: TurnHint,
    /// Present only when a geofence is configured
    pub geofence: Option<GeofenceStatus>,
    pub location_timestamp_ms: u64,
    pub orientation_timestamp_ms: u64,
    /// Increments with every emitted placement
    pub sequence: u64,
}

/// Transitions observed by the placement engine
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    GeofenceEntered,
    GeofenceExited,
    VisibilityChanged { visible: bool },
    SensorFailed { error: SensorError },
}

/// Whether the engine has both inputs yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// At least one of the two streams has not produced a sample
    ColdStart,
    Tracking,
}

/// Logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging
    None,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    /// Everything, including per-sample traces
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorKind;

    #[test]
    fn test_turn_hint_bands() {
        assert_eq!(TurnHint::from_relative_bearing(0.0, 10.0), TurnHint::Aligned);
        assert_eq!(TurnHint::from_relative_bearing(-9.9, 10.0), TurnHint::Aligned);
        assert_eq!(TurnHint::from_relative_bearing(10.0, 10.0), TurnHint::TurnRight);
        assert_eq!(TurnHint::from_relative_bearing(-20.0, 10.0), TurnHint::TurnLeft);
        assert_eq!(TurnHint::from_relative_bearing(180.0, 10.0), TurnHint::TurnRight);
    }

    #[test]
    fn test_api_error_wraps_sources() {
        let error: ApiError = SensorError::PermissionDenied {
            sensor: SensorKind::Location,
        }
        .into();
        assert_eq!(error.to_string(), "Permission denied for location sensor");

        let error: ApiError = GeometryError::InvalidConfiguration {
            parameter: "geofence".to_string(),
            reason: "needs at least 3 vertices, got 2".to_string(),
        }
        .into();
        assert!(matches!(error, ApiError::Geometry(_)));
    }

    #[test]
    fn test_log_level_serde() {
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(serde_json::to_string(&LogLevel::None).unwrap(), "\"none\"");
        assert_eq!(LogLevel::default().as_filter(), "info");
    }
}

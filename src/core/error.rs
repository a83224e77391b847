//! Geometry validation errors

use thiserror::Error;

/// Raised synchronously when a geometric value object is constructed with
/// invalid input, so that nothing invalid ever reaches the placement engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Latitude or longitude outside the WGS84 ranges, or not finite
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// Structurally invalid geofence or target
    #[error("Invalid configuration: {parameter} {reason}")]
    InvalidConfiguration { parameter: String, reason: String },
}

/// Result type for geometry construction
pub type GeometryResult<T> = Result<T, GeometryError>;

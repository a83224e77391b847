//! Geospatial tracking and placement engine
//!
//! Fuses noisy position fixes and compass/tilt readings into a decision of
//! where a geo-anchored target sits relative to the user, and whether it
//! should be shown.

pub mod algorithms;
pub mod api;
pub mod core;
pub mod logging;
pub mod processing;
pub mod sensors;
pub mod streams;
pub mod utils;

// Re-export commonly used types
pub use algorithms::{Geofence, GeofenceEngine, GeofenceStatus};
pub use api::{
    ApiError, ApiResult, EngineState, LogLevel, Placement, PlacementEngine, TrackingEvent,
    TurnHint,
};
pub use crate::core::{
    CardinalDirection, GeoPoint, GeometryError, HeadingReference, LocalOffset, LocationSample,
    OrientationSample, ScreenOrientation, TargetLocation, TiltHint,
};
pub use sensors::{
    LocationSource, OrientationSource, PermissionModel, RecoveryHint, SensorError, SensorKind,
};
pub use streams::{
    LocationOptions, LocationStream, OrientationOptions, OrientationStream, SubscriptionId,
};
pub use utils::{ConfigError, ConfigurationManager, SessionConfig};

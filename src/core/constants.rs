//! Physical constants and tracking defaults

/// Mean Earth radius used by every spherical formula (m)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Visibility radius used when a session does not configure one (m)
pub const DEFAULT_VISIBILITY_RADIUS_M: f64 = 20.0;

/// Largest visibility radius accepted by configuration (m)
pub const MAX_VISIBILITY_RADIUS_M: f64 = 1000.0;

/// Range beyond which the equirectangular local offset is no longer trusted (m)
pub const LOCAL_OFFSET_VALID_RANGE_M: f64 = 1000.0;

/// Default window for the first location fix (ms)
pub const DEFAULT_LOCATION_TIMEOUT_MS: u64 = 10_000;

/// Relative bearing under which the target counts as straight ahead (degrees)
pub const DEFAULT_ALIGNMENT_TOLERANCE_DEG: f64 = 10.0;

/// Tilt under which the device counts as level (degrees)
pub const DEFAULT_LEVEL_TOLERANCE_DEG: f64 = 3.0;

/// Vertex count for circular geofences
pub const DEFAULT_CIRCLE_SEGMENTS: usize = 32;

/// Orientation gap after which heading smoothing restarts (ms)
pub const HEADING_FILTER_MAX_GAP_MS: u64 = 2000;

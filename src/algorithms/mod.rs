//! Geometry algorithms for placement decisions

pub mod geomath;
pub mod geofence;

pub use geofence::{Geofence, GeofenceEngine, GeofenceStatus};

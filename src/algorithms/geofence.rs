//! Geofence polygons and membership queries

use crate::algorithms::geomath::{haversine_distance, offset_to_point, point_in_polygon};
use crate::core::{GeoPoint, GeometryError, GeometryResult, LocalOffset};
use serde::{Deserialize, Serialize};

/// Closed polygon of geodetic vertices; the last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    vertices: Vec<GeoPoint>,
}

impl Geofence {
    /// Build a geofence from at least three valid vertices
    pub fn new(vertices: Vec<GeoPoint>) -> GeometryResult<Self> {
        if vertices.len() < 3 {
            return Err(GeometryError::InvalidConfiguration {
                parameter: "geofence".to_string(),
                reason: format!("needs at least 3 vertices, got {}", vertices.len()),
            });
        }
        if let Some(bad) = vertices.iter().find(|v| !v.is_valid()) {
            return Err(GeometryError::InvalidCoordinate {
                latitude: bad.latitude,
                longitude: bad.longitude,
            });
        }
        Ok(Self { vertices })
    }

    /// Regular polygon approximating a circle of `radius_m` around `center`
    pub fn circle(center: GeoPoint, radius_m: f64, segments: usize) -> GeometryResult<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(GeometryError::InvalidConfiguration {
                parameter: "radius_m".to_string(),
                reason: format!("must be positive, got {}", radius_m),
            });
        }
        if segments < 3 {
            return Err(GeometryError::InvalidConfiguration {
                parameter: "segments".to_string(),
                reason: format!("needs at least 3 segments, got {}", segments),
            });
        }

        let vertices = (0..segments)
            .map(|i| {
                let angle = i as f64 / segments as f64 * std::f64::consts::TAU;
                let offset = LocalOffset::new(radius_m * angle.cos(), radius_m * angle.sin());
                offset_to_point(&center, &offset)
            })
            .collect();

        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }
}

/// Result of a combined membership query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceStatus {
    pub inside: bool,
    /// 0 when inside, otherwise the distance to the nearest vertex
    pub meters_from_boundary: f64,
}

/// Membership and proximity queries over a [`Geofence`]
pub struct GeofenceEngine;

impl GeofenceEngine {
    /// Even-odd containment; boundary points are ambiguous (see [`point_in_polygon`])
    pub fn is_inside(point: &GeoPoint, geofence: &Geofence) -> bool {
        point_in_polygon(point, geofence.vertices())
    }

    /// Minimum haversine distance from `point` to any vertex.
    ///
    /// This is not the distance to the nearest edge: along a long edge the
    /// true boundary can be much closer than either of its endpoints.
    pub fn distance_to_nearest_vertex(point: &GeoPoint, geofence: &Geofence) -> f64 {
        geofence
            .vertices()
            .iter()
            .map(|v| haversine_distance(point, v))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn evaluate(point: &GeoPoint, geofence: &Geofence) -> GeofenceStatus {
        if Self::is_inside(point, geofence) {
            GeofenceStatus {
                inside: true,
                meters_from_boundary: 0.0,
            }
        } else {
            GeofenceStatus {
                inside: false,
                meters_from_boundary: Self::distance_to_nearest_vertex(point, geofence),
            }
        }
    }
}

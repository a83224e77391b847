//! Core data types for geospatial tracking

use crate::algorithms::geomath::normalize_degrees;
use crate::core::error::{GeometryError, GeometryResult};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Geodetic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting values outside [-90, 90] x [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> GeometryResult<Self> {
        let point = Self { latitude, longitude };
        if point.is_valid() {
            Ok(point)
        } else {
            Err(GeometryError::InvalidCoordinate { latitude, longitude })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Accepted position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    pub point: GeoPoint,
    /// Horizontal accuracy radius (meters)
    pub accuracy_m: f64,
    /// Platform timestamp (milliseconds since epoch)
    pub timestamp_ms: u64,
    pub altitude_m: Option<f64>,
    pub speed_mps: Option<f64>,
    /// Direction of travel reported by the receiver, degrees from true north
    pub course_deg: Option<f64>,
}

impl LocationSample {
    pub fn new(point: GeoPoint, accuracy_m: f64, timestamp_ms: u64) -> Self {
        Self {
            point,
            accuracy_m,
            timestamp_ms,
            altitude_m: None,
            speed_mps: None,
            course_deg: None,
        }
    }
}

/// Which frame a heading value is referenced to.
///
/// Only `TrueNorth` headings may be compared against geographic bearings.
/// `DeviceFrame` headings come from the orientation alpha angle, whose zero
/// is wherever the device happened to point when the sensor started on
/// platforms without a compass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadingReference {
    TrueNorth,
    DeviceFrame,
}

impl HeadingReference {
    pub fn is_true_north(&self) -> bool {
        matches!(self, HeadingReference::TrueNorth)
    }
}

/// Screen rotation relative to the device's natural portrait orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenOrientation {
    #[default]
    Portrait,
    /// Rotated 90 degrees
    LandscapeRight,
    /// Rotated 180 degrees
    PortraitUpsideDown,
    /// Rotated 270 degrees (also reported as -90)
    LandscapeLeft,
}

impl ScreenOrientation {
    /// Map a screen-orientation angle to a rotation; only multiples of 90 are recognised
    pub fn from_angle(angle_deg: i32) -> Option<Self> {
        match angle_deg.rem_euclid(360) {
            0 => Some(ScreenOrientation::Portrait),
            90 => Some(ScreenOrientation::LandscapeRight),
            180 => Some(ScreenOrientation::PortraitUpsideDown),
            270 => Some(ScreenOrientation::LandscapeLeft),
            _ => None,
        }
    }

    pub fn angle_deg(&self) -> i32 {
        match self {
            ScreenOrientation::Portrait => 0,
            ScreenOrientation::LandscapeRight => 90,
            ScreenOrientation::PortraitUpsideDown => 180,
            ScreenOrientation::LandscapeLeft => 270,
        }
    }

    /// Fixed rotation mapping device (beta, gamma) onto screen-stable
    /// (front-back, left-right) tilt axes
    pub fn tilt_rotation(&self) -> Matrix2<f64> {
        match self {
            ScreenOrientation::Portrait => Matrix2::identity(),
            ScreenOrientation::LandscapeRight => Matrix2::new(0.0, -1.0, 1.0, 0.0),
            ScreenOrientation::PortraitUpsideDown => -Matrix2::identity(),
            ScreenOrientation::LandscapeLeft => Matrix2::new(0.0, 1.0, -1.0, 0.0),
        }
    }

    /// Remap raw device tilt into the screen-stable axes
    pub fn normalize_tilt(&self, beta_deg: f64, gamma_deg: f64) -> (f64, f64) {
        let tilt = self.tilt_rotation() * Vector2::new(beta_deg, gamma_deg);
        (tilt.x, tilt.y)
    }
}

/// Eight-point compass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardinalDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CardinalDirection {
    const ALL: [CardinalDirection; 8] = [
        CardinalDirection::N,
        CardinalDirection::NE,
        CardinalDirection::E,
        CardinalDirection::SE,
        CardinalDirection::S,
        CardinalDirection::SW,
        CardinalDirection::W,
        CardinalDirection::NW,
    ];

    /// Sector lookup with 45 degree sectors centred on each direction
    pub fn from_heading(heading_deg: f64) -> Self {
        let index = (normalize_degrees(heading_deg) / 45.0).round() as usize % 8;
        Self::ALL[index]
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CardinalDirection::N => "N",
            CardinalDirection::NE => "NE",
            CardinalDirection::E => "E",
            CardinalDirection::SE => "SE",
            CardinalDirection::S => "S",
            CardinalDirection::SW => "SW",
            CardinalDirection::W => "W",
            CardinalDirection::NW => "NW",
        }
    }
}

/// Guidance for bringing the device level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiltHint {
    Level,
    TiltUp,
    TiltDown,
}

/// Accepted orientation reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Heading in [0, 360), 0 = north, clockwise
    pub heading_deg: f64,
    /// Front-back tilt after screen normalisation
    pub beta_deg: f64,
    /// Left-right tilt after screen normalisation
    pub gamma_deg: f64,
    pub reference: HeadingReference,
    pub screen: ScreenOrientation,
    pub timestamp_ms: u64,
}

impl OrientationSample {
    pub fn cardinal(&self) -> CardinalDirection {
        CardinalDirection::from_heading(self.heading_deg)
    }

    /// Positive front-back tilt means the camera points below the horizon
    pub fn tilt_hint(&self, tolerance_deg: f64) -> TiltHint {
        if self.beta_deg.abs() <= tolerance_deg {
            TiltHint::Level
        } else if self.beta_deg > 0.0 {
            TiltHint::TiltDown
        } else {
            TiltHint::TiltUp
        }
    }
}

/// Planar displacement in meters: `x` east-positive, `z` north-positive
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalOffset {
    pub x: f64,
    pub z: f64,
}

impl LocalOffset {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Euclidean norm of the offset
    pub fn distance(&self) -> f64 {
        Vector2::new(self.x, self.z).norm()
    }

    /// Offset for a renderer whose forward axis is -z: north maps to -z
    pub fn to_camera_frame(&self) -> (f64, f64) {
        (self.x, -self.z)
    }
}

/// Point of interest and the radius inside which it is shown.
///
/// Only [`TargetLocation::new`] builds one, so every target has a valid
/// point and a positive radius:
///
/// ```compile_fail
/// use geoanchor::{GeoPoint, TargetLocation};
///
/// let point = GeoPoint { latitude: 41.0, longitude: 2.0 };
/// let target = TargetLocation { point, visibility_radius_m: -5.0 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLocation {
    point: GeoPoint,
    visibility_radius_m: f64,
}

impl TargetLocation {
    pub fn new(point: GeoPoint, visibility_radius_m: f64) -> GeometryResult<Self> {
        if !point.is_valid() {
            return Err(GeometryError::InvalidCoordinate {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
        if !visibility_radius_m.is_finite() || visibility_radius_m <= 0.0 {
            return Err(GeometryError::InvalidConfiguration {
                parameter: "visibility_radius_m".to_string(),
                reason: format!("must be positive, got {}", visibility_radius_m),
            });
        }
        Ok(Self {
            point,
            visibility_radius_m,
        })
    }

    pub fn point(&self) -> &GeoPoint {
        &self.point
    }

    pub fn visibility_radius_m(&self) -> f64 {
        self.visibility_radius_m
    }
}

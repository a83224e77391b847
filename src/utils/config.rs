use crate::algorithms::Geofence;
use crate::api::types::LogLevel;
use crate::core::{
    GeoPoint, GeometryError, TargetLocation, DEFAULT_ALIGNMENT_TOLERANCE_DEG,
    DEFAULT_CIRCLE_SEGMENTS, DEFAULT_VISIBILITY_RADIUS_M, MAX_VISIBILITY_RADIUS_M,
};
use crate::streams::{LocationOptions, OrientationOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Point of interest for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Distance under which the target is shown (meters)
    #[serde(default = "default_visibility_radius")]
    pub visibility_radius_m: f64,
}

/// Optional region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeofenceConfig {
    Polygon {
        vertices: Vec<GeoPoint>,
    },
    Circle {
        center: GeoPoint,
        radius_m: f64,
        #[serde(default = "default_circle_segments")]
        segments: usize,
    },
}

/// Everything consumed at session start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub geofence: Option<GeofenceConfig>,
    #[serde(default)]
    pub location: LocationOptions,
    #[serde(default)]
    pub orientation: OrientationOptions,
    /// Relative bearing under which the user counts as facing the target
    #[serde(default = "default_alignment_tolerance")]
    pub alignment_tolerance_deg: f64,
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("Configuration I/O error: {message}")]
    Io { message: String },
    #[error("Configuration format error: {message}")]
    Serialization { message: String },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_visibility_radius() -> f64 {
    DEFAULT_VISIBILITY_RADIUS_M
}

fn default_circle_segments() -> usize {
    DEFAULT_CIRCLE_SEGMENTS
}

fn default_alignment_tolerance() -> f64 {
    DEFAULT_ALIGNMENT_TOLERANCE_DEG
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_visibility_radius(radius_m: f64) -> ConfigResult<()> {
    if !radius_m.is_finite() || radius_m <= 0.0 || radius_m > MAX_VISIBILITY_RADIUS_M {
        return Err(invalid(
            "visibility_radius_m",
            radius_m,
            "must be greater than 0 and at most 1000 m",
        ));
    }
    Ok(())
}

fn check_location_timeout(timeout_ms: u64) -> ConfigResult<()> {
    if timeout_ms == 0 {
        return Err(invalid("location.timeout_ms", timeout_ms, "must be greater than 0"));
    }
    Ok(())
}

fn check_alignment_tolerance(tolerance_deg: f64) -> ConfigResult<()> {
    if !tolerance_deg.is_finite() || tolerance_deg <= 0.0 || tolerance_deg > 180.0 {
        return Err(invalid(
            "alignment_tolerance_deg",
            tolerance_deg,
            "must be in (0, 180] degrees",
        ));
    }
    Ok(())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig {
                latitude: 0.0,
                longitude: 0.0,
                visibility_radius_m: DEFAULT_VISIBILITY_RADIUS_M,
            },
            geofence: None,
            location: LocationOptions::default(),
            orientation: OrientationOptions::default(),
            alignment_tolerance_deg: DEFAULT_ALIGNMENT_TOLERANCE_DEG,
            log_level: LogLevel::default(),
        }
    }
}

impl SessionConfig {
    /// Check every field; returns the first problem found
    pub fn validate(&self) -> ConfigResult<()> {
        GeoPoint::new(self.target.latitude, self.target.longitude)?;
        check_visibility_radius(self.target.visibility_radius_m)?;
        check_location_timeout(self.location.timeout_ms)?;
        check_alignment_tolerance(self.alignment_tolerance_deg)?;

        if let Some(smoothing) = self.orientation.smoothing {
            if !(smoothing > 0.0 && smoothing <= 1.0) {
                return Err(invalid("orientation.smoothing", smoothing, "must be in (0, 1]"));
            }
        }

        match &self.geofence {
            None => {}
            Some(GeofenceConfig::Polygon { vertices }) => {
                if vertices.len() < 3 {
                    return Err(invalid("geofence.vertices", vertices.len(), "needs at least 3 vertices"));
                }
                for vertex in vertices {
                    GeoPoint::new(vertex.latitude, vertex.longitude)?;
                }
            }
            Some(GeofenceConfig::Circle {
                center,
                radius_m,
                segments,
            }) => {
                GeoPoint::new(center.latitude, center.longitude)?;
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(invalid("geofence.radius_m", radius_m, "must be greater than 0"));
                }
                if *segments < 3 {
                    return Err(invalid("geofence.segments", segments, "needs at least 3 segments"));
                }
            }
        }

        Ok(())
    }

    pub fn build_target(&self) -> ConfigResult<TargetLocation> {
        let point = GeoPoint::new(self.target.latitude, self.target.longitude)?;
        Ok(TargetLocation::new(point, self.target.visibility_radius_m)?)
    }

    pub fn build_geofence(&self) -> ConfigResult<Option<Geofence>> {
        let geofence = match &self.geofence {
            None => None,
            Some(GeofenceConfig::Polygon { vertices }) => Some(Geofence::new(vertices.clone())?),
            Some(GeofenceConfig::Circle {
                center,
                radius_m,
                segments,
            }) => Some(Geofence::circle(*center, *radius_m, *segments)?),
        };
        Ok(geofence)
    }
}

/// Loads, validates, adjusts and saves a [`SessionConfig`]
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: SessionConfig,
    /// Configuration file path
    config_file_path: Option<String>,
    is_modified: bool,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the whole configuration after validating it
    pub fn update_config(&mut self, config: SessionConfig) -> ConfigResult<()> {
        config.validate()?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: SessionConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        config.validate()?;

        info!(path = %path_str, "session configuration loaded");
        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content =
            serde_json::to_string_pretty(&self.config).map_err(|e| ConfigError::Serialization {
                message: format!("Failed to serialize config: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        debug!(path = %path_str, "session configuration saved");
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the currently loaded file path
    pub fn save(&mut self) -> ConfigResult<()> {
        if let Some(path) = self.config_file_path.clone() {
            self.save_to_file(path)
        } else {
            Err(ConfigError::Io {
                message: "No file path set for saving configuration".to_string(),
            })
        }
    }

    /// Check if configuration has been modified since last save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Returns the previous radius
    pub fn set_visibility_radius(&mut self, radius_m: f64) -> ConfigResult<f64> {
        check_visibility_radius(radius_m)?;
        let old_value = self.config.target.visibility_radius_m;
        self.config.target.visibility_radius_m = radius_m;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Returns the previous timeout
    pub fn set_location_timeout(&mut self, timeout_ms: u64) -> ConfigResult<u64> {
        check_location_timeout(timeout_ms)?;
        let old_value = self.config.location.timeout_ms;
        self.config.location.timeout_ms = timeout_ms;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Returns the previous tolerance
    pub fn set_alignment_tolerance(&mut self, tolerance_deg: f64) -> ConfigResult<f64> {
        check_alignment_tolerance(tolerance_deg)?;
        let old_value = self.config.alignment_tolerance_deg;
        self.config.alignment_tolerance_deg = tolerance_deg;
        self.is_modified = true;
        Ok(old_value)
    }

    pub fn build_target(&self) -> ConfigResult<TargetLocation> {
        self.config.build_target()
    }

    pub fn build_geofence(&self) -> ConfigResult<Option<Geofence>> {
        self.config.build_geofence()
    }
}

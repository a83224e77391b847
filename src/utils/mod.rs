//! Session configuration

pub mod config;

pub use config::{ConfigError, ConfigResult, ConfigurationManager, GeofenceConfig, SessionConfig, TargetConfig};

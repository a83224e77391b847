//! Core types and constants for geospatial tracking

pub mod types;
pub mod constants;
pub mod error;

pub use types::*;
pub use constants::*;
pub use error::{GeometryError, GeometryResult};

//! Tracking API
//!
//! The [`PlacementEngine`] consumes location and orientation streams and
//! publishes [`Placement`] snapshots and [`TrackingEvent`]s to renderers.

pub mod engine;
pub mod types;

pub use engine::{compute_placement, Attachment, PlacementEngine};
pub use types::{ApiError, ApiResult, EngineState, LogLevel, Placement, TrackingEvent, TurnHint};

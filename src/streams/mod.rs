//! Location and orientation streams

pub mod location;
pub mod orientation;
pub mod registry;

pub use location::{LocationFeed, LocationOptions, LocationStream};
pub use orientation::{OrientationFeed, OrientationOptions, OrientationStream};
pub use registry::{HandlerRegistry, SubscriptionId};

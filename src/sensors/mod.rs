//! Sensor sources and their failure modes
//!
//! Platform providers plug in behind [`LocationSource`] and
//! [`OrientationSource`]; the mocks drive tests and the simulator.

pub mod clock;
pub mod error;
pub mod mock;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RecoveryHint, SensorError, SensorKind, SensorResult};
pub use mock::{
    MockFixBehavior, MockLocationHandle, MockLocationSource, MockOrientationHandle,
    MockOrientationSource,
};
pub use source::{
    authorize, FixResponder, LocationSource, OrientationSource, PermissionModel,
    PermissionStatus, RawFix, RawOrientation,
};

//! Platform abstraction for position and orientation providers

use crate::sensors::{SensorError, SensorKind, SensorResult};
use crate::streams::location::{LocationFeed, LocationOptions};
use crate::streams::orientation::OrientationFeed;
use tokio::sync::oneshot;
use tracing::debug;

/// How a platform gates access to a sensor, resolved once per stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionModel {
    /// An explicit grant must be requested before listening (e.g. iOS motion sensors)
    RequiresExplicitGrant,
    /// Listening is allowed without a prompt
    AutoGranted,
    /// The sensor API is absent
    Unsupported,
}

/// Outcome of an explicit permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Apply a permission model before a sensor is used
pub fn authorize<F>(sensor: SensorKind, model: PermissionModel, request: F) -> SensorResult<()>
where
    F: FnOnce() -> PermissionStatus,
{
    match model {
        PermissionModel::Unsupported => Err(SensorError::Unsupported { sensor }),
        PermissionModel::AutoGranted => Ok(()),
        PermissionModel::RequiresExplicitGrant => match request() {
            PermissionStatus::Granted => {
                debug!(%sensor, "permission granted");
                Ok(())
            }
            PermissionStatus::Denied => Err(SensorError::PermissionDenied { sensor }),
        },
    }
}

/// Position fix as reported by the platform, before validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub timestamp_ms: u64,
    pub altitude_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub course_deg: Option<f64>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, timestamp_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            timestamp_ms,
            altitude_m: None,
            speed_mps: None,
            course_deg: None,
        }
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn with_motion(mut self, speed_mps: f64, course_deg: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self.course_deg = Some(course_deg);
        self
    }
}

/// Orientation event as reported by the platform, before normalisation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawOrientation {
    /// Rotation about the screen normal, counter-clockwise, device frame
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    /// Clockwise true-north heading from a platform compass, when present
    pub compass_heading: Option<f64>,
    /// Platform's claim that alpha is earth-referenced
    pub absolute: Option<bool>,
    /// Current screen-orientation angle (0, 90, 180, 270 or -90)
    pub screen_angle_deg: i32,
    pub timestamp_ms: u64,
}

/// Completion handle for a one-shot fix request
pub struct FixResponder {
    tx: oneshot::Sender<SensorResult<RawFix>>,
}

impl FixResponder {
    pub(crate) fn new(tx: oneshot::Sender<SensorResult<RawFix>>) -> Self {
        Self { tx }
    }

    pub fn resolve(self, fix: RawFix) {
        // The requester may already have timed out
        let _ = self.tx.send(Ok(fix));
    }

    pub fn reject(self, error: SensorError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Continuous position provider (e.g. a browser `watchPosition` bridge or a GNSS receiver)
pub trait LocationSource: Send {
    /// Queried once when a stream is constructed
    fn permission_model(&self) -> PermissionModel;

    fn request_permission(&mut self) -> PermissionStatus;

    /// Begin delivering fixes into `feed`; must not block
    fn watch(&mut self, options: &LocationOptions, feed: LocationFeed) -> SensorResult<()>;

    /// Stop delivering fixes; called before the stream releases its state
    fn clear_watch(&mut self);

    /// Ask for a single fix; answer through `responder` from any thread
    fn request_fix(&mut self, options: &LocationOptions, responder: FixResponder);
}

/// Continuous orientation provider (e.g. a `deviceorientation` bridge)
pub trait OrientationSource: Send {
    fn permission_model(&self) -> PermissionModel;

    fn request_permission(&mut self) -> PermissionStatus;

    fn watch(&mut self, feed: OrientationFeed) -> SensorResult<()>;

    fn clear_watch(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_by_model() {
        let kind = SensorKind::Orientation;

        assert!(authorize(kind, PermissionModel::AutoGranted, || PermissionStatus::Denied).is_ok());
        assert_eq!(
            authorize(kind, PermissionModel::Unsupported, || PermissionStatus::Granted),
            Err(SensorError::Unsupported { sensor: kind })
        );
        assert!(authorize(kind, PermissionModel::RequiresExplicitGrant, || PermissionStatus::Granted).is_ok());
        assert_eq!(
            authorize(kind, PermissionModel::RequiresExplicitGrant, || PermissionStatus::Denied),
            Err(SensorError::PermissionDenied { sensor: kind })
        );
    }

    #[test]
    fn test_auto_granted_never_prompts() {
        let mut prompted = false;
        let _ = authorize(SensorKind::Location, PermissionModel::AutoGranted, || {
            prompted = true;
            PermissionStatus::Granted
        });
        assert!(!prompted);
    }

    #[test]
    fn test_raw_fix_builders() {
        let fix = RawFix::new(41.0, 2.0, 5.0, 1000)
            .with_altitude(12.0)
            .with_motion(1.4, 90.0);
        assert_eq!(fix.altitude_m, Some(12.0));
        assert_eq!(fix.speed_mps, Some(1.4));
        assert_eq!(fix.course_deg, Some(90.0));
    }
}

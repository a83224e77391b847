//! Mock sensor sources for testing and simulation
//!
//! Each mock is split into the source, which is moved into a stream, and a
//! cloneable handle the test or simulator keeps to drive it.

use crate::algorithms::geomath::offset_to_point;
use crate::core::{GeoPoint, LocalOffset};
use crate::sensors::source::{
    FixResponder, LocationSource, OrientationSource, PermissionModel, PermissionStatus, RawFix,
    RawOrientation,
};
use crate::sensors::{SensorError, SensorResult};
use crate::streams::location::{LocationFeed, LocationOptions};
use crate::streams::orientation::OrientationFeed;
use crate::streams::registry::lock;
use rand::Rng;
use std::sync::{Arc, Mutex};

/// How a mock location source answers one-shot fix requests
#[derive(Debug, Clone)]
pub enum MockFixBehavior {
    /// Answer immediately with this fix
    Respond(RawFix),
    /// Answer immediately with this error
    Fail(SensorError),
    /// Keep the request open without ever answering
    Hold,
    /// Drop the request unanswered
    Drop,
}

#[derive(Default)]
struct MockLocationState {
    feed: Option<LocationFeed>,
    options: Option<LocationOptions>,
    watch_calls: usize,
    clear_calls: usize,
    permission_requests: usize,
    drop_probability: f64,
}

/// Driver side of a [`MockLocationSource`]
#[derive(Clone, Default)]
pub struct MockLocationHandle {
    state: Arc<Mutex<MockLocationState>>,
}

impl MockLocationHandle {
    /// Deliver a fix through the active watch; false if none or rejected
    pub fn emit(&self, fix: RawFix) -> bool {
        let feed = {
            let state = lock(&self.state);
            if state.drop_probability > 0.0 && rand::thread_rng().gen::<f64>() < state.drop_probability {
                return false;
            }
            state.feed.clone()
        };
        feed.map_or(false, |feed| feed.push(fix))
    }

    /// Deliver a fix scattered uniformly within `jitter_m` of `center`
    pub fn emit_with_jitter(&self, center: GeoPoint, jitter_m: f64, accuracy_m: f64, timestamp_ms: u64) -> bool {
        let mut rng = rand::thread_rng();
        let radius = jitter_m.max(0.0) * rng.gen::<f64>().sqrt();
        let angle = rng.gen::<f64>() * std::f64::consts::TAU;
        let point = offset_to_point(&center, &LocalOffset::new(radius * angle.cos(), radius * angle.sin()));

        self.emit(RawFix::new(point.latitude, point.longitude, accuracy_m, timestamp_ms))
    }

    pub fn fail(&self, error: SensorError) -> bool {
        let feed = lock(&self.state).feed.clone();
        feed.map_or(false, |feed| feed.fail(error))
    }

    /// Randomly lose emitted fixes with the given probability (0.0 to 1.0)
    pub fn set_drop_probability(&self, probability: f64) {
        lock(&self.state).drop_probability = probability.clamp(0.0, 1.0);
    }

    pub fn feed(&self) -> Option<LocationFeed> {
        lock(&self.state).feed.clone()
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.state).feed.is_some()
    }

    pub fn last_options(&self) -> Option<LocationOptions> {
        lock(&self.state).options
    }

    pub fn watch_calls(&self) -> usize {
        lock(&self.state).watch_calls
    }

    pub fn clear_calls(&self) -> usize {
        lock(&self.state).clear_calls
    }

    pub fn permission_requests(&self) -> usize {
        lock(&self.state).permission_requests
    }
}

/// Scriptable [`LocationSource`]
pub struct MockLocationSource {
    handle: MockLocationHandle,
    permission_model: PermissionModel,
    permission_response: PermissionStatus,
    watch_error: Option<SensorError>,
    fix_behavior: MockFixBehavior,
    held: Vec<FixResponder>,
}

impl MockLocationSource {
    /// Auto-granted source that never fails and holds one-shot requests
    pub fn new() -> (Self, MockLocationHandle) {
        Self::with_permission(PermissionModel::AutoGranted, PermissionStatus::Granted)
    }

    pub fn with_permission(model: PermissionModel, response: PermissionStatus) -> (Self, MockLocationHandle) {
        let handle = MockLocationHandle::default();
        let source = Self {
            handle: handle.clone(),
            permission_model: model,
            permission_response: response,
            watch_error: None,
            fix_behavior: MockFixBehavior::Hold,
            held: Vec::new(),
        };
        (source, handle)
    }

    /// Make every `watch` call fail with `error`
    pub fn fail_watch_with(&mut self, error: SensorError) {
        self.watch_error = Some(error);
    }

    pub fn set_fix_behavior(&mut self, behavior: MockFixBehavior) {
        self.fix_behavior = behavior;
    }
}

impl LocationSource for MockLocationSource {
    fn permission_model(&self) -> PermissionModel {
        self.permission_model
    }

    fn request_permission(&mut self) -> PermissionStatus {
        lock(&self.handle.state).permission_requests += 1;
        self.permission_response
    }

    fn watch(&mut self, options: &LocationOptions, feed: LocationFeed) -> SensorResult<()> {
        let mut state = lock(&self.handle.state);
        state.watch_calls += 1;
        if let Some(error) = &self.watch_error {
            return Err(error.clone());
        }
        state.options = Some(*options);
        state.feed = Some(feed);
        Ok(())
    }

    fn clear_watch(&mut self) {
        let mut state = lock(&self.handle.state);
        state.clear_calls += 1;
        state.feed = None;
    }

    fn request_fix(&mut self, _options: &LocationOptions, responder: FixResponder) {
        match &self.fix_behavior {
            MockFixBehavior::Respond(fix) => responder.resolve(*fix),
            MockFixBehavior::Fail(error) => responder.reject(error.clone()),
            MockFixBehavior::Hold => self.held.push(responder),
            MockFixBehavior::Drop => drop(responder),
        }
    }
}

#[derive(Default)]
struct MockOrientationState {
    feed: Option<OrientationFeed>,
    watch_calls: usize,
    clear_calls: usize,
    permission_requests: usize,
}

/// Driver side of a [`MockOrientationSource`]
#[derive(Clone, Default)]
pub struct MockOrientationHandle {
    state: Arc<Mutex<MockOrientationState>>,
}

impl MockOrientationHandle {
    pub fn emit(&self, raw: RawOrientation) -> bool {
        let feed = lock(&self.state).feed.clone();
        feed.map_or(false, |feed| feed.push(raw))
    }

    /// Deliver a level, portrait event carrying a true-north compass heading
    pub fn emit_compass(&self, heading_deg: f64, timestamp_ms: u64) -> bool {
        self.emit(RawOrientation {
            compass_heading: Some(heading_deg),
            beta: Some(0.0),
            gamma: Some(0.0),
            timestamp_ms,
            ..RawOrientation::default()
        })
    }

    /// Deliver a level, portrait event carrying only a device-frame alpha
    pub fn emit_alpha(&self, alpha_deg: f64, timestamp_ms: u64) -> bool {
        self.emit(RawOrientation {
            alpha: Some(alpha_deg),
            beta: Some(0.0),
            gamma: Some(0.0),
            timestamp_ms,
            ..RawOrientation::default()
        })
    }

    pub fn fail(&self, error: SensorError) -> bool {
        let feed = lock(&self.state).feed.clone();
        feed.map_or(false, |feed| feed.fail(error))
    }

    pub fn feed(&self) -> Option<OrientationFeed> {
        lock(&self.state).feed.clone()
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.state).feed.is_some()
    }

    pub fn watch_calls(&self) -> usize {
        lock(&self.state).watch_calls
    }

    pub fn clear_calls(&self) -> usize {
        lock(&self.state).clear_calls
    }

    pub fn permission_requests(&self) -> usize {
        lock(&self.state).permission_requests
    }
}

/// Scriptable [`OrientationSource`]
pub struct MockOrientationSource {
    handle: MockOrientationHandle,
    permission_model: PermissionModel,
    permission_response: PermissionStatus,
    watch_error: Option<SensorError>,
}

impl MockOrientationSource {
    pub fn new() -> (Self, MockOrientationHandle) {
        Self::with_permission(PermissionModel::AutoGranted, PermissionStatus::Granted)
    }

    pub fn with_permission(model: PermissionModel, response: PermissionStatus) -> (Self, MockOrientationHandle) {
        let handle = MockOrientationHandle::default();
        let source = Self {
            handle: handle.clone(),
            permission_model: model,
            permission_response: response,
            watch_error: None,
        };
        (source, handle)
    }

    pub fn fail_watch_with(&mut self, error: SensorError) {
        self.watch_error = Some(error);
    }
}

impl OrientationSource for MockOrientationSource {
    fn permission_model(&self) -> PermissionModel {
        self.permission_model
    }

    fn request_permission(&mut self) -> PermissionStatus {
        lock(&self.handle.state).permission_requests += 1;
        self.permission_response
    }

    fn watch(&mut self, feed: OrientationFeed) -> SensorResult<()> {
        let mut state = lock(&self.handle.state);
        state.watch_calls += 1;
        if let Some(error) = &self.watch_error {
            return Err(error.clone());
        }
        state.feed = Some(feed);
        Ok(())
    }

    fn clear_watch(&mut self) {
        let mut state = lock(&self.handle.state);
        state.clear_calls += 1;
        state.feed = None;
    }
}

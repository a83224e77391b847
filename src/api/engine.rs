//! Placement engine
//!
//! Fuses the latest location and orientation samples into [`Placement`]
//! snapshots. Either stream may drive a recomputation from its own thread:
//! both latest samples and the current placement sit behind one lock, so a
//! recomputation never sees one sample updated without the other. Handlers
//! run after that lock is released but while a separate delivery lock is
//! held, so placements and events arrive in sequence order. A handler may
//! read the engine but must not feed it.

use crate::algorithms::geomath::{initial_bearing, local_offset, wrap_signed_degrees};
use crate::algorithms::{Geofence, GeofenceEngine};
use crate::api::types::{ApiResult, EngineState, Placement, TrackingEvent, TurnHint};
use crate::core::{
    LocationSample, OrientationSample, TargetLocation, DEFAULT_ALIGNMENT_TOLERANCE_DEG,
    LOCAL_OFFSET_VALID_RANGE_M,
};
use crate::sensors::SensorError;
use crate::streams::registry::{lock, HandlerRegistry, SubscriptionId};
use crate::streams::{LocationStream, OrientationStream};
use crate::utils::config::SessionConfig;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, trace, warn};

/// Compute a placement from one location and one orientation sample.
///
/// Pure; the returned snapshot has `sequence` 0 and the engine stamps it.
pub fn compute_placement(
    target: &TargetLocation,
    geofence: Option<&Geofence>,
    location: &LocationSample,
    orientation: &OrientationSample,
    alignment_tolerance_deg: f64,
) -> Placement {
    let user = &location.point;
    let offset = local_offset(user, target.point());
    let distance_m = offset.distance();
    let bearing_to_target_deg = initial_bearing(user, target.point());
    let relative_bearing_deg = wrap_signed_degrees(bearing_to_target_deg - orientation.heading_deg);

    Placement {
        offset,
        distance_m,
        is_visible: distance_m <= target.visibility_radius_m(),
        bearing_to_target_deg,
        relative_bearing_deg,
        heading_reference: orientation.reference,
        turn_hint: TurnHint::from_relative_bearing(relative_bearing_deg, alignment_tolerance_deg),
        geofence: geofence.map(|fence| GeofenceEngine::evaluate(user, fence)),
        location_timestamp_ms: location.timestamp_ms,
        orientation_timestamp_ms: orientation.timestamp_ms,
        sequence: 0,
    }
}

#[derive(Debug, Default)]
struct FusionState {
    location: Option<LocationSample>,
    orientation: Option<OrientationSample>,
    placement: Option<Placement>,
    sequence: u64,
}

struct EngineInner {
    target: TargetLocation,
    geofence: Option<Geofence>,
    alignment_tolerance_deg: f64,
    state: Mutex<FusionState>,
    /// Held across a recomputation and its publication
    delivery: Mutex<()>,
    placements: HandlerRegistry<Placement>,
    events: HandlerRegistry<TrackingEvent>,
}

impl EngineInner {
    /// Recompute under the lock; returns what has to be published
    fn recompute(&self, state: &mut FusionState) -> Option<(Placement, Vec<TrackingEvent>)> {
        let (Some(location), Some(orientation)) = (state.location, state.orientation) else {
            trace!("cold start, waiting for both streams");
            return None;
        };

        let mut placement = compute_placement(
            &self.target,
            self.geofence.as_ref(),
            &location,
            &orientation,
            self.alignment_tolerance_deg,
        );
        state.sequence += 1;
        placement.sequence = state.sequence;
        if placement.distance_m > LOCAL_OFFSET_VALID_RANGE_M {
            debug!(distance_m = placement.distance_m, "target beyond local offset range, offset is approximate");
        }

        let previous = state.placement.replace(placement);
        let events = transitions(previous.as_ref(), &placement);

        trace!(
            sequence = placement.sequence,
            distance_m = placement.distance_m,
            relative_bearing_deg = placement.relative_bearing_deg,
            "placement updated"
        );
        Some((placement, events))
    }

    fn publish(&self, update: Option<(Placement, Vec<TrackingEvent>)>) {
        let Some((placement, events)) = update else {
            return;
        };
        self.placements.notify(&placement);
        for event in &events {
            self.events.notify(event);
        }
    }

    fn update_location(&self, sample: LocationSample) {
        let _delivery = lock(&self.delivery);
        let update = {
            let mut state = lock(&self.state);
            state.location = Some(sample);
            self.recompute(&mut state)
        };
        self.publish(update);
    }

    fn update_orientation(&self, sample: OrientationSample) {
        let _delivery = lock(&self.delivery);
        let update = {
            let mut state = lock(&self.state);
            state.orientation = Some(sample);
            self.recompute(&mut state)
        };
        self.publish(update);
    }

    fn report_sensor_error(&self, error: &SensorError) {
        warn!(%error, "sensor failure observed by placement engine");
        let _delivery = lock(&self.delivery);
        self.events.notify(&TrackingEvent::SensorFailed { error: error.clone() });
    }
}

/// Events implied by moving from `previous` to `current`.
///
/// Before the first placement nothing is shown and the user counts as
/// outside the geofence, so the first placement reports entering or
/// becoming visible but never the opposite.
fn transitions(previous: Option<&Placement>, current: &Placement) -> Vec<TrackingEvent> {
    let mut events = Vec::new();

    if let Some(status) = current.geofence {
        let was_inside = previous
            .and_then(|p| p.geofence)
            .map_or(false, |s| s.inside);
        if status.inside != was_inside {
            if status.inside {
                info!(sequence = current.sequence, "entered geofence");
                events.push(TrackingEvent::GeofenceEntered);
            } else {
                info!(
                    sequence = current.sequence,
                    meters_from_boundary = status.meters_from_boundary,
                    "left geofence"
                );
                events.push(TrackingEvent::GeofenceExited);
            }
        }
    }

    let was_visible = previous.map_or(false, |p| p.is_visible);
    if current.is_visible != was_visible {
        info!(
            visible = current.is_visible,
            distance_m = current.distance_m,
            "target visibility changed"
        );
        events.push(TrackingEvent::VisibilityChanged {
            visible: current.is_visible,
        });
    }

    events
}

/// Subscriptions created by [`PlacementEngine::attach`]
#[derive(Debug, Clone)]
pub struct Attachment {
    location: [SubscriptionId; 2],
    orientation: [SubscriptionId; 2],
}

impl Attachment {
    /// Remove the engine's handlers from both streams
    pub fn detach(&self, location: &LocationStream, orientation: &OrientationStream) {
        for id in self.location {
            location.unsubscribe(id);
        }
        for id in self.orientation {
            orientation.unsubscribe(id);
        }
    }
}

/// Orchestrates one tracking session
#[derive(Clone)]
pub struct PlacementEngine {
    inner: Arc<EngineInner>,
}

impl PlacementEngine {
    pub fn new(target: TargetLocation, geofence: Option<Geofence>) -> Self {
        Self::with_alignment_tolerance(target, geofence, DEFAULT_ALIGNMENT_TOLERANCE_DEG)
    }

    pub fn with_alignment_tolerance(
        target: TargetLocation,
        geofence: Option<Geofence>,
        alignment_tolerance_deg: f64,
    ) -> Self {
        debug!(
            latitude = target.point().latitude,
            longitude = target.point().longitude,
            visibility_radius_m = target.visibility_radius_m(),
            geofence = geofence.is_some(),
            "placement engine created"
        );

        Self {
            inner: Arc::new(EngineInner {
                target,
                geofence,
                alignment_tolerance_deg,
                state: Mutex::new(FusionState::default()),
                delivery: Mutex::new(()),
                placements: HandlerRegistry::new(),
                events: HandlerRegistry::new(),
            }),
        }
    }

    /// Build an engine from a validated session configuration
    pub fn from_config(config: &SessionConfig) -> ApiResult<Self> {
        config.validate()?;
        Ok(Self::with_alignment_tolerance(
            config.build_target()?,
            config.build_geofence()?,
            config.alignment_tolerance_deg,
        ))
    }

    pub fn target(&self) -> &TargetLocation {
        &self.inner.target
    }

    pub fn geofence(&self) -> Option<&Geofence> {
        self.inner.geofence.as_ref()
    }

    /// Subscribe the engine to both streams' samples and errors.
    ///
    /// The stream handlers hold only a weak reference, so attaching does not
    /// keep the engine alive.
    pub fn attach(&self, location: &LocationStream, orientation: &OrientationStream) -> Attachment {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);

        let w = weak.clone();
        let location_samples = location.subscribe(move |sample| {
            if let Some(inner) = w.upgrade() {
                inner.update_location(*sample);
            }
        });
        let w = weak.clone();
        let location_errors = location.on_error(move |error| {
            if let Some(inner) = w.upgrade() {
                inner.report_sensor_error(error);
            }
        });
        let w = weak.clone();
        let orientation_samples = orientation.subscribe(move |sample| {
            if let Some(inner) = w.upgrade() {
                inner.update_orientation(*sample);
            }
        });
        let w = weak;
        let orientation_errors = orientation.on_error(move |error| {
            if let Some(inner) = w.upgrade() {
                inner.report_sensor_error(error);
            }
        });

        Attachment {
            location: [location_samples, location_errors],
            orientation: [orientation_samples, orientation_errors],
        }
    }

    /// Record a new location sample and recompute
    pub fn update_location(&self, sample: LocationSample) {
        self.inner.update_location(sample);
    }

    /// Record a new orientation sample and recompute
    pub fn update_orientation(&self, sample: OrientationSample) {
        self.inner.update_orientation(sample);
    }

    /// Forward a sensor failure to event handlers as `SensorFailed`
    pub fn report_sensor_error(&self, error: &SensorError) {
        self.inner.report_sensor_error(error);
    }

    /// Called with every new placement
    pub fn on_placement<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Placement) + Send + Sync + 'static,
    {
        self.inner.placements.subscribe(handler)
    }

    pub fn on_event<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TrackingEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.placements.unsubscribe(id) || self.inner.events.unsubscribe(id)
    }

    /// Most recent placement, for late subscribers
    pub fn current_placement(&self) -> Option<Placement> {
        lock(&self.inner.state).placement
    }

    pub fn state(&self) -> EngineState {
        let state = lock(&self.inner.state);
        if state.location.is_some() && state.orientation.is_some() {
            EngineState::Tracking
        } else {
            EngineState::ColdStart
        }
    }

    /// Forget all samples and the current placement.
    ///
    /// Handlers stay registered and the placement sequence keeps counting
    /// from where it was.
    pub fn reset(&self) {
        let _delivery = lock(&self.inner.delivery);
        let mut state = lock(&self.inner.state);
        let sequence = state.sequence;
        *state = FusionState {
            sequence,
            ..FusionState::default()
        };
        info!(sequence, "placement engine reset");
    }
}

//! Continuous orientation stream
//!
//! Reconciles the platform's heading sources into one clockwise heading,
//! labelled with the frame it is referenced to, and remaps tilt into
//! screen-stable axes.

use crate::algorithms::geomath::normalize_degrees;
use crate::core::{HeadingReference, OrientationSample, ScreenOrientation};
use crate::processing::HeadingFilter;
use crate::sensors::source::{authorize, OrientationSource, PermissionModel, RawOrientation};
use crate::sensors::{SensorError, SensorKind, SensorResult};
use crate::streams::registry::{lock, HandlerRegistry, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationOptions {
    /// Heading smoothing factor in (0, 1]; `None` delivers raw headings
    pub smoothing: Option<f64>,
}

/// Pick the heading to report for a raw event.
///
/// A compass heading is already clockwise from true north and always wins.
/// Otherwise alpha, which grows counter-clockwise, is flipped and labelled
/// as device-frame regardless of the platform's `absolute` flag.
pub fn reconcile_heading(raw: &RawOrientation) -> Option<(f64, HeadingReference)> {
    if let Some(heading) = raw.compass_heading.filter(|h| h.is_finite()) {
        return Some((normalize_degrees(heading), HeadingReference::TrueNorth));
    }
    raw.alpha
        .filter(|a| a.is_finite())
        .map(|alpha| (normalize_degrees(360.0 - alpha), HeadingReference::DeviceFrame))
}

/// Convert a raw event into a sample; `None` when it carries no heading
pub fn normalize_orientation(raw: &RawOrientation) -> Option<OrientationSample> {
    let (heading_deg, reference) = reconcile_heading(raw)?;

    let screen = ScreenOrientation::from_angle(raw.screen_angle_deg).unwrap_or_else(|| {
        debug!(angle = raw.screen_angle_deg, "unrecognised screen angle, assuming portrait");
        ScreenOrientation::Portrait
    });
    let beta = raw.beta.filter(|b| b.is_finite()).unwrap_or(0.0);
    let gamma = raw.gamma.filter(|g| g.is_finite()).unwrap_or(0.0);
    let (beta_deg, gamma_deg) = screen.normalize_tilt(beta, gamma);

    Some(OrientationSample {
        heading_deg,
        beta_deg,
        gamma_deg,
        reference,
        screen,
        timestamp_ms: raw.timestamp_ms,
    })
}

#[derive(Debug, Default)]
struct OrientationState {
    running: bool,
    generation: u64,
    latest: Option<OrientationSample>,
    last_error: Option<SensorError>,
    filter: Option<HeadingFilter>,
    dropped: u64,
}

struct OrientationShared {
    state: Mutex<OrientationState>,
    /// Held from the ordering check until every handler has seen the sample
    delivery: Mutex<()>,
    samples: HandlerRegistry<OrientationSample>,
    errors: HandlerRegistry<SensorError>,
}

impl OrientationShared {
    fn accept(&self, generation: u64, raw: RawOrientation) -> bool {
        let _delivery = lock(&self.delivery);
        let sample = {
            let mut state = lock(&self.state);
            if !state.running || state.generation != generation {
                trace!("orientation event from an inactive watch ignored");
                return false;
            }

            let Some(mut sample) = normalize_orientation(&raw) else {
                trace!("orientation event without heading dropped");
                state.dropped += 1;
                return false;
            };

            if let Some(previous) = state.latest {
                if sample.timestamp_ms < previous.timestamp_ms {
                    debug!(
                        timestamp_ms = sample.timestamp_ms,
                        previous_ms = previous.timestamp_ms,
                        "out-of-order orientation event dropped"
                    );
                    state.dropped += 1;
                    return false;
                }
                // Smoothed values from different frames must not blend
                if previous.reference != sample.reference {
                    debug!(reference = ?sample.reference, "heading reference changed");
                    if let Some(filter) = state.filter.as_mut() {
                        filter.reset();
                    }
                }
            }

            if let Some(filter) = state.filter.as_mut() {
                sample.heading_deg = filter.update(sample.heading_deg, sample.timestamp_ms);
            }

            state.latest = Some(sample);
            sample
        };

        self.samples.notify(&sample);
        true
    }

    fn fail(&self, generation: u64, error: SensorError) -> bool {
        let _delivery = lock(&self.delivery);
        {
            let mut state = lock(&self.state);
            if !state.running || state.generation != generation {
                return false;
            }
            state.last_error = Some(error.clone());
        }

        warn!(%error, "orientation stream error");
        self.errors.notify(&error);
        true
    }
}

/// Push handle given to an [`OrientationSource`] when watching starts.
///
/// Events pushed from several threads reach handlers one at a time and in
/// timestamp order. Handlers must not push into their own stream.
#[derive(Clone)]
pub struct OrientationFeed {
    shared: Weak<OrientationShared>,
    generation: u64,
}

impl OrientationFeed {
    pub fn push(&self, raw: RawOrientation) -> bool {
        self.shared
            .upgrade()
            .map_or(false, |shared| shared.accept(self.generation, raw))
    }

    pub fn fail(&self, error: SensorError) -> bool {
        self.shared
            .upgrade()
            .map_or(false, |shared| shared.fail(self.generation, error))
    }

    pub fn is_active(&self) -> bool {
        self.shared.upgrade().map_or(false, |shared| {
            let state = lock(&shared.state);
            state.running && state.generation == self.generation
        })
    }
}

/// Continuous stream of heading and tilt
pub struct OrientationStream {
    source: Box<dyn OrientationSource>,
    permission_model: PermissionModel,
    shared: Arc<OrientationShared>,
}

impl OrientationStream {
    pub fn new(source: Box<dyn OrientationSource>) -> Self {
        let permission_model = source.permission_model();
        debug!(?permission_model, "orientation permission model resolved");

        Self {
            source,
            permission_model,
            shared: Arc::new(OrientationShared {
                state: Mutex::new(OrientationState::default()),
                delivery: Mutex::new(()),
                samples: HandlerRegistry::new(),
                errors: HandlerRegistry::new(),
            }),
        }
    }

    pub fn permission_model(&self) -> PermissionModel {
        self.permission_model
    }

    /// Request permission if the platform needs it, then begin listening
    pub fn start(&mut self, options: OrientationOptions) -> SensorResult<()> {
        if self.is_running() {
            warn!("orientation stream already started");
            return Ok(());
        }

        {
            let mut state = lock(&self.shared.state);
            let generation = state.generation;
            *state = OrientationState {
                generation,
                filter: options.smoothing.map(HeadingFilter::new),
                ..OrientationState::default()
            };
        }

        let source = &mut self.source;
        if let Err(error) = authorize(SensorKind::Orientation, self.permission_model, || {
            source.request_permission()
        }) {
            warn!(%error, "orientation stream not started");
            lock(&self.shared.state).last_error = Some(error.clone());
            return Err(error);
        }

        let generation = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            state.running = true;
            state.generation
        };

        let feed = OrientationFeed {
            shared: Arc::downgrade(&self.shared),
            generation,
        };

        if let Err(error) = self.source.watch(feed) {
            let mut state = lock(&self.shared.state);
            state.running = false;
            state.generation += 1;
            state.last_error = Some(error.clone());
            warn!(%error, "orientation watch failed");
            return Err(error);
        }

        info!(smoothing = ?options.smoothing, "orientation stream started");
        Ok(())
    }

    /// Idempotent; clears the platform listener before invalidating the feed
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.source.clear_watch();
        {
            let mut state = lock(&self.shared.state);
            state.running = false;
            state.generation += 1;
        }
        info!("orientation stream stopped");
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&OrientationSample) + Send + Sync + 'static,
    {
        self.shared.samples.subscribe(handler)
    }

    pub fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SensorError) + Send + Sync + 'static,
    {
        self.shared.errors.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.samples.unsubscribe(id) || self.shared.errors.unsubscribe(id)
    }

    pub fn latest(&self) -> Option<OrientationSample> {
        lock(&self.shared.state).latest
    }

    pub fn last_error(&self) -> Option<SensorError> {
        lock(&self.shared.state).last_error.clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).running
    }

    pub fn dropped_samples(&self) -> u64 {
        lock(&self.shared.state).dropped
    }
}

impl Drop for OrientationStream {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Continuous location stream
//!
//! Wraps a [`LocationSource`], validates and orders its fixes, keeps the
//! latest accepted [`LocationSample`] and fans it out to subscribers.
//! Failures are recorded and reported to error handlers; the stream never
//! retries on its own.

use crate::core::{GeoPoint, LocationSample, DEFAULT_LOCATION_TIMEOUT_MS};
use crate::algorithms::geomath::normalize_degrees;
use crate::sensors::clock::{Clock, SystemClock};
use crate::sensors::source::{authorize, FixResponder, LocationSource, PermissionModel, RawFix};
use crate::sensors::{SensorError, SensorKind, SensorResult};
use crate::streams::registry::{lock, HandlerRegistry, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

/// Sampling options passed to the platform source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationOptions {
    /// Prefer satellite fixes over network positioning
    pub high_accuracy: bool,
    /// Window for the first fix, and for one-shot requests (ms)
    pub timeout_ms: u64,
    /// Fixes older than this are discarded; 0 disables the check (ms)
    pub max_sample_age_ms: u64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: DEFAULT_LOCATION_TIMEOUT_MS,
            max_sample_age_ms: 0,
        }
    }
}

/// Validate a raw platform fix; `None` when it cannot be used
pub fn normalize_fix(fix: &RawFix) -> Option<LocationSample> {
    let point = GeoPoint::new(fix.latitude, fix.longitude).ok()?;
    if !fix.accuracy_m.is_finite() || fix.accuracy_m < 0.0 {
        return None;
    }

    Some(LocationSample {
        point,
        accuracy_m: fix.accuracy_m,
        timestamp_ms: fix.timestamp_ms,
        altitude_m: fix.altitude_m.filter(|a| a.is_finite()),
        speed_mps: fix.speed_mps.filter(|s| s.is_finite() && *s >= 0.0),
        course_deg: fix.course_deg.filter(|c| c.is_finite()).map(normalize_degrees),
    })
}

#[derive(Debug, Default)]
struct LocationState {
    running: bool,
    generation: u64,
    options: LocationOptions,
    started_at_ms: u64,
    latest: Option<LocationSample>,
    last_error: Option<SensorError>,
    deadline_reported: bool,
    dropped: u64,
}

struct LocationShared {
    state: Mutex<LocationState>,
    /// Held from the ordering check until every handler has seen the sample
    delivery: Mutex<()>,
    samples: HandlerRegistry<LocationSample>,
    errors: HandlerRegistry<SensorError>,
    clock: Arc<dyn Clock>,
}

impl LocationShared {
    fn accept(&self, generation: u64, fix: RawFix) -> bool {
        let _delivery = lock(&self.delivery);
        let sample = {
            let mut state = lock(&self.state);
            if !state.running || state.generation != generation {
                trace!("fix from an inactive watch ignored");
                return false;
            }

            let Some(sample) = normalize_fix(&fix) else {
                warn!(
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    accuracy_m = fix.accuracy_m,
                    "invalid location fix dropped"
                );
                state.dropped += 1;
                return false;
            };

            if let Some(previous) = state.latest {
                if sample.timestamp_ms < previous.timestamp_ms {
                    debug!(
                        timestamp_ms = sample.timestamp_ms,
                        previous_ms = previous.timestamp_ms,
                        "out-of-order location fix dropped"
                    );
                    state.dropped += 1;
                    return false;
                }
            }

            let max_age = state.options.max_sample_age_ms;
            if max_age > 0 {
                let age = self.clock.now_ms().saturating_sub(sample.timestamp_ms);
                if age > max_age {
                    debug!(age_ms = age, max_age_ms = max_age, "stale location fix dropped");
                    state.dropped += 1;
                    return false;
                }
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

        warn!(%error, "location stream error");
        self.errors.notify(&error);
        true
    }
}

/// Push handle given to a [`LocationSource`] when watching starts.
///
/// Cheap to clone and safe to call from any thread. Concurrent pushes are
/// delivered one at a time, so handlers never see a fix older than the one
/// before it. A handler must not push into the stream it is subscribed to.
/// Once the stream is stopped or restarted, calls on an older feed are
/// ignored.
#[derive(Clone)]
pub struct LocationFeed {
    shared: Weak<LocationShared>,
    generation: u64,
}

impl LocationFeed {
    /// Deliver a fix; returns whether it was accepted
    pub fn push(&self, fix: RawFix) -> bool {
        self.shared
            .upgrade()
            .map_or(false, |shared| shared.accept(self.generation, fix))
    }

    /// Report a platform failure; returns whether the stream was still listening
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

/// Continuous, validated stream of position fixes
pub struct LocationStream {
    source: Box<dyn LocationSource>,
    permission_model: PermissionModel,
    shared: Arc<LocationShared>,
}

impl LocationStream {
    pub fn new(source: Box<dyn LocationSource>) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    /// Create a stream judging sample age against `clock`
    pub fn with_clock(source: Box<dyn LocationSource>, clock: Arc<dyn Clock>) -> Self {
        let permission_model = source.permission_model();
        debug!(?permission_model, "location permission model resolved");

        Self {
            source,
            permission_model,
            shared: Arc::new(LocationShared {
                state: Mutex::new(LocationState::default()),
                delivery: Mutex::new(()),
                samples: HandlerRegistry::new(),
                errors: HandlerRegistry::new(),
                clock,
            }),
        }
    }

    pub fn permission_model(&self) -> PermissionModel {
        self.permission_model
    }

    /// Begin continuous sampling.
    ///
    /// A restart discards the previous latest sample and error. Starting an
    /// already running stream is a no-op.
    pub fn start(&mut self, options: LocationOptions) -> SensorResult<()> {
        if self.is_running() {
            warn!("location stream already started");
            return Ok(());
        }

        {
            let mut state = lock(&self.shared.state);
            let generation = state.generation;
            *state = LocationState {
                generation,
                options,
                ..LocationState::default()
            };
        }

        let source = &mut self.source;
        if let Err(error) = authorize(SensorKind::Location, self.permission_model, || {
            source.request_permission()
        }) {
            warn!(%error, "location stream not started");
            lock(&self.shared.state).last_error = Some(error.clone());
            return Err(error);
        }

        let generation = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            state.running = true;
            state.started_at_ms = self.shared.clock.now_ms();
            state.generation
        };

        let feed = LocationFeed {
            shared: Arc::downgrade(&self.shared),
            generation,
        };

        if let Err(error) = self.source.watch(&options, feed) {
            let mut state = lock(&self.shared.state);
            state.running = false;
            state.generation += 1;
            state.last_error = Some(error.clone());
            warn!(%error, "location watch failed");
            return Err(error);
        }

        info!(
            high_accuracy = options.high_accuracy,
            timeout_ms = options.timeout_ms,
            max_sample_age_ms = options.max_sample_age_ms,
            "location stream started"
        );
        Ok(())
    }

    /// Halt sampling. Safe to call repeatedly and while fixes are in flight:
    /// the platform watch is cleared first, then the feed is invalidated.
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
        info!("location stream stopped");
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&LocationSample) + Send + Sync + 'static,
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

    pub fn latest(&self) -> Option<LocationSample> {
        lock(&self.shared.state).latest
    }

    pub fn last_error(&self) -> Option<SensorError> {
        lock(&self.shared.state).last_error.clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).running
    }

    /// Fixes rejected as invalid, out of order or stale since the last start
    pub fn dropped_samples(&self) -> u64 {
        lock(&self.shared.state).dropped
    }

    /// Report `Timeout` once if no fix was accepted within `timeout_ms` of starting.
    ///
    /// Non-blocking; meant to be polled from the host's update loop.
    pub fn check_first_fix_deadline(&self) -> Option<SensorError> {
        let _delivery = lock(&self.shared.delivery);
        let error = {
            let mut state = lock(&self.shared.state);
            if !state.running || state.latest.is_some() || state.deadline_reported {
                return None;
            }
            let elapsed = self.shared.clock.now_ms().saturating_sub(state.started_at_ms);
            if elapsed < state.options.timeout_ms {
                return None;
            }

            let error = SensorError::Timeout {
                sensor: SensorKind::Location,
                timeout_ms: state.options.timeout_ms,
            };
            state.deadline_reported = true;
            state.last_error = Some(error.clone());
            error
        };

        warn!(%error, "no first location fix");
        self.shared.errors.notify(&error);
        Some(error)
    }

    /// Request a single fix, independent of continuous sampling.
    ///
    /// Completes with `Timeout` if the source does not answer within
    /// `options.timeout_ms`, and with `Unavailable` if it drops the request.
    pub async fn current_position(&mut self, options: LocationOptions) -> SensorResult<LocationSample> {
        let sensor = SensorKind::Location;
        let source = &mut self.source;
        authorize(sensor, self.permission_model, || source.request_permission())?;

        let (tx, rx) = oneshot::channel();
        self.source.request_fix(&options, FixResponder::new(tx));

        match tokio::time::timeout(Duration::from_millis(options.timeout_ms), rx).await {
            Ok(Ok(Ok(fix))) => normalize_fix(&fix).ok_or_else(|| SensorError::Unavailable {
                sensor,
                details: "source returned an invalid fix".to_string(),
            }),
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) => Err(SensorError::Unavailable {
                sensor,
                details: "source dropped the request".to_string(),
            }),
            Err(_) => Err(SensorError::Timeout {
                sensor,
                timeout_ms: options.timeout_ms,
            }),
        }
    }
}

impl Drop for LocationStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::clock::ManualClock;
    use crate::sensors::mock::{MockFixBehavior, MockLocationSource};
    use crate::sensors::source::PermissionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    const T0: u64 = 1_700_000_000_000;

    fn fix(lat: f64, lon: f64, ts: u64) -> RawFix {
        RawFix::new(lat, lon, 5.0, ts)
    }

    #[test]
    fn test_latest_is_none_before_first_fix() {
        let (source, _handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        stream.start(LocationOptions::default()).unwrap();
        assert!(stream.latest().is_none());
    }

    #[test]
    fn test_accepts_and_notifies() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        stream.subscribe(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        stream.start(LocationOptions::default()).unwrap();
        assert!(handle.emit(fix(41.3874, 2.1686, T0)));

        let latest = stream.latest().unwrap();
        assert_eq!(latest.point.latitude, 41.3874);
        assert_eq!(latest.timestamp_ms, T0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_order_fix_dropped() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        let timestamps = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&timestamps);
        stream.subscribe(move |s| t.lock().unwrap().push(s.timestamp_ms));

        stream.start(LocationOptions::default()).unwrap();
        handle.emit(fix(41.0, 2.0, T0 + 2000));
        assert!(!handle.emit(fix(41.1, 2.0, T0 + 1000)));
        handle.emit(fix(41.2, 2.0, T0 + 3000));

        assert_eq!(*timestamps.lock().unwrap(), vec![T0 + 2000, T0 + 3000]);
        assert_eq!(stream.latest().unwrap().point.latitude, 41.2);
        assert_eq!(stream.dropped_samples(), 1);
    }

    #[test]
    fn test_invalid_fix_dropped() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        stream.start(LocationOptions::default()).unwrap();

        assert!(!handle.emit(fix(123.0, 2.0, T0)));
        assert!(!handle.emit(RawFix::new(41.0, 2.0, -1.0, T0)));
        assert!(stream.latest().is_none());
        assert_eq!(stream.dropped_samples(), 2);
    }

    #[test]
    fn test_stale_fix_dropped() {
        let clock = Arc::new(ManualClock::new(T0 + 10_000));
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::with_clock(Box::new(source), clock);
        stream
            .start(LocationOptions {
                max_sample_age_ms: 5_000,
                ..LocationOptions::default()
            })
            .unwrap();

        assert!(!handle.emit(fix(41.0, 2.0, T0)));
        assert!(handle.emit(fix(41.0, 2.0, T0 + 6_000)));
    }

    #[test]
    fn test_stop_is_idempotent_and_clears_watch_once() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        stream.start(LocationOptions::default()).unwrap();

        stream.stop();
        stream.stop();
        assert!(!stream.is_running());
        assert_eq!(handle.clear_calls(), 1);
    }

    #[test]
    fn test_fix_after_stop_ignored() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        stream.start(LocationOptions::default()).unwrap();
        let stale_feed = handle.feed().unwrap();

        stream.stop();
        assert!(!stale_feed.is_active());
        assert!(!stale_feed.push(fix(41.0, 2.0, T0)));
        assert!(stream.latest().is_none());
    }

    #[test]
    fn test_restart_is_fresh() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        stream.start(LocationOptions::default()).unwrap();
        handle.emit(fix(41.0, 2.0, T0 + 5_000));
        handle.fail(SensorError::Unavailable {
            sensor: SensorKind::Location,
            details: "no satellites".to_string(),
        });
        assert!(stream.last_error().is_some());

        stream.stop();
        stream.start(LocationOptions::default()).unwrap();
        assert!(stream.last_error().is_none());
        assert!(stream.latest().is_none());

        // An older timestamp than before the restart is accepted again
        assert!(handle.emit(fix(41.0, 2.0, T0)));
        assert_eq!(handle.watch_calls(), 2);
    }

    #[test]
    fn test_concurrent_pushes_delivered_in_order() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let timestamps = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&timestamps);
        stream.subscribe(move |s| {
            if s.timestamp_ms == T0 + 1 {
                entered_tx.lock().unwrap().send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
            t.lock().unwrap().push(s.timestamp_ms);
        });

        stream.start(LocationOptions::default()).unwrap();
        let feed = handle.feed().unwrap();

        let first_feed = feed.clone();
        let first = thread::spawn(move || first_feed.push(fix(41.0, 2.0, T0 + 1)));
        entered_rx.recv().unwrap();

        // The first fix is still being delivered while the second arrives
        let second_feed = feed.clone();
        let second = thread::spawn(move || second_feed.push(fix(41.1, 2.0, T0 + 2)));
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert!(first.join().unwrap());
        assert!(second.join().unwrap());
        assert_eq!(*timestamps.lock().unwrap(), vec![T0 + 1, T0 + 2]);
        assert_eq!(stream.latest().unwrap().timestamp_ms, T0 + 2);
    }

    #[test]
    fn test_permission_denied_reported() {
        let (source, handle) = MockLocationSource::with_permission(
            PermissionModel::RequiresExplicitGrant,
            PermissionStatus::Denied,
        );
        let mut stream = LocationStream::new(Box::new(source));

        let result = stream.start(LocationOptions::default());
        assert_eq!(
            result,
            Err(SensorError::PermissionDenied { sensor: SensorKind::Location })
        );
        assert!(!stream.is_running());
        assert_eq!(handle.watch_calls(), 0);
        assert!(stream.last_error().is_some());
    }

    #[test]
    fn test_unsupported_reported() {
        let (source, _handle) = MockLocationSource::with_permission(
            PermissionModel::Unsupported,
            PermissionStatus::Granted,
        );
        let mut stream = LocationStream::new(Box::new(source));
        assert_eq!(
            stream.start(LocationOptions::default()),
            Err(SensorError::Unsupported { sensor: SensorKind::Location })
        );
    }

    #[test]
    fn test_watch_failure_leaves_stream_stopped() {
        let (mut source, _handle) = MockLocationSource::new();
        source.fail_watch_with(SensorError::Unavailable {
            sensor: SensorKind::Location,
            details: "location services off".to_string(),
        });
        let mut stream = LocationStream::new(Box::new(source));

        assert!(matches!(
            stream.start(LocationOptions::default()),
            Err(SensorError::Unavailable { .. })
        ));
        assert!(!stream.is_running());
    }

    #[test]
    fn test_platform_errors_reach_error_handlers() {
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::new(Box::new(source));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        stream.on_error(move |err| e.lock().unwrap().push(err.clone()));

        stream.start(LocationOptions::default()).unwrap();
        let timeout = SensorError::Timeout {
            sensor: SensorKind::Location,
            timeout_ms: 10_000,
        };
        assert!(handle.fail(timeout.clone()));

        assert_eq!(*errors.lock().unwrap(), vec![timeout.clone()]);
        assert_eq!(stream.last_error(), Some(timeout));
    }

    #[test]
    fn test_first_fix_deadline_reported_once() {
        let clock = Arc::new(ManualClock::new(T0));
        let (source, _handle) = MockLocationSource::new();
        let mut stream = LocationStream::with_clock(Box::new(source), clock.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        stream.on_error(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        stream
            .start(LocationOptions {
                timeout_ms: 5_000,
                ..LocationOptions::default()
            })
            .unwrap();

        clock.advance(4_999);
        assert!(stream.check_first_fix_deadline().is_none());
        clock.advance(1);
        assert!(matches!(
            stream.check_first_fix_deadline(),
            Some(SensorError::Timeout { timeout_ms: 5_000, .. })
        ));
        assert!(stream.check_first_fix_deadline().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_fix_deadline_satisfied_by_fix() {
        let clock = Arc::new(ManualClock::new(T0));
        let (source, handle) = MockLocationSource::new();
        let mut stream = LocationStream::with_clock(Box::new(source), clock.clone());
        stream.start(LocationOptions::default()).unwrap();

        handle.emit(fix(41.0, 2.0, T0));
        clock.advance(60_000);
        assert!(stream.check_first_fix_deadline().is_none());
    }

    #[test]
    fn test_optional_fields_normalized() {
        let raw = RawFix::new(41.0, 2.0, 3.0, T0)
            .with_altitude(f64::NAN)
            .with_motion(1.5, -90.0);
        let sample = normalize_fix(&raw).unwrap();
        assert_eq!(sample.altitude_m, None);
        assert_eq!(sample.speed_mps, Some(1.5));
        assert_eq!(sample.course_deg, Some(270.0));
    }

    #[tokio::test]
    async fn test_current_position_resolves() {
        let (mut source, _handle) = MockLocationSource::new();
        source.set_fix_behavior(MockFixBehavior::Respond(fix(41.0, 2.0, T0)));
        let mut stream = LocationStream::new(Box::new(source));

        let sample = stream.current_position(LocationOptions::default()).await.unwrap();
        assert_eq!(sample.point.longitude, 2.0);
        assert!(!stream.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_position_times_out() {
        let (mut source, _handle) = MockLocationSource::new();
        source.set_fix_behavior(MockFixBehavior::Hold);
        let mut stream = LocationStream::new(Box::new(source));

        let result = stream
            .current_position(LocationOptions {
                timeout_ms: 3_000,
                ..LocationOptions::default()
            })
            .await;
        assert_eq!(
            result,
            Err(SensorError::Timeout {
                sensor: SensorKind::Location,
                timeout_ms: 3_000
            })
        );
    }

    #[tokio::test]
    async fn test_current_position_dropped_request_is_unavailable() {
        let (mut source, _handle) = MockLocationSource::new();
        source.set_fix_behavior(MockFixBehavior::Drop);
        let mut stream = LocationStream::new(Box::new(source));

        let result = stream.current_position(LocationOptions::default()).await;
        assert!(matches!(result, Err(SensorError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_current_position_requires_permission() {
        let (source, _handle) = MockLocationSource::with_permission(
            PermissionModel::RequiresExplicitGrant,
            PermissionStatus::Denied,
        );
        let mut stream = LocationStream::new(Box::new(source));
        let result = stream.current_position(LocationOptions::default()).await;
        assert!(matches!(result, Err(SensorError::PermissionDenied { .. })));
    }
}

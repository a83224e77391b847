use crate::algorithms::geomath::normalize_degrees;
use crate::core::HEADING_FILTER_MAX_GAP_MS;
use nalgebra::Vector2;

/// Exponential smoothing of compass headings on the unit circle.
///
/// Headings are averaged as (east, north) unit vectors so that 359° and 1°
/// blend to 0° instead of 180°.
#[derive(Debug, Clone)]
pub struct HeadingFilter {
    /// Weight of the newest reading, in (0, 1]; 1 disables smoothing
    pub factor: f64,
    /// Gap after which the filter restarts from the next reading (ms)
    pub max_gap_ms: u64,
    state: Option<Vector2<f64>>,
    last_timestamp_ms: Option<u64>,
}

impl HeadingFilter {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(f64::EPSILON, 1.0),
            max_gap_ms: HEADING_FILTER_MAX_GAP_MS,
            state: None,
            last_timestamp_ms: None,
        }
    }

    pub fn with_max_gap(mut self, max_gap_ms: u64) -> Self {
        self.max_gap_ms = max_gap_ms;
        self
    }

    /// Feed one heading and return the smoothed heading in [0, 360)
    pub fn update(&mut self, heading_deg: f64, timestamp_ms: u64) -> f64 {
        let radians = heading_deg.to_radians();
        let reading = Vector2::new(radians.sin(), radians.cos());

        let expired = self
            .last_timestamp_ms
            .map_or(true, |last| timestamp_ms.saturating_sub(last) > self.max_gap_ms);

        let next = match self.state {
            Some(state) if !expired => state * (1.0 - self.factor) + reading * self.factor,
            _ => reading,
        };
        // Exactly opposed readings cancel out; fall back to the newest one
        let next = if next.norm() < 1e-9 { reading } else { next };

        self.state = Some(next);
        self.last_timestamp_ms = Some(timestamp_ms);

        normalize_degrees(next.x.atan2(next.y).to_degrees())
    }

    pub fn reset(&mut self) {
        self.state = None;
        self.last_timestamp_ms = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reading_passes_through() {
        let mut filter = HeadingFilter::new(0.2);
        assert!(!filter.is_initialized());
        assert!((filter.update(123.0, 0) - 123.0).abs() < 1e-9);
        assert!(filter.is_initialized());
    }

    #[test]
    fn test_smoothing_across_north() {
        let mut filter = HeadingFilter::new(0.5);
        filter.update(350.0, 0);
        let smoothed = filter.update(10.0, 100);
        assert!(smoothed < 1e-6 || smoothed > 360.0 - 1e-6, "got {}", smoothed);
    }

    #[test]
    fn test_converges_towards_new_heading() {
        let mut filter = HeadingFilter::new(0.3);
        filter.update(0.0, 0);
        let mut heading = 0.0;
        for i in 1..40 {
            heading = filter.update(90.0, i * 50);
        }
        assert!((heading - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_factor_one_is_passthrough() {
        let mut filter = HeadingFilter::new(1.0);
        filter.update(10.0, 0);
        assert!((filter.update(200.0, 10) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_resets() {
        let mut filter = HeadingFilter::new(0.1).with_max_gap(1_000);
        filter.update(0.0, 0);
        assert!((filter.update(180.0, 5_000) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_opposed_readings_fall_back_to_newest() {
        let mut filter = HeadingFilter::new(0.5);
        filter.update(0.0, 0);
        assert!((filter.update(180.0, 10) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let mut filter = HeadingFilter::new(0.5);
        filter.update(45.0, 0);
        filter.reset();
        assert!(!filter.is_initialized());
        assert!((filter.update(270.0, 10) - 270.0).abs() < 1e-9);
    }
}

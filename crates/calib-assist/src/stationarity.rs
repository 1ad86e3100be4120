//! Detects how long the user has held the calibration target still.

use calib_assist_core::CalibrationObservation;
use log::trace;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Motion tolerance of [`StationarityTracker`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationarityParams {
    /// Lower bound of the tolerance, in pixels.
    pub min_tolerance_px: f64,
    /// Tolerance as a fraction of the larger image dimension.
    pub tolerance_frac: f64,
}

impl Default for StationarityParams {
    fn default() -> Self {
        Self {
            min_tolerance_px: 1.0,
            tolerance_frac: 0.005,
        }
    }
}

impl StationarityParams {
    /// Maximum mean point displacement still counted as "not moving".
    pub fn tolerance_for(&self, width: usize, height: usize) -> f64 {
        self.min_tolerance_px
            .max(self.tolerance_frac * width.max(height) as f64)
    }
}

/// Accumulates the time the observed point set stays within a small
/// tolerance of the anchor pose, the pose where stillness began.
///
/// Motion is measured against the anchor rather than the previous frame, so
/// slow drift eventually restarts the count.
///
/// Time comes from frame timestamps, so the tracker is deterministic for
/// recorded sessions.
#[derive(Clone, Debug)]
pub struct StationarityTracker {
    params: StationarityParams,
    image_size: Option<(usize, usize)>,
    tolerance: f64,
    anchor: CalibrationObservation,
    last_timestamp: Option<Duration>,
    stationary: Duration,
}

impl StationarityTracker {
    pub fn new(params: StationarityParams) -> Self {
        let tolerance = params.min_tolerance_px;
        Self {
            params,
            image_size: None,
            tolerance,
            anchor: CalibrationObservation::default(),
            last_timestamp: None,
            stationary: Duration::ZERO,
        }
    }

    /// Derive the motion tolerance from the image size. Cheap when the size
    /// is unchanged.
    pub fn set_image_size(&mut self, width: usize, height: usize) {
        if self.image_size == Some((width, height)) {
            return;
        }
        self.image_size = Some((width, height));
        self.tolerance = self.params.tolerance_for(width, height);
        self.anchor.clear();
        self.stationary = Duration::ZERO;
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Feed one frame. Call exactly once per processed frame.
    pub fn update(&mut self, detected: bool, points: &[Point2<f64>], timestamp: Duration) {
        let elapsed = self
            .last_timestamp
            .map(|prev| timestamp.saturating_sub(prev))
            .unwrap_or(Duration::ZERO);
        self.last_timestamp = Some(timestamp);

        if !detected || points.is_empty() {
            self.anchor.clear();
            self.stationary = Duration::ZERO;
            return;
        }

        match self.anchor.mean_displacement(points) {
            Some(d) if d <= self.tolerance => {
                self.stationary += elapsed;
            }
            other => {
                trace!("target moved (displacement {other:?}), restarting stillness");
                self.anchor.points.clear();
                self.anchor.points.extend_from_slice(points);
                self.stationary = Duration::ZERO;
            }
        }
    }

    /// Held-still time in seconds.
    pub fn stationary_time(&self) -> f64 {
        self.stationary.as_secs_f64()
    }

    pub fn stationary_duration(&self) -> Duration {
        self.stationary
    }

    /// Force the accumulator to zero. The current pose stays the reference,
    /// so stillness resumes counting from the next frame.
    pub fn reset_stationary(&mut self) {
        self.stationary = Duration::ZERO;
    }
}

impl Default for StationarityTracker {
    fn default() -> Self {
        Self::new(StationarityParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn grid(dx: f64) -> Vec<Point2<f64>> {
        (0..4)
            .flat_map(|r| (0..4).map(move |c| Point2::new(100.0 + 20.0 * c as f64 + dx, 80.0 + 20.0 * r as f64)))
            .collect()
    }

    fn tracker() -> StationarityTracker {
        let mut t = StationarityTracker::default();
        t.set_image_size(640, 480);
        t
    }

    #[test]
    fn tolerance_scales_with_image() {
        assert_eq!(StationarityParams::default().tolerance_for(100, 80), 1.0);
        assert!((StationarityParams::default().tolerance_for(1920, 1080) - 9.6).abs() < 1e-12);
    }

    #[test]
    fn accumulates_while_still() {
        let mut t = tracker();
        let pts = grid(0.0);
        let mut last = 0.0;
        for i in 0..=20 {
            t.update(true, &pts, ms(100 * i));
            assert!(t.stationary_time() >= last);
            last = t.stationary_time();
        }
        assert_eq!(t.stationary_duration(), ms(2000));
        assert_eq!(t.stationary_time(), 2.0);
    }

    #[test]
    fn jitter_within_tolerance_counts_as_still() {
        let mut t = tracker();
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(1.5), ms(100));
        t.update(true, &grid(-1.0), ms(200));
        assert_eq!(t.stationary_duration(), ms(200));
    }

    #[test]
    fn motion_resets() {
        let mut t = tracker();
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(0.0), ms(500));
        t.update(true, &grid(25.0), ms(600));
        assert_eq!(t.stationary_time(), 0.0);
        t.update(true, &grid(25.0), ms(700));
        assert_eq!(t.stationary_duration(), ms(100));
    }

    #[test]
    fn detection_loss_and_count_change_reset() {
        let mut t = tracker();
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(0.0), ms(300));
        t.update(false, &[], ms(400));
        assert_eq!(t.stationary_time(), 0.0);

        t.update(true, &grid(0.0), ms(500));
        t.update(true, &grid(0.0), ms(600));
        t.update(true, &grid(0.0)[..8], ms(700));
        assert_eq!(t.stationary_time(), 0.0);
    }

    #[test]
    fn image_size_change_resets_and_retunes() {
        let mut t = tracker();
        assert!((t.tolerance() - 3.2).abs() < 1e-12);
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(0.0), ms(800));

        t.set_image_size(640, 480);
        assert_eq!(t.stationary_duration(), ms(800));

        t.set_image_size(1920, 1080);
        assert!((t.tolerance() - 9.6).abs() < 1e-12);
        assert_eq!(t.stationary_time(), 0.0);

        // The next frame only re-anchors, even at the same pose.
        t.update(true, &grid(0.0), ms(900));
        assert_eq!(t.stationary_time(), 0.0);
        t.update(true, &grid(5.0), ms(1000));
        assert_eq!(t.stationary_duration(), ms(100));
    }

    #[test]
    fn drift_is_measured_from_the_anchor() {
        let mut t = tracker();
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(1.5), ms(100));
        t.update(true, &grid(3.0), ms(200));
        assert_eq!(t.stationary_duration(), ms(200));
        // Each step is 1.5px, but the pose is now 4.5px from the anchor.
        t.update(true, &grid(4.5), ms(300));
        assert_eq!(t.stationary_time(), 0.0);
    }

    #[test]
    fn manual_reset_keeps_reference_pose() {
        let mut t = tracker();
        t.update(true, &grid(0.0), ms(0));
        t.update(true, &grid(0.0), ms(1000));
        t.reset_stationary();
        assert_eq!(t.stationary_time(), 0.0);
        t.update(true, &grid(0.0), ms(1100));
        assert_eq!(t.stationary_duration(), ms(100));
    }
}

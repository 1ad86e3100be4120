//! Geometric diversity scoring for calibration captures.
//!
//! A linear intrinsic estimate (Zhang's method) only works when the target
//! has been seen from sufficiently different orientations. The score
//! exposed here measures how well the accumulated views constrain that
//! linear system: `0` means degenerate, `>= 1` means diverse enough.
//!
//! The guidance state machine only depends on the [`GeometryScore`] trait;
//! [`ZhangGeometryScore`] is the reference implementation.

mod params;
mod zhang;

use calib_assist_core::CalibrationObservation;

pub use params::GeometryScoreParams;
pub use zhang::{ScoreError, ZhangGeometryScore};

/// Accumulates captured observations and reports a coverage score.
///
/// Implementations must tolerate `score()` before any observation (returning
/// a low value) and must never decrease the score when observations are added.
pub trait GeometryScore {
    /// Incorporate the full point set of one accepted capture.
    fn add_observation(&mut self, observation: &CalibrationObservation);

    /// Normalized diversity; `>= 1.0` means sufficient.
    fn score(&self) -> f64;
}

impl<T: GeometryScore + ?Sized> GeometryScore for Box<T> {
    fn add_observation(&mut self, observation: &CalibrationObservation) {
        (**self).add_observation(observation)
    }

    fn score(&self) -> f64 {
        (**self).score()
    }
}

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Corner points observed on a calibration target in one frame.
///
/// Points are in pixel coordinates and follow the target layout order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationObservation {
    pub points: Vec<Point2<f64>>,
}

impl CalibrationObservation {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Point at `(row, col)` of a `cols`-wide point grid.
    #[inline]
    pub fn grid_point(&self, row: usize, col: usize, cols: usize) -> Option<Point2<f64>> {
        self.points.get(row * cols + col).copied()
    }

    /// Mean Euclidean displacement to `other`, `None` if the counts differ.
    pub fn mean_displacement(&self, other: &[Point2<f64>]) -> Option<f64> {
        if self.points.len() != other.len() || other.is_empty() {
            return None;
        }
        let total: f64 = self
            .points
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b).norm())
            .sum();
        Some(total / other.len() as f64)
    }
}

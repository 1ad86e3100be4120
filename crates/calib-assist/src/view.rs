//! Target-specific interpretation of a detected point grid.

use crate::guidance::GuidanceError;
use calib_assist_core::{CalibrationObservation, Quad, TargetKind, TargetSpec};

/// How the guidance reads the outline and border size of a target.
///
/// Only targets whose outer points form a rectangle in target space are
/// supported.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationView {
    Chessboard {
        point_rows: usize,
        point_cols: usize,
    },
    SquareGrid {
        point_rows: usize,
        point_cols: usize,
        squares_per_row: usize,
        space_ratio: f64,
    },
}

impl CalibrationView {
    /// Select the view for a detector's target.
    pub fn for_target(target: &TargetSpec) -> Result<Self, GuidanceError> {
        target.validate()?;
        let (point_rows, point_cols) = target.point_grid();
        match target.kind {
            TargetKind::Chessboard => Ok(Self::Chessboard {
                point_rows,
                point_cols,
            }),
            TargetKind::SquareGrid => Ok(Self::SquareGrid {
                point_rows,
                point_cols,
                squares_per_row: target.cols as usize,
                space_ratio: target.space_size / target.square_size,
            }),
            kind => Err(GuidanceError::UnsupportedTarget(kind)),
        }
    }

    fn point_grid(&self) -> (usize, usize) {
        match *self {
            Self::Chessboard {
                point_rows,
                point_cols,
            }
            | Self::SquareGrid {
                point_rows,
                point_cols,
                ..
            } => (point_rows, point_cols),
        }
    }

    /// Outer corners of the observed grid: top-left, top-right,
    /// bottom-right, bottom-left in target coordinates.
    ///
    /// `None` when the observation does not hold a full grid.
    pub fn sides(&self, obs: &CalibrationObservation) -> Option<Quad> {
        let (rows, cols) = self.point_grid();
        if rows == 0 || cols == 0 || obs.len() != rows * cols {
            return None;
        }
        Some([
            obs.grid_point(0, 0, cols)?,
            obs.grid_point(0, cols - 1, cols)?,
            obs.grid_point(rows - 1, cols - 1, cols)?,
            obs.grid_point(rows - 1, 0, cols)?,
        ])
    }

    /// Width in pixels of one square when the outline is `canonical_width`
    /// pixels wide.
    pub fn buffer_width(&self, canonical_width: f64) -> f64 {
        match *self {
            Self::Chessboard { point_cols, .. } => {
                canonical_width / point_cols.saturating_sub(1).max(1) as f64
            }
            Self::SquareGrid {
                squares_per_row,
                space_ratio,
                ..
            } => {
                let n = squares_per_row as f64;
                canonical_width / (n + (n - 1.0) * space_ratio)
            }
        }
    }
}

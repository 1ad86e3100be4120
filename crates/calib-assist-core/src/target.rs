use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// The kind of planar calibration target a detector looks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Chessboard,
    SquareGrid,
    CircleRegular,
    CircleHexagonal,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("target needs at least {min} rows and columns (got {rows}x{cols})")]
    TooSmall { rows: u32, cols: u32, min: u32 },
    #[error("target dimensions must be finite and positive (square={square}, space={space})")]
    InvalidSize { square: f64, space: f64 },
    #[error("no point layout defined for {0:?} targets")]
    UnsupportedLayout(TargetKind),
}

/// Physical description of a calibration target.
///
/// `rows`/`cols` count squares for chessboards and square grids, and
/// circles for circle grids.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub kind: TargetKind,
    pub rows: u32,
    pub cols: u32,
    /// Square side length, or circle diameter, in target units.
    pub square_size: f64,
    /// Gap between squares, or circle center spacing, in target units.
    #[serde(default)]
    pub space_size: f64,
}

impl TargetSpec {
    pub fn chessboard(rows: u32, cols: u32, square_size: f64) -> Self {
        Self {
            kind: TargetKind::Chessboard,
            rows,
            cols,
            square_size,
            space_size: 0.0,
        }
    }

    pub fn square_grid(rows: u32, cols: u32, square_size: f64, space_size: f64) -> Self {
        Self {
            kind: TargetKind::SquareGrid,
            rows,
            cols,
            square_size,
            space_size,
        }
    }

    /// Shape `(point_rows, point_cols)` of the observed point grid.
    pub fn point_grid(&self) -> (usize, usize) {
        let (r, c) = (self.rows as usize, self.cols as usize);
        match self.kind {
            TargetKind::Chessboard => (r.saturating_sub(1), c.saturating_sub(1)),
            TargetKind::SquareGrid => (2 * r, 2 * c),
            TargetKind::CircleRegular | TargetKind::CircleHexagonal => (r, c),
        }
    }

    pub fn point_count(&self) -> usize {
        let (r, c) = self.point_grid();
        r * c
    }

    pub fn validate(&self) -> Result<(), TargetError> {
        let min = match self.kind {
            TargetKind::Chessboard => 3,
            _ => 2,
        };
        if self.rows < min || self.cols < min {
            return Err(TargetError::TooSmall {
                rows: self.rows,
                cols: self.cols,
                min,
            });
        }
        let needs_space = matches!(
            self.kind,
            TargetKind::SquareGrid | TargetKind::CircleRegular | TargetKind::CircleHexagonal
        );
        let bad_square = !self.square_size.is_finite() || self.square_size <= 0.0;
        let bad_space = needs_space && (!self.space_size.is_finite() || self.space_size <= 0.0);
        if bad_square || bad_space {
            return Err(TargetError::InvalidSize {
                square: self.square_size,
                space: self.space_size,
            });
        }
        Ok(())
    }

    /// Point positions in target units, row-major from the top-left point.
    ///
    /// The order matches the order detectors report observations in.
    pub fn layout(&self) -> Result<Vec<Point2<f64>>, TargetError> {
        self.validate()?;
        let (pr, pc) = self.point_grid();
        let sq = self.square_size;
        let mut out = Vec::with_capacity(pr * pc);
        match self.kind {
            TargetKind::Chessboard => {
                for r in 0..pr {
                    for c in 0..pc {
                        out.push(Point2::new(c as f64 * sq, r as f64 * sq));
                    }
                }
            }
            TargetKind::SquareGrid => {
                let pitch = sq + self.space_size;
                let coord = |i: usize| (i / 2) as f64 * pitch + (i % 2) as f64 * sq;
                for r in 0..pr {
                    for c in 0..pc {
                        out.push(Point2::new(coord(c), coord(r)));
                    }
                }
            }
            TargetKind::CircleRegular => {
                for r in 0..pr {
                    for c in 0..pc {
                        out.push(Point2::new(
                            c as f64 * self.space_size,
                            r as f64 * self.space_size,
                        ));
                    }
                }
            }
            TargetKind::CircleHexagonal => return Err(TargetError::UnsupportedLayout(self.kind)),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chessboard_layout_is_inner_corners_row_major() {
        let spec = TargetSpec::chessboard(4, 5, 30.0);
        let layout = spec.layout().expect("layout");
        assert_eq!(spec.point_grid(), (3, 4));
        assert_eq!(layout.len(), 12);
        assert_eq!(layout[0], Point2::new(0.0, 0.0));
        assert_eq!(layout[3], Point2::new(90.0, 0.0));
        assert_eq!(layout[11], Point2::new(90.0, 60.0));
    }

    #[test]
    fn square_grid_layout_has_four_corners_per_square() {
        let spec = TargetSpec::square_grid(2, 3, 10.0, 5.0);
        let layout = spec.layout().expect("layout");
        assert_eq!(layout.len(), 4 * 6);
        // Second row of points is the bottom edge of the first row of squares.
        assert_eq!(layout[6], Point2::new(0.0, 10.0));
        // Column 2 starts the second square.
        assert_eq!(layout[2], Point2::new(15.0, 0.0));
        assert_eq!(layout[5], Point2::new(40.0, 0.0));
    }

    #[test]
    fn rejects_degenerate_targets() {
        assert!(matches!(
            TargetSpec::chessboard(2, 5, 1.0).validate(),
            Err(TargetError::TooSmall { .. })
        ));
        assert!(matches!(
            TargetSpec::square_grid(3, 3, 1.0, 0.0).validate(),
            Err(TargetError::InvalidSize { .. })
        ));
    }

    #[test]
    fn spec_deserializes_from_json() {
        let spec: TargetSpec = serde_json::from_str(
            r#"{"kind":"chessboard","rows":7,"cols":9,"square_size":25.0}"#,
        )
        .expect("json");
        assert_eq!(spec, TargetSpec::chessboard(7, 9, 25.0));
    }
}

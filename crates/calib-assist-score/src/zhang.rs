use crate::{GeometryScore, GeometryScoreParams};
use calib_assist_core::{
    estimate_homography, CalibrationObservation, Homography, TargetError, TargetSpec,
};
use log::debug;
use nalgebra::{DMatrix, Point2, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("layout needs at least 4 points (got {0})")]
    LayoutTooSmall(usize),
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: usize, height: usize },
}

/// Similarity `p -> (p - c) / s` applied to both sides of the homography.
#[derive(Clone, Copy, Debug)]
struct Normalizer {
    cx: f64,
    cy: f64,
    scale: f64,
}

impl Normalizer {
    fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx) / self.scale, (p.y - self.cy) / self.scale)
    }
}

/// Diversity score from the conditioning of Zhang's linear system.
///
/// Each accepted view contributes two rows constraining the image of the
/// absolute conic `B`. A well-posed system has a one-dimensional null space;
/// the second-smallest singular value measures how far it is from having a
/// second one, which is what happens for frontal or repeated poses.
#[derive(Clone, Debug)]
pub struct ZhangGeometryScore {
    params: GeometryScoreParams,
    layout: Vec<Point2<f64>>,
    image_norm: Normalizer,
    rows: Vec<[f64; 6]>,
    views: usize,
    score: f64,
}

impl ZhangGeometryScore {
    /// Build a scorer for a target layout seen by a `width x height` camera.
    pub fn new(
        layout: &[Point2<f64>],
        width: usize,
        height: usize,
        params: GeometryScoreParams,
    ) -> Result<Self, ScoreError> {
        if layout.len() < 4 {
            return Err(ScoreError::LayoutTooSmall(layout.len()));
        }
        if width == 0 || height == 0 {
            return Err(ScoreError::InvalidImageSize { width, height });
        }

        let n = layout.len() as f64;
        let cx = layout.iter().map(|p| p.x).sum::<f64>() / n;
        let cy = layout.iter().map(|p| p.y).sum::<f64>() / n;
        let extent = layout
            .iter()
            .map(|p| (p.x - cx).abs().max((p.y - cy).abs()))
            .fold(0.0_f64, f64::max);
        let layout_norm = Normalizer {
            cx,
            cy,
            scale: if extent > 0.0 { extent } else { 1.0 },
        };

        let image_norm = Normalizer {
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            scale: width.max(height) as f64 / 2.0,
        };

        Ok(Self {
            params,
            layout: layout.iter().map(|p| layout_norm.apply(p)).collect(),
            image_norm,
            rows: Vec::new(),
            views: 0,
            score: 0.0,
        })
    }

    /// Convenience constructor from a target description.
    pub fn for_target(
        target: &TargetSpec,
        width: usize,
        height: usize,
        params: GeometryScoreParams,
    ) -> Result<Self, ScoreError> {
        let layout = target.layout()?;
        Self::new(&layout, width, height, params)
    }

    /// Number of observations that contributed constraints.
    pub fn view_count(&self) -> usize {
        self.views
    }

    pub fn params(&self) -> &GeometryScoreParams {
        &self.params
    }

    fn push_constraints(&mut self, h: &Homography) {
        let v12 = conic_row(h, 0, 1);
        let v11 = conic_row(h, 0, 0);
        let v22 = conic_row(h, 1, 1);
        self.rows.push(v12);
        self.rows.push(std::array::from_fn(|k| v11[k] - v22[k]));
    }

    fn second_smallest_singular_value(&self) -> f64 {
        let skip_skew = self.params.zero_skew;
        let cols = if skip_skew { 5 } else { 6 };
        if self.rows.is_empty() {
            return 0.0;
        }

        let a = DMatrix::<f64>::from_fn(self.rows.len(), cols, |r, c| {
            let src = if skip_skew && c >= 1 { c + 1 } else { c };
            self.rows[r][src]
        });
        let svd = a.svd(false, false);

        // Rank-deficient (short) systems have implicit zero singular values.
        let mut sv: Vec<f64> = svd.singular_values.iter().copied().collect();
        sv.resize(cols.max(sv.len()), 0.0);
        sv.sort_by(f64::total_cmp);
        sv[1]
    }
}

/// Zhang's `v_ij` row: `h_i^T B h_j = v_ij^T b` with
/// `b = [B11, B12, B22, B13, B23, B33]`.
fn conic_row(h: &Homography, i: usize, j: usize) -> [f64; 6] {
    let hi: Vector3<f64> = h.h.column(i).into_owned();
    let hj: Vector3<f64> = h.h.column(j).into_owned();
    [
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ]
}

impl GeometryScore for ZhangGeometryScore {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, observation), fields(points = observation.len()))
    )]
    fn add_observation(&mut self, observation: &CalibrationObservation) {
        if observation.len() != self.layout.len() {
            debug!(
                "skipping observation with {} points (layout has {})",
                observation.len(),
                self.layout.len()
            );
            return;
        }

        let image: Vec<Point2<f64>> = observation
            .points
            .iter()
            .map(|p| self.image_norm.apply(p))
            .collect();
        let Some(h) = estimate_homography(&self.layout, &image)
            .and_then(|h| h.frobenius_normalized())
        else {
            debug!("skipping observation: degenerate homography");
            return;
        };

        self.push_constraints(&h);
        self.views += 1;

        let sigma = self.second_smallest_singular_value();
        // Adding rows never shrinks the spectrum; the max guards rounding.
        self.score = self.score.max(sigma / self.params.min_singular_value);
        debug!(
            "geometry score {:.3} after {} views (sigma2={:.2e})",
            self.score, self.views, sigma
        );
    }

    fn score(&self) -> f64 {
        self.score
    }
}

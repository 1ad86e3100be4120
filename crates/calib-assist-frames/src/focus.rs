//! Blur metric for rectified target patches.
//!
//! Candidates are rectified into a square patch and compared to a template
//! captured while the target was held still and frontal. The error is a mean
//! squared difference weighted by the template's gradient magnitude, so only
//! the target's edges count. Lower is sharper.

use calib_assist_core::{homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView, Quad};
use nalgebra::Point2;

/// Rectify the region bounded by `corners` into a `size x size` patch.
///
/// Returns `None` for degenerate quadrilaterals.
pub fn rectify_patch(frame: &GrayImageView<'_>, corners: &Quad, size: usize) -> Option<GrayImage> {
    let s = size as f64;
    let patch = [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ];
    let h = homography_from_4pt(&patch, corners)?;
    Some(warp_perspective_gray(frame, h, size, size))
}

/// Zero-mean, unit-variance copy of the patch; flat patches map to zeros.
fn standardize(img: &GrayImage) -> Vec<f32> {
    let n = img.data.len().max(1) as f32;
    let mean = img.data.iter().map(|&v| v as f32).sum::<f32>() / n;
    let var = img
        .data
        .iter()
        .map(|&v| (v as f32 - mean).powi(2))
        .sum::<f32>()
        / n;
    let std = var.sqrt();
    if std < 1e-3 {
        return vec![0.0; img.data.len()];
    }
    img.data.iter().map(|&v| (v as f32 - mean) / std).collect()
}

fn gradient_magnitude(values: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = values[y * w + x + 1] - values[y * w + x - 1];
            let gy = values[(y + 1) * w + x] - values[(y - 1) * w + x];
            out[y * w + x] = 0.5 * (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

/// Reference appearance of the target.
#[derive(Clone, Debug)]
pub struct FocusTemplate {
    patch: GrayImage,
    standardized: Vec<f32>,
    weights: Vec<f32>,
    weight_sum: f32,
}

impl FocusTemplate {
    pub fn from_patch(patch: GrayImage) -> Self {
        let standardized = standardize(&patch);
        let weights = gradient_magnitude(&standardized, patch.width, patch.height);
        let weight_sum = weights.iter().sum();
        Self {
            patch,
            standardized,
            weights,
            weight_sum,
        }
    }

    pub fn patch(&self) -> &GrayImage {
        &self.patch
    }

    /// Edge-weighted mean squared difference to a candidate patch of the
    /// same size. `f64::INFINITY` when the sizes differ.
    pub fn blur_error(&self, candidate: &GrayImage) -> f64 {
        if candidate.width != self.patch.width || candidate.height != self.patch.height {
            return f64::INFINITY;
        }
        if self.weight_sum <= f32::EPSILON {
            return laplacian_blur_error(candidate);
        }
        let cand = standardize(candidate);
        let sum: f32 = self
            .standardized
            .iter()
            .zip(&cand)
            .zip(&self.weights)
            .map(|((t, c), w)| w * (t - c).powi(2))
            .sum();
        (sum / self.weight_sum) as f64
    }
}

/// Variance of the 4-neighbour Laplacian. Higher means more high-frequency
/// content.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = (img.width, img.height);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut values = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = img.get(x, y) as i32;
            let lap = img.get(x, y - 1) as i32
                + img.get(x, y + 1) as i32
                + img.get(x - 1, y) as i32
                + img.get(x + 1, y) as i32
                - 4 * c;
            values.push(lap as f64);
        }
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Template-free fallback: `1 / (1 + laplacian variance)`.
pub fn laplacian_blur_error(img: &GrayImage) -> f64 {
    1.0 / (1.0 + laplacian_variance(img))
}

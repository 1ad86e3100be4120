//! Geometry of the target outline quadrilateral.
//!
//! A [`Quad`] holds the four outer corners of an observed target in the order
//! top-left, top-right, bottom-right, bottom-left (target coordinates, so
//! the winding is stable across frames even when the image is rotated).

use nalgebra::Point2;

pub type Quad = [Point2<f64>; 4];

/// Side lengths as `[top, right, bottom, left]`.
pub fn side_lengths(q: &Quad) -> [f64; 4] {
    [
        (q[1] - q[0]).norm(),
        (q[2] - q[1]).norm(),
        (q[3] - q[2]).norm(),
        (q[0] - q[3]).norm(),
    ]
}

/// `min/max` ratios of opposite sides: `(horizontal, vertical)`.
///
/// A frontal, undistorted view gives `(1, 1)`.
pub fn skew_ratios(q: &Quad) -> (f64, f64) {
    let [top, right, bottom, left] = side_lengths(q);
    (ratio(top, bottom), ratio(left, right))
}

fn ratio(a: f64, b: f64) -> f64 {
    let hi = a.max(b);
    if hi <= 0.0 {
        return 0.0;
    }
    a.min(b) / hi
}

/// Midpoints of the four edges, `[left, top, right, bottom]`.
pub fn edge_midpoints(q: &Quad) -> [Point2<f64>; 4] {
    std::array::from_fn(|i| {
        let j = (i + 3) % 4;
        nalgebra::center(&q[i], &q[j])
    })
}

/// Closest corner of `q` to `target` and its distance.
pub fn closest_corner(q: &Quad, target: &Point2<f64>) -> (Point2<f64>, f64) {
    closest_of(q, target)
}

/// Closest edge midpoint of `q` to `target` and its distance.
pub fn closest_edge_midpoint(q: &Quad, target: &Point2<f64>) -> (Point2<f64>, f64) {
    closest_of(&edge_midpoints(q), target)
}

fn closest_of(candidates: &[Point2<f64>; 4], target: &Point2<f64>) -> (Point2<f64>, f64) {
    let mut best = candidates[0];
    let mut best_d2 = f64::MAX;
    for p in candidates {
        let d2 = (p - target).norm_squared();
        if d2 < best_d2 {
            best_d2 = d2;
            best = *p;
        }
    }
    (best, best_d2.sqrt())
}

use calib_assist_core::quad::{closest_corner, closest_edge_midpoint};
use calib_assist_core::Quad;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Which feature of the target outline a magnet attracts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetKind {
    Corner,
    EdgeMidpoint,
}

/// Fixed image location the user must bring a target feature to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Magnet {
    pub location: Point2<f64>,
    pub kind: MagnetKind,
    /// The matching feature was in range on the last detected frame.
    pub close: bool,
    /// Matching feature seen on the last detected frame.
    pub closest: Option<Point2<f64>>,
}

impl Magnet {
    pub fn new(x: f64, y: f64, kind: MagnetKind) -> Self {
        Self {
            location: Point2::new(x, y),
            kind,
            close: false,
            closest: None,
        }
    }

    /// Nearest matching outline feature and its distance.
    pub fn closest_feature(&self, sides: &Quad) -> (Point2<f64>, f64) {
        match self.kind {
            MagnetKind::Corner => closest_corner(sides, &self.location),
            MagnetKind::EdgeMidpoint => closest_edge_midpoint(sides, &self.location),
        }
    }

    /// Whether the outline reaches this magnet within `reach` pixels.
    pub fn is_reached(&self, sides: &Quad, reach: f64) -> bool {
        self.closest_feature(sides).1 <= reach
    }

    /// Refresh `close`/`closest` from a detected outline.
    pub fn update(&mut self, sides: &Quad, reach: f64) -> bool {
        let (closest, distance) = self.closest_feature(sides);
        self.closest = Some(closest);
        self.close = distance <= reach;
        self.close
    }

    pub fn lost(&mut self) {
        self.close = false;
    }
}

/// Visual magnet radius: `max(min_radius, floor(min(width, height) / divisor))`.
pub fn magnet_radius(width: usize, height: usize, min_radius: f64, divisor: f64) -> f64 {
    (width.min(height) as f64 / divisor).floor().max(min_radius)
}

/// The eight magnets placed `padding` pixels inside the image border:
/// top, bottom, left and right edge midpoints followed by the top-left,
/// bottom-left, bottom-right and top-right corners.
pub fn magnet_layout(width: usize, height: usize, padding: f64) -> Vec<Magnet> {
    let (w, h) = (width as f64, height as f64);
    let (cx, cy) = ((width / 2) as f64, (height / 2) as f64);
    let p = padding;
    vec![
        Magnet::new(cx, p, MagnetKind::EdgeMidpoint),
        Magnet::new(cx, h - p, MagnetKind::EdgeMidpoint),
        Magnet::new(p, cy, MagnetKind::EdgeMidpoint),
        Magnet::new(w - p, cy, MagnetKind::EdgeMidpoint),
        Magnet::new(p, p, MagnetKind::Corner),
        Magnet::new(p, h - p, MagnetKind::Corner),
        Magnet::new(w - p, h - p, MagnetKind::Corner),
        Magnet::new(w - p, p, MagnetKind::Corner),
    ]
}

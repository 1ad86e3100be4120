//! Declarative drawing directives produced once per frame.
//!
//! The guidance never draws; a front end renders these shapes over the
//! camera frame, in order.

use crate::guidance::MagnetKind;
use calib_assist_core::Quad;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    /// Translucent cyan tint of captured regions.
    pub const REGION: Self = Self::rgba(0, 255, 255, 50);
}

/// Hint pointing from a target feature toward its magnet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub origin: Point2<f64>,
    pub vector: Vector2<f64>,
    pub color: Rgba,
}

impl Arrow {
    const SHAFT: f64 = 0.07;
    const HEAD_START: f64 = 0.7;

    /// Outline of the arrow: shaft base, shaft, head barbs and tip. Widths
    /// scale with the arrow length.
    pub fn polygon(&self) -> [Point2<f64>; 7] {
        let v = self.vector;
        let tan = Vector2::new(-v.y, v.x);
        let w = Self::SHAFT;
        let at = |along: f64, across: f64| self.origin + v * along + tan * across;
        [
            at(0.0, -w),
            at(0.0, w),
            at(Self::HEAD_START, w),
            at(Self::HEAD_START, 3.0 * w),
            at(1.0, 0.0),
            at(Self::HEAD_START, -3.0 * w),
            at(Self::HEAD_START, -w),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Overlay {
    /// Outline of the padded border the target should reach.
    BorderGuide {
        min: Point2<f64>,
        max: Point2<f64>,
        color: Rgba,
    },
    /// Filled disc with a dark rim.
    Magnet {
        center: Point2<f64>,
        radius: f64,
        kind: MagnetKind,
        fill: Rgba,
        outline: Rgba,
        stroke_width: f64,
    },
    Arrow(Arrow),
    /// Marker on a detected calibration point.
    DetectionPoint {
        center: Point2<f64>,
        radius: f64,
        filled: bool,
        color: Rgba,
    },
    /// Outline of a previous capture.
    FillRegion { polygon: Quad, color: Rgba },
}

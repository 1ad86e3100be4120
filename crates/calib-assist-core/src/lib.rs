//! Core types and utilities for assisted camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete fiducial detector, UI toolkit or image codec.

mod homography;
mod image;
mod logger;
mod observation;
pub mod quad;
mod target;

pub use homography::{estimate_homography, homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use observation::CalibrationObservation;
pub use quad::Quad;
pub use target::{TargetError, TargetKind, TargetSpec};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};

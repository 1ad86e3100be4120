//! Assisted camera calibration.
//!
//! Guides a person holding a planar calibration target in front of a live
//! camera until the captured image set is good enough for calibration:
//! the target has been seen near every image border and corner, from
//! sufficiently different orientations, and each saved image is the
//! sharpest frame of a still period.
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_assist::{AssistedCalibration, Frame, GuidanceParams, NullUi};
//! use calib_assist::score::{GeometryScoreParams, ZhangGeometryScore};
//! # use calib_assist::CalibrationDetector;
//! # fn run<D: CalibrationDetector>(detector: D, frames: &[calib_assist::core::GrayImage])
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let scorer = ZhangGeometryScore::for_target(detector.target(), 640, 480, GeometryScoreParams::default())?;
//! let mut session = AssistedCalibration::new(detector, scorer, NullUi, GuidanceParams::default())?;
//! for (i, img) in frames.iter().enumerate() {
//!     let t = std::time::Duration::from_millis(33 * i as u64);
//!     let report = session.process(&Frame::new(img.view(), t));
//!     println!("{:?}: {}", report.phase, report.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `calib_assist::core`: images, homographies, target layouts, outlines.
//! - `calib_assist::score`: geometric diversity scoring.
//! - `calib_assist::frames`: blur metric and best-frame selection.
//! - [`guidance`]: the capture protocol, overlays and front-end trait.
//! - [`io`] / [`replay`]: JSON configs, recorded sessions and their replay.

pub use calib_assist_core as core;
pub use calib_assist_frames as frames;
pub use calib_assist_score as score;

mod detector;
pub mod guidance;
pub mod io;
pub mod replay;
mod stationarity;
mod view;

pub use detector::CalibrationDetector;
pub use guidance::{
    AssistedCalibration, CaptureEvent, Frame, FrameReport, GuidanceError, GuidanceParams,
    GuidanceUi, NullUi, Overlay, Phase,
};
pub use stationarity::{StationarityParams, StationarityTracker};
pub use view::CalibrationView;

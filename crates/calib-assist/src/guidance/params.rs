use crate::stationarity::StationarityParams;
use calib_assist_frames::FrameSelectorParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Thresholds and output layout of a guidance session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceParams {
    /// Minimum `min/max` ratio of opposite sides for a frontal view.
    pub center_skew: f64,
    /// Seconds the target must be held still before a capture.
    pub still_threshold: f64,
    /// Seconds of stillness after which the countdown is shown.
    pub display_time: f64,
    /// Border padding as a multiple of the target's square width.
    pub padding_scale: f64,
    /// Smallest magnet radius in pixels.
    pub magnet_radius_min: f64,
    /// Magnet radius as a fraction (`1 / divisor`) of the smaller image side.
    pub magnet_radius_divisor: f64,
    /// A magnet is reached within `capture_radius_scale * radius` pixels.
    pub capture_radius_scale: f64,
    /// Arrows are drawn within `arrow_radius_scale * radius` pixels.
    pub arrow_radius_scale: f64,
    /// Session directory; wiped when the session starts.
    pub output_dir: PathBuf,
    /// Subdirectory of `output_dir` receiving the selected images.
    pub image_subdir: String,
    /// File name (inside `output_dir`) of on-demand debug saves.
    pub debug_save_name: String,
    pub stationarity: StationarityParams,
    pub selector: FrameSelectorParams,
}

impl Default for GuidanceParams {
    fn default() -> Self {
        Self {
            center_skew: 0.93,
            still_threshold: 2.0,
            display_time: 0.5,
            padding_scale: 1.1,
            magnet_radius_min: 5.0,
            magnet_radius_divisor: 30.0,
            capture_radius_scale: 2.0,
            arrow_radius_scale: 10.0,
            output_dir: PathBuf::from("calibration_data"),
            image_subdir: "images".to_string(),
            debug_save_name: "debug_save.png".to_string(),
            stationarity: StationarityParams::default(),
            selector: FrameSelectorParams::default(),
        }
    }
}

impl GuidanceParams {
    /// Directory receiving `image0000.png`, `image0001.png`, ...
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(&self.image_subdir)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

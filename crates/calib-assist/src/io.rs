//! JSON configuration, recordings and reports for session replay.

use crate::guidance::{CaptureEvent, GuidanceParams, Phase};
use calib_assist_core::{CalibrationObservation, TargetSpec};
use calib_assist_frames::FrameStoreError;
use calib_assist_score::GeometryScoreParams;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ReplayIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] FrameStoreError),
}

fn load<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T, ReplayIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn store<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), ReplayIoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Configuration of the `replay` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Recording to replay, relative to the config file.
    pub recording_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Overrides `guidance.output_dir`.
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub guidance: Option<GuidanceParams>,
    #[serde(default)]
    pub score: Option<GeometryScoreParams>,
    /// Press "finish" as soon as it becomes available and stop the replay.
    #[serde(default)]
    pub finish_when_ready: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            recording_path: "recording.json".to_string(),
            output_path: None,
            output_dir: None,
            guidance: Some(GuidanceParams::default()),
            score: Some(GeometryScoreParams::default()),
            finish_when_ready: false,
        }
    }
}

impl ReplayConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayIoError> {
        load(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayIoError> {
        store(self, path)
    }

    /// Resolve the report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("calib_assist_report.json"))
    }

    /// Guidance parameters with the config overrides applied.
    pub fn build_params(&self) -> GuidanceParams {
        let mut params = self.guidance.clone().unwrap_or_default();
        if let Some(dir) = &self.output_dir {
            params.output_dir = PathBuf::from(dir);
        }
        params
    }

    pub fn score_params(&self) -> GeometryScoreParams {
        self.score.unwrap_or_default()
    }
}

/// One recorded camera frame with the detector output for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: u64,
    pub detected: bool,
    #[serde(default)]
    pub points: Vec<Point2<f64>>,
    /// Grayscale image of the frame, relative to the recording.
    #[serde(default)]
    pub image_path: Option<String>,
}

impl RecordedFrame {
    /// Detector output for this frame; empty when nothing was detected.
    pub fn observation(&self) -> CalibrationObservation {
        if self.detected {
            CalibrationObservation::new(self.points.clone())
        } else {
            CalibrationObservation::default()
        }
    }
}

/// A session captured for offline replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecording {
    pub target: TargetSpec,
    pub width: usize,
    pub height: usize,
    pub frames: Vec<RecordedFrame>,
}

impl ReplayRecording {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayIoError> {
        load(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayIoError> {
        store(self, path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub index: usize,
    pub timestamp_ms: u64,
    pub phase: Phase,
    pub detected: bool,
    pub message: String,
    pub captured: bool,
    /// Number of overlay primitives shown for the frame.
    #[serde(default)]
    pub overlay_count: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub recording_path: String,
    pub target: TargetSpec,
    pub frames: Vec<FrameSummary>,
    pub captures: Vec<CaptureEvent>,
    pub phase: Phase,
    pub magnets_remaining: usize,
    pub final_score: f64,
    /// Focus error of the last frame scored by the selector.
    #[serde(default)]
    pub focus_score: f64,
    /// Fraction of border magnets cleared.
    #[serde(default)]
    pub edge_fill: f64,
    pub geometry_sufficient: bool,
    pub finish_enabled: bool,
    pub finished: bool,
}

impl ReplayReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayIoError> {
        load(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayIoError> {
        store(self, path)
    }
}

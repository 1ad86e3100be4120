//! Offline replay of recorded sessions.
//!
//! A recording holds, per frame, the timestamp and what the fiducial
//! detector reported. Replaying it through [`AssistedCalibration`] gives the
//! exact guidance a live user would have seen, which makes threshold tuning
//! reproducible.

use crate::detector::CalibrationDetector;
use crate::guidance::{AssistedCalibration, Frame, GuidanceError, GuidanceUi, Overlay};
use crate::io::{FrameSummary, RecordedFrame, ReplayConfig, ReplayIoError, ReplayRecording, ReplayReport};
use calib_assist_core::{CalibrationObservation, GrayImage, GrayImageView, TargetSpec};
use calib_assist_frames::read_gray;
use calib_assist_score::{ScoreError, ZhangGeometryScore};
use log::{debug, info, trace};
use std::path::Path;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] ReplayIoError),
    #[error(transparent)]
    Guidance(#[from] GuidanceError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Detector that plays back recorded detections, one per `process` call.
#[derive(Clone, Debug)]
pub struct ReplayDetector {
    target: TargetSpec,
    frames: Vec<RecordedFrame>,
    cursor: usize,
    observation: CalibrationObservation,
}

impl ReplayDetector {
    pub fn new(target: TargetSpec, frames: Vec<RecordedFrame>) -> Self {
        Self {
            target,
            frames,
            cursor: 0,
            observation: CalibrationObservation::default(),
        }
    }

    pub fn from_recording(recording: &ReplayRecording) -> Self {
        Self::new(recording.target, recording.frames.clone())
    }

    /// Recorded frames not yet played.
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl CalibrationDetector for ReplayDetector {
    fn target(&self) -> &TargetSpec {
        &self.target
    }

    fn process(&mut self, _image: &GrayImageView<'_>) -> bool {
        let Some(frame) = self.frames.get(self.cursor) else {
            self.observation.clear();
            return false;
        };
        self.cursor += 1;
        self.observation = frame.observation();
        frame.detected
    }

    fn detected_points(&self) -> &CalibrationObservation {
        &self.observation
    }
}

/// Front end that logs guidance changes and keeps the latest indicators.
#[derive(Clone, Debug, Default)]
pub struct LoggingUi {
    finish_when_ready: bool,
    message: String,
    overlay_count: usize,
    focus_score: f64,
    edge_fill: f64,
    finish_enabled: bool,
    finished: bool,
    force_save: bool,
}

impl LoggingUi {
    /// With `finish_when_ready`, finishing happens as soon as it is enabled.
    pub fn new(finish_when_ready: bool) -> Self {
        Self {
            finish_when_ready,
            ..Self::default()
        }
    }

    pub fn overlay_count(&self) -> usize {
        self.overlay_count
    }

    pub fn focus_score(&self) -> f64 {
        self.focus_score
    }

    pub fn edge_fill(&self) -> f64 {
        self.edge_fill
    }

    pub fn finish_enabled(&self) -> bool {
        self.finish_enabled
    }

    /// Simulate the finish button; ignored until finishing is enabled.
    pub fn finish(&mut self) {
        self.finished = self.finish_enabled;
    }

    /// Simulate the "save this frame" button.
    pub fn request_force_save(&mut self) {
        self.force_save = true;
    }
}

impl GuidanceUi for LoggingUi {
    fn set_message(&mut self, message: &str) {
        if self.message != message {
            info!("{message}");
            self.message = message.to_string();
        }
    }

    fn set_overlays(&mut self, overlays: &[Overlay]) {
        trace!("{} overlays", overlays.len());
        self.overlay_count = overlays.len();
    }

    fn update_focus_score(&mut self, score: f64) {
        self.focus_score = score;
    }

    fn update_geometry(&mut self, score: f64) {
        info!("geometry {:.0}%", 100.0 * score.min(1.0));
    }

    fn update_edge_fill(&mut self, fill: f64) {
        info!("edge fill {:.0}%", 100.0 * fill);
        self.edge_fill = fill;
    }

    fn enable_finish(&mut self) {
        self.finish_enabled = true;
        if self.finish_when_ready {
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn take_force_save(&mut self) -> bool {
        std::mem::take(&mut self.force_save)
    }
}

/// Replay the recording named by `cfg`. Relative paths in the config are
/// resolved against `base_dir`; image paths in the recording against the
/// recording's directory.
pub fn run_replay(cfg: &ReplayConfig, base_dir: &Path) -> Result<ReplayReport, ReplayError> {
    let recording_path = base_dir.join(&cfg.recording_path);
    let recording = ReplayRecording::load_json(&recording_path)?;
    let recording_dir = recording_path.parent().unwrap_or(base_dir);

    let mut params = cfg.build_params();
    if params.output_dir.is_relative() {
        params.output_dir = base_dir.join(&params.output_dir);
    }

    let (w, h) = (recording.width, recording.height);
    let scorer = ZhangGeometryScore::for_target(&recording.target, w, h, cfg.score_params())?;
    let detector = ReplayDetector::from_recording(&recording);
    let ui = LoggingUi::new(cfg.finish_when_ready);
    let mut session = AssistedCalibration::new(detector, scorer, ui, params)?;

    info!(
        "replaying {} frames from {}",
        recording.frames.len(),
        recording_path.display()
    );
    let blank = GrayImage::filled(w, h, 128);
    let mut frames = Vec::with_capacity(recording.frames.len());
    for (index, rec) in recording.frames.iter().enumerate() {
        let loaded;
        let image = match &rec.image_path {
            Some(p) => {
                loaded = read_gray(&recording_dir.join(p)).map_err(ReplayIoError::from)?;
                loaded.view()
            }
            None => blank.view(),
        };

        let report = session.process(&Frame::new(image, Duration::from_millis(rec.timestamp_ms)));
        frames.push(FrameSummary {
            index,
            timestamp_ms: rec.timestamp_ms,
            phase: report.phase,
            detected: report.detected,
            message: report.message,
            captured: report.capture.is_some(),
            overlay_count: session.ui().overlay_count(),
            warnings: report.warnings,
        });

        if session.is_finished() {
            info!("session finished at frame {index}");
            break;
        }
    }
    debug!("{} captures", session.captures().len());

    Ok(ReplayReport {
        recording_path: recording_path.display().to_string(),
        target: recording.target,
        frames,
        captures: session.captures().to_vec(),
        phase: session.phase(),
        magnets_remaining: session.magnets().len(),
        final_score: session.score(),
        focus_score: session.ui().focus_score(),
        edge_fill: session.ui().edge_fill(),
        geometry_sufficient: session.geometry_sufficient(),
        finish_enabled: session.ui().finish_enabled(),
        finished: session.is_finished(),
    })
}

use crate::detector::CalibrationDetector;
use crate::guidance::magnet::{magnet_layout, magnet_radius, Magnet};
use crate::guidance::{Arrow, GuidanceError, GuidanceParams, GuidanceUi, Overlay, Rgba};
use crate::stationarity::StationarityTracker;
use crate::view::CalibrationView;
use calib_assist_core::quad::{side_lengths, skew_ratios};
use calib_assist_core::{CalibrationObservation, GrayImageView, Quad};
use calib_assist_frames::{write_png, BestFrameSelector};
use calib_assist_score::GeometryScore;
use log::{debug, info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

const POINT_MARKER_RADIUS: f64 = 6.0;

/// One camera frame with its capture time since the start of the stream.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub image: GrayImageView<'a>,
    pub timestamp: Duration,
}

impl<'a> Frame<'a> {
    pub fn new(image: GrayImageView<'a>, timestamp: Duration) -> Self {
        Self { image, timestamp }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    DetermineSize,
    RemoveDots,
    FillScreen,
}

/// Record of one accepted capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Zero-based capture number within the session.
    pub index: usize,
    pub timestamp: Duration,
    pub phase: Phase,
    /// Target outline at the moment of capture.
    pub corners: Quad,
    /// Points handed to the diversity scorer.
    pub observation: CalibrationObservation,
    /// Diversity score after this capture.
    pub score: f64,
    /// Saved image, if the write succeeded.
    pub image_path: Option<PathBuf>,
}

/// What one call to [`AssistedCalibration::process`] produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Phase after this frame.
    pub phase: Phase,
    pub detected: bool,
    pub message: String,
    pub overlays: Vec<Overlay>,
    pub capture: Option<CaptureEvent>,
    /// Non-fatal problems, e.g. images that could not be written.
    pub warnings: Vec<String>,
}

struct Detection {
    sides: Quad,
    observation: CalibrationObservation,
}

struct Step {
    message: String,
    overlays: Vec<Overlay>,
    capture: Option<CaptureEvent>,
}

impl Step {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            overlays: Vec::new(),
            capture: None,
        }
    }
}

/// Guided capture session.
///
/// Generic over the fiducial detector, the diversity scorer and the front
/// end. Feed every camera frame to [`process`](Self::process) in order.
pub struct AssistedCalibration<D, S, U> {
    params: GuidanceParams,
    detector: D,
    scorer: S,
    ui: U,
    view: CalibrationView,
    tracker: StationarityTracker,
    selector: BestFrameSelector,

    phase: Phase,
    image_size: (usize, usize),
    magnet_radius: f64,
    canonical_width: Option<f64>,
    padding: f64,
    magnets: Vec<Magnet>,
    total_magnets: usize,
    regions: Vec<Quad>,
    captures: Vec<CaptureEvent>,
    geometry_sufficient: bool,
    picture_taken: bool,
    finish_enabled: bool,
    edge_fill: f64,
    score: f64,
}

impl<D, S, U> AssistedCalibration<D, S, U>
where
    D: CalibrationDetector,
    S: GeometryScore,
    U: GuidanceUi,
{
    /// Start a session. Wipes `params.output_dir`.
    pub fn new(detector: D, scorer: S, ui: U, params: GuidanceParams) -> Result<Self, GuidanceError> {
        let view = CalibrationView::for_target(detector.target())?;

        let out = &params.output_dir;
        if out.exists() {
            info!("deleting output directory {}", out.display());
            fs::remove_dir_all(out).map_err(|source| GuidanceError::OutputDir {
                path: out.clone(),
                source,
            })?;
        }
        let selector = BestFrameSelector::new(params.images_dir(), params.selector.clone())?;
        let tracker = StationarityTracker::new(params.stationarity.clone());
        let magnet_radius = params.magnet_radius_min;

        Ok(Self {
            params,
            detector,
            scorer,
            ui,
            view,
            tracker,
            selector,
            phase: Phase::DetermineSize,
            image_size: (0, 0),
            magnet_radius,
            canonical_width: None,
            padding: 0.0,
            magnets: Vec::new(),
            total_magnets: 0,
            regions: Vec::new(),
            captures: Vec::new(),
            geometry_sufficient: false,
            picture_taken: false,
            finish_enabled: false,
            edge_fill: 0.0,
            score: 0.0,
        })
    }

    /// Advance the session by one frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(t = ?frame.timestamp, phase = ?self.phase))
    )]
    pub fn process(&mut self, frame: &Frame<'_>) -> FrameReport {
        self.set_image_size(frame.image.width, frame.image.height);

        let mut warnings = Vec::new();
        let usable = frame.image.is_consistent();
        if !usable {
            warn!(
                "frame buffer holds {} bytes, expected {}x{}; treating as a miss",
                frame.image.data.len(),
                frame.image.width,
                frame.image.height
            );
            warnings.push(format!(
                "inconsistent frame buffer: {} bytes for {}x{}",
                frame.image.data.len(),
                frame.image.width,
                frame.image.height
            ));
            self.selector.clear_history();
        }

        let found = usable && self.detector.process(&frame.image);
        let detection = if found {
            let observation = self.detector.detected_points();
            match self.view.sides(observation) {
                Some(sides) => Some(Detection {
                    sides,
                    observation: observation.clone(),
                }),
                None => {
                    debug!(
                        "detection with {} points does not match the target grid",
                        observation.len()
                    );
                    None
                }
            }
        } else {
            None
        };

        let points: &[Point2<f64>] = detection
            .as_ref()
            .map(|d| d.observation.points.as_slice())
            .unwrap_or(&[]);
        self.tracker
            .update(detection.is_some(), points, frame.timestamp);

        // A pending save request waits for the next usable frame.
        if usable && self.ui.take_force_save() {
            let path = self.params.output_dir.join(&self.params.debug_save_name);
            match write_png(&frame.image.to_owned_image(), &path) {
                Ok(()) => info!("forced save of current frame to {}", path.display()),
                Err(err) => {
                    warn!("forced save to {} failed: {err}", path.display());
                    warnings.push(format!("forced save failed: {err}"));
                }
            }
        }

        let step = match self.phase {
            Phase::DetermineSize => self.handle_determine_size(frame, detection.as_ref()),
            Phase::RemoveDots => self.handle_remove_dots(frame, detection.as_ref(), &mut warnings),
            Phase::FillScreen => self.handle_fill_screen(frame, detection.as_ref(), &mut warnings),
        };

        self.ui.set_message(&step.message);
        self.ui.set_overlays(&step.overlays);

        FrameReport {
            phase: self.phase,
            detected: detection.is_some(),
            message: step.message,
            overlays: step.overlays,
            capture: step.capture,
            warnings,
        }
    }

    fn set_image_size(&mut self, width: usize, height: usize) {
        if self.image_size == (width, height) {
            return;
        }
        self.image_size = (width, height);
        self.tracker.set_image_size(width, height);
        self.magnet_radius = magnet_radius(
            width,
            height,
            self.params.magnet_radius_min,
            self.params.magnet_radius_divisor,
        );
        debug!(
            "image size {width}x{height}, magnet radius {}",
            self.magnet_radius
        );
    }

    fn handle_determine_size(&mut self, frame: &Frame<'_>, det: Option<&Detection>) -> Step {
        let mut step = Step::new("Determine Scale: Hold target in view and center");
        let Some(det) = det else {
            return step;
        };

        let still = self.tracker.stationary_time();
        let [top, _, bottom, _] = side_lengths(&det.sides);
        let (horizontal, vertical) = skew_ratios(&det.sides);

        if horizontal <= self.params.center_skew || vertical <= self.params.center_skew {
            self.tracker.reset_stationary();
            step.message = format!(
                "Straighten out.  H {:3}   V {:3}",
                (horizontal * 100.0) as i32,
                (vertical * 100.0) as i32
            );
            step.overlays
                .extend(det.observation.points.iter().map(|&p| Overlay::DetectionPoint {
                    center: p,
                    radius: POINT_MARKER_RADIUS,
                    filled: false,
                    color: Rgba::BLUE,
                }));
            return step;
        }

        if still > self.params.still_threshold {
            self.selector.set_template(&frame.image, &det.sides);
            if let Some(template) = self.selector.template() {
                self.ui.update_template(template);
            }
            self.tracker.reset_stationary();

            let canonical = top.max(bottom);
            self.canonical_width = Some(canonical);
            self.padding = (self.view.buffer_width(canonical) * self.params.padding_scale).floor();
            let (w, h) = self.image_size;
            self.magnets = magnet_layout(w, h, self.padding);
            self.total_magnets = self.magnets.len();
            self.phase = Phase::RemoveDots;
            info!(
                "target size fixed: width {canonical:.1}px, padding {}px, {} magnets",
                self.padding, self.total_magnets
            );
        }
        if still > self.params.display_time {
            step.message = format!("Hold still:  {still:6.1}");
        }
        self.push_points(&mut step.overlays, &det.observation, still);
        step
    }

    fn handle_remove_dots(
        &mut self,
        frame: &Frame<'_>,
        det: Option<&Detection>,
        warnings: &mut Vec<String>,
    ) -> Step {
        let mut step = Step::new("Clear the dots!");

        let Some(det) = det else {
            self.push_border(&mut step.overlays);
            self.selector.clear_history();
            self.magnets.iter_mut().for_each(Magnet::lost);
            self.push_magnets(&mut step.overlays);
            self.push_regions(&mut step.overlays);
            return step;
        };

        self.report_focus();
        let still = self.tracker.stationary_time();
        let reach = self.reach();
        let close_to_magnet = self
            .magnets
            .iter_mut()
            .fold(false, |any, m| m.update(&det.sides, reach) | any);

        let mut reset_selector = true;
        if self.picture_taken {
            if still >= self.params.still_threshold {
                step.message = "Move somewhere else".to_string();
            } else {
                self.picture_taken = false;
            }
        } else if still >= self.params.still_threshold {
            let (satisfied, remaining): (Vec<Magnet>, Vec<Magnet>) = std::mem::take(&mut self.magnets)
                .into_iter()
                .partition(|m| m.is_reached(&det.sides, reach));
            self.magnets = remaining;

            if !satisfied.is_empty() {
                debug!(
                    "{} magnet(s) cleared, {} left",
                    satisfied.len(),
                    self.magnets.len()
                );
                // This frame is a candidate too, so the window is never empty.
                self.selector.process(&frame.image, &det.sides);
                step.capture = Some(self.capture(frame, det, warnings));
                self.picture_taken = true;
                step.message = "Move somewhere else".to_string();

                self.edge_fill = 1.0 - self.magnets.len() as f64 / self.total_magnets.max(1) as f64;
                self.ui.update_edge_fill(self.edge_fill);
                if self.magnets.is_empty() {
                    info!("all magnets cleared, fill the screen");
                    self.phase = Phase::FillScreen;
                }
            }
        } else if still > self.params.display_time {
            if close_to_magnet {
                step.message = format!("Hold still:  {still:6.1}");
                reset_selector = false;
            } else {
                step.message = "Move closer to a dot".to_string();
            }
        }

        if reset_selector {
            self.selector.update_score(&frame.image, &det.sides);
        } else {
            self.selector.process(&frame.image, &det.sides);
        }

        self.push_border(&mut step.overlays);
        self.push_magnets(&mut step.overlays);
        self.push_arrows(&mut step.overlays, &det.sides);
        self.push_points(&mut step.overlays, &det.observation, still);
        self.push_regions(&mut step.overlays);
        step
    }

    fn handle_fill_screen(
        &mut self,
        frame: &Frame<'_>,
        det: Option<&Detection>,
        warnings: &mut Vec<String>,
    ) -> Step {
        let mut step = Step::new("Tint the screen!");
        self.push_border(&mut step.overlays);

        if let Some(det) = det {
            self.report_focus();
            let still = self.tracker.stationary_time();

            let mut reset_selector = true;
            if self.picture_taken {
                if still >= self.params.still_threshold {
                    step.message = "Move somewhere else".to_string();
                } else {
                    self.picture_taken = false;
                }
            } else if still >= self.params.still_threshold {
                self.selector.process(&frame.image, &det.sides);
                step.capture = Some(self.capture(frame, det, warnings));
                self.picture_taken = true;
                step.message = "Move somewhere else".to_string();
            } else if still > self.params.display_time {
                reset_selector = false;
                step.message = format!("Hold still:  {still:6.1}");
            }

            if reset_selector {
                self.selector.update_score(&frame.image, &det.sides);
            } else {
                self.selector.process(&frame.image, &det.sides);
            }
            self.push_points(&mut step.overlays, &det.observation, still);
        } else {
            self.selector.clear_history();
        }

        self.push_regions(&mut step.overlays);
        step
    }

    /// Store the sharpest still frame, record the outline and update the
    /// diversity score.
    fn capture(&mut self, frame: &Frame<'_>, det: &Detection, warnings: &mut Vec<String>) -> CaptureEvent {
        let image_path = match self.selector.save() {
            Ok(path) => path,
            Err(err) => {
                warn!("failed to save calibration image: {err}");
                warnings.push(format!("failed to save calibration image: {err}"));
                None
            }
        };

        self.regions.push(det.sides);
        self.scorer.add_observation(&det.observation);
        self.score = self.scorer.score();
        self.ui.update_geometry(self.score);
        self.geometry_sufficient |= self.score >= 1.0;
        if self.can_finish() && !self.finish_enabled {
            info!("geometry and border coverage sufficient, finish enabled");
            self.finish_enabled = true;
            self.ui.enable_finish();
        }

        let event = CaptureEvent {
            index: self.captures.len(),
            timestamp: frame.timestamp,
            phase: self.phase,
            corners: det.sides,
            observation: det.observation.clone(),
            score: self.score,
            image_path,
        };
        info!(
            "capture {} at {:.2}s, diversity score {:.3}",
            event.index,
            frame.timestamp.as_secs_f64(),
            self.score
        );
        self.captures.push(event.clone());
        event
    }

    fn report_focus(&mut self) {
        if let Some(view) = self.selector.current_view() {
            self.ui.update_view(view);
        }
        self.ui.update_focus_score(self.selector.focus_score());
    }

    fn reach(&self) -> f64 {
        self.params.capture_radius_scale * self.magnet_radius
    }

    fn push_border(&self, out: &mut Vec<Overlay>) {
        if self.padding <= 0.0 {
            return;
        }
        let (w, h) = self.image_size;
        out.push(Overlay::BorderGuide {
            min: Point2::new(self.padding, self.padding),
            max: Point2::new(w as f64 - self.padding, h as f64 - self.padding),
            color: Rgba::BLUE,
        });
    }

    fn push_magnets(&self, out: &mut Vec<Overlay>) {
        let r = self.magnet_radius;
        out.extend(self.magnets.iter().map(|m| Overlay::Magnet {
            center: m.location,
            radius: r,
            kind: m.kind,
            fill: if m.close { Rgba::RED } else { Rgba::YELLOW },
            outline: Rgba::BLACK,
            stroke_width: (r / 8.0).floor().max(2.0),
        }));
    }

    fn push_arrows(&self, out: &mut Vec<Overlay>, sides: &Quad) {
        let range = self.params.arrow_radius_scale * self.magnet_radius;
        for m in &self.magnets {
            let (closest, distance) = m.closest_feature(sides);
            if distance <= range {
                out.push(Overlay::Arrow(Arrow {
                    origin: closest,
                    vector: m.location - closest,
                    color: Rgba::BLUE,
                }));
            }
        }
    }

    /// Point markers fade from purple-blue to red as the hold time
    /// approaches the threshold, and show green during the cooldown.
    fn push_points(&self, out: &mut Vec<Overlay>, obs: &CalibrationObservation, still: f64) {
        let shade = (255.0 * (still / self.params.still_threshold)).clamp(0.0, 255.0) as u8;
        let color = if self.picture_taken {
            Rgba::rgb(0, shade, 0)
        } else {
            Rgba::rgb(shade, 0, 255u8.saturating_sub(shade.saturating_mul(2)))
        };
        out.extend(obs.points.iter().map(|&p| Overlay::DetectionPoint {
            center: p,
            radius: POINT_MARKER_RADIUS,
            filled: true,
            color,
        }));
    }

    fn push_regions(&self, out: &mut Vec<Overlay>) {
        out.extend(self.regions.iter().map(|q| Overlay::FillRegion {
            polygon: *q,
            color: Rgba::REGION,
        }));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn params(&self) -> &GuidanceParams {
        &self.params
    }

    pub fn view(&self) -> &CalibrationView {
        &self.view
    }

    /// Width of the frontal target outline, once the size phase is done.
    pub fn canonical_width(&self) -> Option<f64> {
        self.canonical_width
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    pub fn magnet_radius(&self) -> f64 {
        self.magnet_radius
    }

    /// Magnets still to be cleared.
    pub fn magnets(&self) -> &[Magnet] {
        &self.magnets
    }

    /// Outlines of all captures so far.
    pub fn regions(&self) -> &[Quad] {
        &self.regions
    }

    pub fn captures(&self) -> &[CaptureEvent] {
        &self.captures
    }

    pub fn stationary_time(&self) -> f64 {
        self.tracker.stationary_time()
    }

    /// Latest diversity score.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// The diversity score has reached 1.0 at some point.
    pub fn geometry_sufficient(&self) -> bool {
        self.geometry_sufficient
    }

    pub fn edge_fill(&self) -> f64 {
        self.edge_fill
    }

    /// A capture was just taken and the target has not moved since.
    pub fn in_cooldown(&self) -> bool {
        self.picture_taken
    }

    pub fn can_finish(&self) -> bool {
        self.geometry_sufficient && self.phase != Phase::DetermineSize && self.magnets.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.ui.is_finished()
    }

    pub fn selector(&self) -> &BestFrameSelector {
        &self.selector
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn into_parts(self) -> (D, S, U) {
        (self.detector, self.scorer, self.ui)
    }
}

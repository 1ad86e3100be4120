use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use approx::assert_relative_eq;
use calib_assist::core::{CalibrationObservation, GrayImage, GrayImageView, TargetKind, TargetSpec};
use calib_assist::guidance::{MagnetKind, Rgba};
use calib_assist::score::GeometryScore;
use calib_assist::{
    AssistedCalibration, CalibrationDetector, Frame, FrameReport, GuidanceError, GuidanceParams,
    GuidanceUi, Overlay, Phase,
};
use nalgebra::Point2;
use tempfile::TempDir;

const W: usize = 640;
const H: usize = 480;
const ROWS: usize = 5;
const COLS: usize = 7;
const STEP_MS: u64 = 100;

type Pose = Vec<Point2<f64>>;

/// Detector whose output is set by the test before each frame.
struct ScriptedDetector {
    target: TargetSpec,
    next: Rc<RefCell<Option<Pose>>>,
    obs: CalibrationObservation,
}

impl CalibrationDetector for ScriptedDetector {
    fn target(&self) -> &TargetSpec {
        &self.target
    }

    fn process(&mut self, _image: &GrayImageView<'_>) -> bool {
        match self.next.borrow().as_ref() {
            Some(points) => {
                self.obs.points.clone_from(points);
                true
            }
            None => {
                self.obs.clear();
                false
            }
        }
    }

    fn detected_points(&self) -> &CalibrationObservation {
        &self.obs
    }
}

/// Reports a scripted score sequence, one value per observation.
struct ScriptedScore {
    scores: Vec<f64>,
    seen: usize,
}

impl GeometryScore for ScriptedScore {
    fn add_observation(&mut self, _observation: &CalibrationObservation) {
        self.seen += 1;
    }

    fn score(&self) -> f64 {
        match self.seen {
            0 => 0.0,
            n => self.scores[(n - 1).min(self.scores.len() - 1)],
        }
    }
}

#[derive(Default)]
struct RecordingUi {
    messages: Vec<String>,
    overlays: Vec<Overlay>,
    template: Option<GrayImage>,
    geometry: Vec<f64>,
    edge_fill: Vec<f64>,
    finish_enabled: usize,
    force_save: bool,
}

impl GuidanceUi for RecordingUi {
    fn set_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn set_overlays(&mut self, overlays: &[Overlay]) {
        self.overlays = overlays.to_vec();
    }

    fn update_template(&mut self, template: &GrayImage) {
        self.template = Some(template.clone());
    }

    fn update_geometry(&mut self, score: f64) {
        self.geometry.push(score);
    }

    fn update_edge_fill(&mut self, fill: f64) {
        self.edge_fill.push(fill);
    }

    fn enable_finish(&mut self) {
        self.finish_enabled += 1;
    }

    fn take_force_save(&mut self) -> bool {
        std::mem::take(&mut self.force_save)
    }
}

type Session = AssistedCalibration<ScriptedDetector, ScriptedScore, RecordingUi>;

struct Harness {
    session: Session,
    pose: Rc<RefCell<Option<Pose>>>,
    image: GrayImage,
    t_ms: u64,
    dir: TempDir,
}

impl Harness {
    fn new(scores: Vec<f64>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let pose = Rc::new(RefCell::new(None));
        let detector = ScriptedDetector {
            target: TargetSpec::chessboard(6, 8, 30.0),
            next: Rc::clone(&pose),
            obs: CalibrationObservation::default(),
        };
        let scorer = ScriptedScore { scores, seen: 0 };
        let params = GuidanceParams::default().with_output_dir(dir.path().join("session"));
        let session =
            AssistedCalibration::new(detector, scorer, RecordingUi::default(), params).expect("session");
        Self {
            session,
            pose,
            image: GrayImage::filled(W, H, 128),
            t_ms: 0,
            dir,
        }
    }

    fn step(&mut self, pose: Option<&[Point2<f64>]>) -> FrameReport {
        *self.pose.borrow_mut() = pose.map(<[_]>::to_vec);
        let frame = Frame::new(self.image.view(), Duration::from_millis(self.t_ms));
        self.t_ms += STEP_MS;
        self.session.process(&frame)
    }

    /// Like [`Harness::step`] but with a caller-supplied pixel buffer.
    fn step_with(&mut self, pixels: &[u8], pose: &[Point2<f64>]) -> FrameReport {
        *self.pose.borrow_mut() = Some(pose.to_vec());
        let image = GrayImageView {
            width: W,
            height: H,
            data: pixels,
        };
        let frame = Frame::new(image, Duration::from_millis(self.t_ms));
        self.t_ms += STEP_MS;
        self.session.process(&frame)
    }

    fn show(&mut self, pose: &[Point2<f64>]) -> FrameReport {
        self.step(Some(pose))
    }

    fn hold(&mut self, pose: &[Point2<f64>], frames: usize) -> Vec<FrameReport> {
        (0..frames).map(|_| self.show(pose)).collect()
    }

    /// Frontal target held until the size phase completes.
    fn finish_size_phase(&mut self) {
        let reports = self.hold(&trapezoid(320.0, 160.0, 0.98), 22);
        assert_eq!(reports[20].phase, Phase::DetermineSize);
        assert_eq!(reports[21].phase, Phase::RemoveDots);
    }

    fn session_dir(&self) -> PathBuf {
        self.dir.path().join("session")
    }
}

/// Grid with 40px pitch whose rows shrink linearly to `bottom_scale` of the
/// top row width, centered on `cx`.
fn trapezoid(cx: f64, y0: f64, bottom_scale: f64) -> Pose {
    let mut pts = Vec::with_capacity(ROWS * COLS);
    for r in 0..ROWS {
        let s = 1.0 - (1.0 - bottom_scale) * r as f64 / (ROWS - 1) as f64;
        for c in 0..COLS {
            pts.push(Point2::new(cx + (c as f64 - 3.0) * 40.0 * s, y0 + 40.0 * r as f64));
        }
    }
    pts
}

/// Axis-aligned grid with its top-left point at `(x0, y0)`.
fn rect(x0: f64, y0: f64, pitch_x: f64) -> Pose {
    let mut pts = Vec::with_capacity(ROWS * COLS);
    for r in 0..ROWS {
        for c in 0..COLS {
            pts.push(Point2::new(x0 + pitch_x * c as f64, y0 + 40.0 * r as f64));
        }
    }
    pts
}

/// Poses of a 240x160 outline whose matching feature sits on each magnet,
/// in magnet order. Padding is 44px for the frontal pose above.
fn magnet_poses() -> Vec<Pose> {
    vec![
        rect(200.0, 44.0, 40.0),
        rect(200.0, 276.0, 40.0),
        rect(44.0, 160.0, 40.0),
        rect(356.0, 160.0, 40.0),
        rect(44.0, 44.0, 40.0),
        rect(44.0, 276.0, 40.0),
        rect(356.0, 276.0, 40.0),
        rect(356.0, 44.0, 40.0),
    ]
}

#[test]
fn skewed_then_square_enters_remove_dots() {
    let mut h = Harness::new(vec![0.0]);

    let report = h.show(&trapezoid(320.0, 160.0, 0.8));
    assert!(report.message.starts_with("Straighten out."), "{}", report.message);
    assert_eq!(h.session.ui().messages, vec![report.message.clone()]);
    assert_eq!(h.session.stationary_time(), 0.0);

    let square = trapezoid(320.0, 160.0, 0.98);
    for k in 0..21 {
        let report = h.show(&square);
        assert_eq!(report.phase, Phase::DetermineSize, "frame {k}");
    }
    let report = h.show(&square);
    assert_eq!(report.phase, Phase::RemoveDots);

    assert_eq!(h.session.magnets().len(), 8);
    assert!(h.session.padding() > 0.0);
    assert_eq!(h.session.padding(), 44.0);
    assert_relative_eq!(h.session.canonical_width().expect("width"), 240.0, epsilon = 1e-9);
    assert_eq!(h.session.stationary_time(), 0.0);
    assert!(h.session.ui().template.is_some());
    assert_eq!(
        h.session.magnets().iter().filter(|m| m.kind == MagnetKind::Corner).count(),
        4
    );
}

#[test]
fn skew_always_clears_stillness() {
    let mut h = Harness::new(vec![0.0]);
    let square = trapezoid(320.0, 160.0, 0.98);
    let reports = h.hold(&square, 10);
    assert!(h.session.stationary_time() > 0.5);
    assert!(reports[9].message.starts_with("Hold still:"), "{}", reports[9].message);

    for _ in 0..3 {
        let report = h.show(&trapezoid(320.0, 160.0, 0.85));
        assert_eq!(h.session.stationary_time(), 0.0);
        assert_eq!(report.phase, Phase::DetermineSize);
        assert!(report.overlays.iter().all(|o| matches!(
            o,
            Overlay::DetectionPoint { filled: false, color: Rgba::BLUE, .. }
        )));
    }
}

#[test]
fn size_phase_needs_detection_of_the_full_grid() {
    let mut h = Harness::new(vec![0.0]);
    let mut partial = trapezoid(320.0, 160.0, 0.98);
    partial.pop();
    for _ in 0..30 {
        let report = h.show(&partial);
        assert!(!report.detected);
        assert_eq!(report.message, "Determine Scale: Hold target in view and center");
    }
    assert_eq!(h.session.phase(), Phase::DetermineSize);
    assert_eq!(h.session.stationary_time(), 0.0);
}

#[test]
fn corner_magnet_capture_at_threshold() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();

    let reports = h.hold(&rect(44.0, 44.0, 40.0), 21);
    assert!(reports[..20].iter().all(|r| r.capture.is_none()));
    assert!(reports[10].message.starts_with("Hold still:"), "{}", reports[10].message);

    let capture = reports[20].capture.as_ref().expect("capture at 2.0s");
    assert_eq!(capture.index, 0);
    assert_eq!(capture.corners[0], Point2::new(44.0, 44.0));
    assert_eq!(capture.observation.len(), ROWS * COLS);
    assert!(reports[20].warnings.is_empty());
    let path = capture.image_path.as_ref().expect("saved image");
    assert!(path.ends_with("images/image0000.png"));
    assert!(path.exists());

    assert_eq!(h.session.magnets().len(), 7);
    assert!(!h
        .session
        .magnets()
        .iter()
        .any(|m| m.location == Point2::new(44.0, 44.0)));
    assert_eq!(h.session.ui().edge_fill, vec![0.125]);
    assert_eq!(h.session.edge_fill(), 0.125);
    assert_eq!(h.session.regions().len(), 1);
    assert_eq!(h.session.selector().saved_count(), 1);
}

#[test]
fn one_pose_can_clear_several_magnets() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();

    // 552px wide: the top corners and the top midpoint all land on magnets.
    let reports = h.hold(&rect(44.0, 44.0, 92.0), 21);
    assert!(reports[20].capture.is_some());
    assert_eq!(h.session.magnets().len(), 5);
    assert_eq!(h.session.ui().edge_fill, vec![0.375]);
    assert_eq!(h.session.captures().len(), 1);
}

#[test]
fn cooldown_blocks_repeated_capture() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();
    let pose = rect(44.0, 44.0, 40.0);
    h.hold(&pose, 21);
    assert!(h.session.in_cooldown());

    for report in h.hold(&pose, 30) {
        assert!(report.capture.is_none());
        assert_eq!(report.message, "Move somewhere else");
    }
    assert_eq!(h.session.captures().len(), 1);

    // Moving away lifts the cooldown.
    h.show(&rect(200.0, 200.0, 40.0));
    assert!(!h.session.in_cooldown());
}

#[test]
fn still_but_far_from_magnets_does_not_capture() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();
    let reports = h.hold(&rect(200.0, 160.0, 40.0), 40);
    assert!(reports.iter().all(|r| r.capture.is_none()));
    assert_eq!(reports[10].message, "Move closer to a dot");
    assert_eq!(h.session.magnets().len(), 8);
    assert_eq!(h.session.selector().window_len(), 1);
}

#[test]
fn detection_loss_in_remove_dots_resets_progress() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();
    h.hold(&rect(44.0, 44.0, 40.0), 15);
    assert!(h.session.stationary_time() > 1.0);
    assert!(h.session.selector().window_len() > 1);

    for _ in 0..5 {
        let report = h.step(None);
        assert!(!report.detected);
        assert!(report.capture.is_none());
        assert_eq!(report.phase, Phase::RemoveDots);
        assert_eq!(h.session.stationary_time(), 0.0);
        assert_eq!(h.session.selector().window_len(), 0);
        assert_eq!(h.session.magnets().len(), 8);
        assert!(h.session.magnets().iter().all(|m| !m.close));
    }
    assert_eq!(h.session.captures().len(), 0);
}

#[test]
fn remove_dots_overlays() {
    let mut h = Harness::new(vec![0.2]);
    h.finish_size_phase();
    let report = h.show(&rect(44.0, 44.0, 40.0));

    let count = |f: fn(&Overlay) -> bool| report.overlays.iter().filter(|o| f(o)).count();
    assert_eq!(count(|o| matches!(o, Overlay::BorderGuide { .. })), 1);
    assert_eq!(count(|o| matches!(o, Overlay::Magnet { .. })), 8);
    assert_eq!(count(|o| matches!(o, Overlay::Magnet { fill: Rgba::RED, .. })), 1);
    // Top-left corner, top midpoint and left midpoint are within arrow range.
    assert_eq!(count(|o| matches!(o, Overlay::Arrow(_))), 3);
    assert_eq!(count(|o| matches!(o, Overlay::DetectionPoint { filled: true, .. })), ROWS * COLS);
    assert_eq!(count(|o| matches!(o, Overlay::FillRegion { .. })), 0);
    assert_eq!(h.session.ui().overlays, report.overlays);
}

#[test]
fn full_protocol_reaches_fill_screen_and_finish() {
    let mut h = Harness::new(vec![0.3, 0.6, 1.1, 0.7]);
    h.finish_size_phase();

    let mut remaining = 8;
    for (i, pose) in magnet_poses().iter().enumerate() {
        for report in h.hold(pose, 21) {
            let now = h.session.magnets().len();
            assert!(now <= remaining);
            remaining = now;
            assert_eq!(report.phase == Phase::FillScreen, now == 0);
        }
        assert_eq!(remaining, 7 - i, "magnet {i}");
        h.hold(pose, 3);
    }
    assert_eq!(h.session.phase(), Phase::FillScreen);
    assert_eq!(h.session.captures().len(), 8);

    let fills = &h.session.ui().edge_fill;
    assert_eq!(fills.len(), 8);
    assert_relative_eq!(fills[7], 1.0);

    // Sticky: the score dropped back to 0.7 after reaching 1.1.
    assert_eq!(h.session.score(), 0.7);
    assert!(h.session.geometry_sufficient());
    assert!(h.session.can_finish());
    assert_eq!(h.session.ui().finish_enabled, 1);

    // Free captures in the last phase.
    let reports = h.hold(&rect(200.0, 160.0, 40.0), 21);
    assert!(reports[20].capture.is_some());
    assert_eq!(reports[20].message, "Move somewhere else");
    let reports = h.hold(&rect(200.0, 160.0, 40.0), 25);
    assert!(reports.iter().all(|r| r.capture.is_none()));
    let report = h.step(None);
    assert_eq!(report.phase, Phase::FillScreen);
    assert_eq!(report.message, "Tint the screen!");
    assert_eq!(h.session.selector().window_len(), 0);

    let reports = h.hold(&rect(300.0, 100.0, 40.0), 21);
    assert!(reports[20].capture.is_some());
    assert_eq!(h.session.captures().len(), 10);
    assert_eq!(h.session.regions().len(), 10);

    // Every capture found a candidate and wrote one image.
    assert_eq!(h.session.selector().empty_save_attempts(), 0);
    assert_eq!(h.session.selector().saved_count(), 10);
    let geometry = &h.session.ui().geometry;
    assert_eq!(geometry.len(), 10);
    for (i, c) in h.session.captures().iter().enumerate() {
        assert_eq!(c.index, i);
        assert!(c.image_path.as_ref().is_some_and(|p| p.exists()));
    }
}

#[test]
fn finish_requires_cleared_magnets() {
    let mut h = Harness::new(vec![1.5]);
    h.finish_size_phase();
    h.hold(&rect(44.0, 44.0, 40.0), 21);
    assert!(h.session.geometry_sufficient());
    assert!(!h.session.can_finish());
    assert_eq!(h.session.ui().finish_enabled, 0);
}

#[test]
fn failed_image_write_is_a_warning() {
    let mut h = Harness::new(vec![0.4]);
    h.finish_size_phase();
    let images = h.session_dir().join("images");
    std::fs::remove_dir_all(&images).expect("rm images");
    std::fs::write(&images, b"in the way").expect("block images dir");

    let reports = h.hold(&rect(44.0, 44.0, 40.0), 21);
    let report = &reports[20];
    let capture = report.capture.as_ref().expect("capture stands");
    assert!(capture.image_path.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(capture.score, 0.4);
    assert_eq!(h.session.magnets().len(), 7);
    assert_eq!(h.session.selector().saved_count(), 0);
}

#[test]
fn session_start_wipes_output_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("session");
    std::fs::create_dir_all(out.join("images")).expect("mkdir");
    std::fs::write(out.join("images/image0000.png"), b"stale").expect("stale");

    let detector = ScriptedDetector {
        target: TargetSpec::chessboard(6, 8, 30.0),
        next: Rc::new(RefCell::new(None)),
        obs: CalibrationObservation::default(),
    };
    let scorer = ScriptedScore { scores: vec![0.0], seen: 0 };
    let params = GuidanceParams::default().with_output_dir(&out);
    let _session =
        AssistedCalibration::new(detector, scorer, RecordingUi::default(), params).expect("session");

    assert!(out.join("images").is_dir());
    assert!(!out.join("images/image0000.png").exists());
}

#[test]
fn force_save_writes_debug_frame() {
    let mut h = Harness::new(vec![0.0]);
    h.session.ui_mut().force_save = true;
    h.step(None);
    assert!(h.session_dir().join("debug_save.png").exists());
    assert!(!h.session.ui().force_save);
}

#[test]
fn short_frame_buffer_counts_as_a_miss() {
    let mut h = Harness::new(vec![0.0]);
    let pose = trapezoid(320.0, 160.0, 0.98);
    let short = [0u8; 10];

    h.hold(&pose, 15);
    assert!(h.session.stationary_time() > 1.0);

    h.session.ui_mut().force_save = true;
    for _ in 0..10 {
        let report = h.step_with(&short, &pose);
        assert!(!report.detected);
        assert_eq!(report.phase, Phase::DetermineSize);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("inconsistent frame buffer"));
    }
    assert_eq!(h.session.stationary_time(), 0.0);
    assert_eq!(h.session.selector().window_len(), 0);
    assert!(h.session.ui().force_save);
    assert!(!h.session_dir().join("debug_save.png").exists());

    // Good frames resume the protocol and the pending save goes through.
    let reports = h.hold(&pose, 22);
    assert!(reports.iter().all(|r| r.detected && r.warnings.is_empty()));
    assert!(h.session_dir().join("debug_save.png").exists());
    assert_eq!(h.session.phase(), Phase::RemoveDots);
}

#[test]
fn circle_targets_are_rejected_up_front() {
    let dir = tempfile::tempdir().expect("tempdir");
    let detector = ScriptedDetector {
        target: TargetSpec {
            kind: TargetKind::CircleHexagonal,
            rows: 4,
            cols: 11,
            square_size: 10.0,
            space_size: 20.0,
        },
        next: Rc::new(RefCell::new(None)),
        obs: CalibrationObservation::default(),
    };
    let scorer = ScriptedScore { scores: vec![0.0], seen: 0 };
    let params = GuidanceParams::default().with_output_dir(dir.path().join("session"));
    let err = AssistedCalibration::new(detector, scorer, RecordingUi::default(), params)
        .err()
        .expect("unsupported");
    assert!(matches!(
        err,
        GuidanceError::UnsupportedTarget(TargetKind::CircleHexagonal)
    ));
}

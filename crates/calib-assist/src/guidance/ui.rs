use crate::guidance::Overlay;
use calib_assist_core::GrayImage;

/// Front end of a guidance session.
///
/// The session pushes the message and overlays of every processed frame and
/// the progress indicators as they change. It reads back two user actions:
/// finishing the session and forcing a debug save of the current frame.
pub trait GuidanceUi {
    fn set_message(&mut self, message: &str);

    fn set_overlays(&mut self, overlays: &[Overlay]);

    /// Rectified reference view captured at the end of the size phase.
    fn update_template(&mut self, _template: &GrayImage) {}

    /// Rectified view of the latest candidate frame.
    fn update_view(&mut self, _view: &GrayImage) {}

    /// Blur error of the latest candidate; lower is sharper.
    fn update_focus_score(&mut self, _score: f64) {}

    /// Geometric diversity; `>= 1.0` is sufficient.
    fn update_geometry(&mut self, _score: f64) {}

    /// Fraction of border magnets already cleared.
    fn update_edge_fill(&mut self, _fill: f64) {}

    /// Called once finishing becomes possible.
    fn enable_finish(&mut self) {}

    fn is_finished(&self) -> bool {
        false
    }

    /// One-shot: returns `true` once per user request.
    fn take_force_save(&mut self) -> bool {
        false
    }
}

/// Front end that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullUi;

impl GuidanceUi for NullUi {
    fn set_message(&mut self, _message: &str) {}

    fn set_overlays(&mut self, _overlays: &[Overlay]) {}
}

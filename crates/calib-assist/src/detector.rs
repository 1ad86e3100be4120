use calib_assist_core::{CalibrationObservation, GrayImageView, TargetSpec};

/// Fiducial detector driven once per frame by the guidance.
///
/// Points must follow the row-major order of [`TargetSpec::layout`] on every
/// frame, so the outline corners keep a stable winding.
pub trait CalibrationDetector {
    /// Target this detector looks for.
    fn target(&self) -> &TargetSpec;

    /// Run detection on a frame; `true` if the full target was found.
    fn process(&mut self, image: &GrayImageView<'_>) -> bool;

    /// Points of the last successful detection.
    fn detected_points(&self) -> &CalibrationObservation;
}

impl<T: CalibrationDetector + ?Sized> CalibrationDetector for Box<T> {
    fn target(&self) -> &TargetSpec {
        (**self).target()
    }

    fn process(&mut self, image: &GrayImageView<'_>) -> bool {
        (**self).process(image)
    }

    fn detected_points(&self) -> &CalibrationObservation {
        (**self).detected_points()
    }
}

use crate::focus::{laplacian_blur_error, rectify_patch, FocusTemplate};
use crate::store::{FrameStore, FrameStoreError};
use crate::FrameSelectorParams;
use calib_assist_core::{GrayImage, GrayImageView, Quad};
use log::{debug, warn};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug)]
struct Candidate {
    image: GrayImage,
    blur_error: f64,
}

/// Keeps the frames seen while the target is held still and saves the
/// sharpest one.
///
/// Call protocol, once per detected frame:
/// - [`update_score`](Self::update_score) while the user is not yet holding
///   still (the window restarts at this frame),
/// - [`process`](Self::process) while stillness continues,
/// - [`clear_history`](Self::clear_history) when the target moves or is lost,
/// - [`save`](Self::save) when a capture is accepted.
#[derive(Debug)]
pub struct BestFrameSelector {
    params: FrameSelectorParams,
    store: FrameStore,
    template: Option<FocusTemplate>,
    window: VecDeque<Candidate>,
    current_view: Option<GrayImage>,
    focus_score: f64,
    empty_save_attempts: usize,
}

impl BestFrameSelector {
    /// Create a selector writing into `images_dir`.
    pub fn new(
        images_dir: impl Into<PathBuf>,
        params: FrameSelectorParams,
    ) -> Result<Self, FrameStoreError> {
        let store = FrameStore::create(images_dir, params.file_prefix.clone())?;
        Ok(Self {
            params,
            store,
            template: None,
            window: VecDeque::new(),
            current_view: None,
            focus_score: 0.0,
            empty_save_attempts: 0,
        })
    }

    pub fn params(&self) -> &FrameSelectorParams {
        &self.params
    }

    pub fn images_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Capture the reference appearance of the target.
    pub fn set_template(&mut self, frame: &GrayImageView<'_>, corners: &Quad) {
        match rectify_patch(frame, corners, self.params.template_size) {
            Some(patch) => {
                debug!("focus template set ({}px)", self.params.template_size);
                self.template = Some(FocusTemplate::from_patch(patch));
            }
            None => warn!("cannot rectify template: degenerate target outline"),
        }
    }

    pub fn template(&self) -> Option<&GrayImage> {
        self.template.as_ref().map(FocusTemplate::patch)
    }

    /// Score this frame and restart the window with it as the only candidate.
    pub fn update_score(&mut self, frame: &GrayImageView<'_>, corners: &Quad) -> f64 {
        self.window.clear();
        self.push_candidate(frame, corners)
    }

    /// Score this frame and add it to the window.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn process(&mut self, frame: &GrayImageView<'_>, corners: &Quad) -> f64 {
        self.push_candidate(frame, corners)
    }

    pub fn clear_history(&mut self) {
        self.window.clear();
    }

    /// Save the sharpest candidate and clear the window.
    ///
    /// Returns `Ok(None)` when the window is empty; callers are expected to
    /// never get there, so it is counted and logged.
    pub fn save(&mut self) -> Result<Option<PathBuf>, FrameStoreError> {
        let best = self
            .window
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.blur_error.total_cmp(&b.1.blur_error))
            .map(|(i, _)| i);
        let Some(best) = best else {
            self.empty_save_attempts += 1;
            warn!("save requested with no candidate frame");
            return Ok(None);
        };

        let candidate = &self.window[best];
        debug!(
            "saving best of {} candidates (blur error {:.4})",
            self.window.len(),
            candidate.blur_error
        );
        let result = self.store.save_next(&candidate.image);
        self.window.clear();
        result.map(Some)
    }

    /// Blur error of the most recent frame. Lower is sharper.
    pub fn focus_score(&self) -> f64 {
        self.focus_score
    }

    /// Rectified view of the most recent frame.
    pub fn current_view(&self) -> Option<&GrayImage> {
        self.current_view.as_ref()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn saved_count(&self) -> usize {
        self.store.next_index()
    }

    pub fn empty_save_attempts(&self) -> usize {
        self.empty_save_attempts
    }

    fn push_candidate(&mut self, frame: &GrayImageView<'_>, corners: &Quad) -> f64 {
        let blur_error = match rectify_patch(frame, corners, self.params.template_size) {
            Some(patch) => {
                let err = match &self.template {
                    Some(t) => t.blur_error(&patch),
                    None => laplacian_blur_error(&patch),
                };
                self.current_view = Some(patch);
                err
            }
            None => f64::INFINITY,
        };
        self.focus_score = blur_error;

        if self.window.len() >= self.params.max_window.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(Candidate {
            image: frame.to_owned_image(),
            blur_error,
        });
        blur_error
    }
}

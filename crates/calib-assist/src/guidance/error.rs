use calib_assist_core::{TargetError, TargetKind};
use calib_assist_frames::FrameStoreError;
use std::path::PathBuf;

/// Errors raised while setting up a guidance session.
///
/// Per-frame problems (missed detections, failed image writes) are not
/// errors; they show up in the [`FrameReport`](crate::guidance::FrameReport).
#[derive(thiserror::Error, Debug)]
pub enum GuidanceError {
    #[error("guided calibration does not support {0:?} targets")]
    UnsupportedTarget(TargetKind),
    #[error("invalid calibration target: {0}")]
    InvalidTarget(#[from] TargetError),
    #[error("cannot reset output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    FrameStore(#[from] FrameStoreError),
}

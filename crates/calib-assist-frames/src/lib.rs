//! Best-frame selection for calibration captures.
//!
//! While the user holds the target still, every frame is a candidate. Each
//! one is rectified into a small square patch and compared to a template of
//! the target; when a capture is accepted the least blurred candidate is
//! written to disk as `image0000.png`, `image0001.png`, ...

pub mod focus;
mod params;
mod selector;
mod store;

pub use params::FrameSelectorParams;
pub use selector::BestFrameSelector;
pub use store::{read_gray, write_png, FrameStore, FrameStoreError};

//! Three-phase guided capture protocol.
//!
//! 1. **Determine size**: the user holds the target frontal and still; its
//!    apparent width fixes how far from the image border the capture
//!    locations sit, and the pose becomes the focus template.
//! 2. **Remove dots**: eight magnets (four border midpoints, four corners)
//!    must each be reached by the matching target feature and held still.
//! 3. **Fill screen**: free captures to cover the rest of the image, until
//!    the user finishes.
//!
//! Every still pose that passes the checks stores the sharpest frame of the
//! still period and feeds the diversity scorer. Finishing is allowed once
//! the diversity score has reached 1.0 at least once and no magnet is left.

mod error;
mod machine;
mod magnet;
mod overlay;
mod params;
mod ui;

pub use error::GuidanceError;
pub use machine::{AssistedCalibration, CaptureEvent, Frame, FrameReport, Phase};
pub use magnet::{magnet_layout, magnet_radius, Magnet, MagnetKind};
pub use overlay::{Arrow, Overlay, Rgba};
pub use params::GuidanceParams;
pub use ui::{GuidanceUi, NullUi};

use serde::{Deserialize, Serialize};

/// Configuration of the best-frame selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSelectorParams {
    /// Side of the rectified square patch used for blur scoring.
    pub template_size: usize,
    /// Maximum number of candidate frames kept while the target is still.
    pub max_window: usize,
    /// File name prefix of saved images (`<prefix>0000.png`).
    pub file_prefix: String,
}

impl Default for FrameSelectorParams {
    fn default() -> Self {
        Self {
            template_size: 50,
            max_window: 64,
            file_prefix: "image".to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Parameters of the Zhang-system diversity score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryScoreParams {
    /// Assume zero skew, dropping the `B12` unknown. Two tilted views are
    /// then enough for a non-degenerate system.
    pub zero_skew: bool,
    /// Second-smallest singular value (normalized coordinates) that maps to a
    /// score of `1.0`. Views tilted by roughly 20 degrees in different
    /// directions reach it after three captures.
    pub min_singular_value: f64,
}

impl Default for GeometryScoreParams {
    fn default() -> Self {
        Self {
            zero_skew: true,
            min_singular_value: 0.006,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Numeric capability range advertised by a video track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeCapability {
    /// Smallest accepted value
    pub min: f64,
    /// Largest accepted value
    pub max: f64,
    /// Granularity (0 when continuous)
    pub step: f64,
}

/// How zoom requests are realised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomMode {
    /// Applied as a track constraint; changes captured pixels
    Hardware,
    /// Visual scale on the preview only
    Software,
}

/// Zoom state of the active stream. `level` always lies within `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    /// Current level
    pub level: f64,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Slider granularity
    pub step: f64,
    /// Realisation path
    pub mode: ZoomMode,
}

impl ZoomState {
    /// Fresh state for a range, level reset to 1 (clamped into the range)
    pub fn reset(range: RangeCapability, mode: ZoomMode) -> Self {
        let (min, max) = if range.min <= range.max {
            (range.min, range.max)
        } else {
            (range.max, range.min)
        };
        let mut state = Self {
            level: 1.0,
            min,
            max,
            step: range.step.max(0.0),
            mode,
        };
        state.level = state.clamp(1.0);
        state
    }

    /// Clamp a requested level into `[min, max]`; NaN maps to `min`
    pub fn clamp(&self, level: f64) -> f64 {
        if level.is_nan() {
            return self.min;
        }
        level.clamp(self.min, self.max)
    }
}

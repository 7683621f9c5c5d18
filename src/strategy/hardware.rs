use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{DecodeStrategy, FrameDetector};
use crate::error::StrategyError;
use crate::models::{Frame, StrategyKind};

/// Pull-based strategy over a platform [`FrameDetector`].
///
/// When the raw pass finds nothing, one extra pass runs on a grayscale,
/// contrast-stretched copy of the same frame. Low-contrast codes (screens,
/// faded print) are often found only on the second pass.
pub struct HardwareStrategy {
    detector: Arc<dyn FrameDetector>,
    enhance_on_miss: bool,
}

impl HardwareStrategy {
    /// Wrap a detector
    pub fn new(detector: Arc<dyn FrameDetector>, enhance_on_miss: bool) -> Self {
        Self {
            detector,
            enhance_on_miss,
        }
    }
}

fn first_payload(payloads: Vec<String>) -> Option<String> {
    payloads.into_iter().find(|p| !p.trim().is_empty())
}

#[async_trait]
impl DecodeStrategy for HardwareStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hardware
    }

    async fn attempt_decode(&self, frame: &Frame) -> Result<Option<String>, StrategyError> {
        if let Some(payload) = first_payload(self.detector.detect(frame).await?) {
            return Ok(Some(payload));
        }
        if !self.enhance_on_miss {
            return Ok(None);
        }
        let enhanced = frame.contrast_enhanced();
        let payload = first_payload(self.detector.detect(&enhanced).await?);
        if payload.is_some() {
            debug!("hardware detector succeeded on contrast-enhanced pass");
        }
        Ok(payload)
    }
}

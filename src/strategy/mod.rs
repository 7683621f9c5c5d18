//! Decode strategies behind one interface.
//!
//! The scanner only sees [`DecodeStrategy`]; swapping the accelerated
//! detector for the software decoder never touches its call sites.

pub mod hardware;
pub mod software;

use async_trait::async_trait;

use crate::error::StrategyError;
use crate::models::{Frame, StrategyKind};

pub use hardware::HardwareStrategy;
pub use software::{SampleEvent, SoftwareDecoder, SoftwareSampler};

/// Extracts a raw payload from one frame
#[async_trait]
pub trait DecodeStrategy: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> StrategyKind;

    /// One-time initialisation before the first frame
    async fn warm_up(&self) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Decode one frame. `Ok(None)` is the ordinary "nothing found" result;
    /// `Err` means the strategy itself failed.
    async fn attempt_decode(&self, frame: &Frame) -> Result<Option<String>, StrategyError>;

    /// Release decoder resources
    fn dispose(&self) {}
}

/// Platform-accelerated barcode detector
#[async_trait]
pub trait FrameDetector: Send + Sync {
    /// Raw payloads of every code found in `frame`, possibly none
    async fn detect(&self, frame: &Frame) -> Result<Vec<String>, StrategyError>;
}

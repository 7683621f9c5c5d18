use async_trait::async_trait;
use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::DecodeStrategy;
use crate::camera::VideoTrack;
use crate::error::{CameraError, StrategyError};
use crate::models::{DecodeAttempt, Frame, StrategyKind};

/// In-process QR decoder built on `rqrr`.
///
/// Tries the frame as captured, then inverted, so light-on-dark codes shown
/// on screens are read too.
#[derive(Debug, Default, Clone)]
pub struct SoftwareDecoder {
    try_inverted: bool,
}

impl SoftwareDecoder {
    /// Decoder with the inverted pass enabled
    pub fn new() -> Self {
        Self { try_inverted: true }
    }

    /// Decoder that only reads dark-on-light codes
    pub fn without_inverted_pass() -> Self {
        Self {
            try_inverted: false,
        }
    }

    /// Decode the first readable grid in a luma image
    pub fn decode_gray(&self, gray: &GrayImage) -> Option<String> {
        if let Some(payload) = decode_grids(gray, false) {
            return Some(payload);
        }
        if self.try_inverted {
            return decode_grids(gray, true);
        }
        None
    }
}

fn decode_grids(gray: &GrayImage, invert: bool) -> Option<String> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return None;
    }
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
        let v = gray.get_pixel(x as u32, y as u32).0[0];
        if invert { 255 - v } else { v }
    });
    let grids = prepared.detect_grids();
    trace!(grids = grids.len(), invert, "software decoder grids");
    for grid in grids {
        match grid.decode() {
            Ok((_, content)) => return Some(content),
            Err(e) => trace!("grid decode failed: {e:?}"),
        }
    }
    None
}

#[async_trait]
impl DecodeStrategy for SoftwareDecoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Software
    }

    async fn attempt_decode(&self, frame: &Frame) -> Result<Option<String>, StrategyError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(StrategyError::Unsupported("empty frame".into()));
        }
        Ok(self.decode_gray(&frame.to_gray_image()))
    }
}

/// Reported by [`SoftwareSampler`] to its callback
#[derive(Debug, Clone)]
pub enum SampleEvent {
    /// One decode attempt finished, hit or miss
    Attempt {
        /// The attempt
        attempt: DecodeAttempt,
        /// Mean luma of the sampled frame
        brightness: u8,
    },
    /// The track is gone; the sampler has stopped
    Lost(CameraError),
}

/// Push-based driver: samples frames on its own cadence and reports every
/// attempt to a callback, which it never awaits.
pub struct SoftwareSampler {
    handle: JoinHandle<()>,
}

impl SoftwareSampler {
    /// Spawn the sampling task
    pub fn start<F>(
        strategy: Arc<dyn DecodeStrategy>,
        track: Arc<dyn VideoTrack>,
        interval: Duration,
        on_event: F,
    ) -> Self
    where
        F: Fn(SampleEvent) + Send + Sync + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let frame = match track.grab_frame().await {
                    Ok(frame) => frame,
                    Err(CameraError::TrackEnded) => {
                        on_event(SampleEvent::Lost(CameraError::TrackEnded));
                        break;
                    }
                    Err(e) => {
                        debug!("frame grab failed: {e}");
                        continue;
                    }
                };
                let brightness = frame.mean_luma();
                let attempt = match strategy.attempt_decode(&frame).await {
                    Ok(Some(payload)) => DecodeAttempt::hit(strategy.kind(), payload),
                    Ok(None) => DecodeAttempt::miss(strategy.kind()),
                    Err(e) => {
                        warn!("software decode attempt failed: {e}");
                        DecodeAttempt::miss(strategy.kind())
                    }
                };
                on_event(SampleEvent::Attempt {
                    attempt,
                    brightness,
                });
            }
        });
        Self { handle }
    }

    /// Stop sampling; no callback fires after the current await point
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Whether the sampling task has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SoftwareSampler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

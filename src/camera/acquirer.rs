//! Stream acquisition through a constraint-degradation ladder.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CameraBackend, DeviceSelector, MediaStream, Resolution, StreamConstraints};
use crate::error::{CameraError, ScanError};
use crate::models::Facing;

const HIGH: Resolution = Resolution {
    width: 1920,
    height: 1080,
};
const MEDIUM: Resolution = Resolution {
    width: 1280,
    height: 720,
};

/// Ordered constraint tiers, most specific first.
///
/// Without a device id the two device-pinned tiers are skipped.
pub fn ladder(device_id: Option<&str>) -> Vec<StreamConstraints> {
    let mut tiers = Vec::with_capacity(4);
    if let Some(id) = device_id {
        tiers.push(StreamConstraints {
            device: DeviceSelector::Exact(id.to_string()),
            resolution: Some(HIGH),
            facing: None,
        });
        tiers.push(StreamConstraints {
            device: DeviceSelector::Ideal(id.to_string()),
            resolution: Some(MEDIUM),
            facing: None,
        });
    }
    tiers.push(StreamConstraints {
        device: DeviceSelector::Any,
        resolution: Some(MEDIUM),
        facing: Some(Facing::Rear),
    });
    tiers.push(StreamConstraints::minimal());
    tiers
}

/// A successfully opened stream
#[derive(Debug)]
pub struct Acquired {
    /// The stream, with at least one live video track
    pub stream: MediaStream,
    /// Zero-based index of the tier that succeeded
    pub tier: usize,
    /// A less specific tier had to be used
    pub degraded: bool,
}

/// Opens streams against a backend, releasing the previous one first
pub struct StreamAcquirer<'a, B: CameraBackend + ?Sized> {
    backend: &'a B,
    backoff: Duration,
    settle: Duration,
}

impl<'a, B: CameraBackend + ?Sized> StreamAcquirer<'a, B> {
    /// Acquirer with explicit tier backoff and settle delay
    pub fn new(backend: &'a B, backoff: Duration, settle: Duration) -> Self {
        Self {
            backend,
            backoff,
            settle,
        }
    }

    /// Acquire a stream for `device_id`, walking the constraint ladder.
    ///
    /// `previous` is stopped first and the settle delay observed, so the
    /// platform does not report the same physical camera as busy.
    pub async fn acquire(
        &self,
        device_id: Option<&str>,
        previous: Option<MediaStream>,
    ) -> Result<Acquired, ScanError> {
        if let Some(prev) = previous {
            prev.stop();
            self.settle().await;
        }

        let tiers = ladder(device_id);
        let mut last_err = CameraError::NotFound("no constraint tier attempted".into());

        for (tier, constraints) in tiers.iter().enumerate() {
            if tier > 0 {
                tokio::time::sleep(self.backoff).await;
            }
            match self.backend.open(constraints).await {
                Ok(stream) if stream.has_live_video() => {
                    let degraded = tier > 0;
                    if degraded {
                        info!(
                            tier,
                            device = ?stream.device_id(),
                            "acquisition degraded to a lower constraint tier"
                        );
                    } else {
                        debug!(device = ?stream.device_id(), "stream acquired");
                    }
                    return Ok(Acquired {
                        stream,
                        tier,
                        degraded,
                    });
                }
                Ok(stream) => {
                    debug!(tier, "stream without live video track, discarding");
                    stream.stop();
                    last_err = CameraError::Backend("stream has no live video track".into());
                }
                Err(CameraError::PermissionDenied(msg)) => {
                    return Err(ScanError::PermissionDenied(msg));
                }
                Err(e) => {
                    debug!(tier, "constraint tier failed: {e}");
                    last_err = e;
                }
            }
        }

        warn!("all constraint tiers failed: {last_err}");
        Err(ScanError::from_acquisition(last_err))
    }

    /// Wait out the settle delay after a stream was released
    pub async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    /// Check whether a device can be opened right now by opening and
    /// immediately releasing a minimal stream.
    pub async fn probe(&self, device_id: &str) -> bool {
        let constraints = StreamConstraints {
            device: DeviceSelector::Exact(device_id.to_string()),
            resolution: None,
            facing: None,
        };
        match self.backend.open(&constraints).await {
            Ok(stream) => {
                let live = stream.has_live_video();
                stream.stop();
                live
            }
            Err(e) => {
                debug!(device_id, "probe failed: {e}");
                false
            }
        }
    }
}

//! Platform camera seams plus device enumeration, stream acquisition and zoom.
//!
//! The embedding platform implements [`CameraBackend`] and [`VideoTrack`];
//! everything above these traits is platform independent.

pub mod acquirer;
pub mod enumerator;
pub mod zoom;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::CameraError;
use crate::models::{DeviceDescriptor, Facing, Frame, RangeCapability};
use crate::strategy::FrameDetector;

/// Capabilities advertised by a live video track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCapabilities {
    /// Numeric zoom range, when the camera supports optical/digital zoom
    pub zoom: Option<RangeCapability>,
}

/// A live video track owned by a [`MediaStream`]
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Platform track identifier
    fn id(&self) -> &str;

    /// Whether the track still delivers frames
    fn is_live(&self) -> bool;

    /// Stop the track and release the device. Must be idempotent.
    fn stop(&self);

    /// Current capabilities
    fn capabilities(&self) -> TrackCapabilities;

    /// Apply a zoom constraint
    async fn apply_zoom(&self, level: f64) -> Result<(), CameraError>;

    /// Capture the current frame. [`CameraError::TrackEnded`] means the
    /// camera is gone for good.
    async fn grab_frame(&self) -> Result<Frame, CameraError>;
}

/// A set of tracks obtained from one acquisition request
#[derive(Clone)]
pub struct MediaStream {
    device_id: Option<String>,
    tracks: Vec<Arc<dyn VideoTrack>>,
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("device_id", &self.device_id)
            .field(
                "tracks",
                &self.tracks.iter().map(|t| t.id().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MediaStream {
    /// Wrap tracks opened for `device_id` (if the platform reports it)
    pub fn new(device_id: Option<String>, tracks: Vec<Arc<dyn VideoTrack>>) -> Self {
        Self { device_id, tracks }
    }

    /// Device the stream was opened on
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// All tracks
    pub fn tracks(&self) -> &[Arc<dyn VideoTrack>] {
        &self.tracks
    }

    /// First live video track
    pub fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.tracks.iter().find(|t| t.is_live()).cloned()
    }

    /// Whether at least one track is live
    pub fn has_live_video(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Device selection part of a constraint set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Fail unless this exact device opens
    Exact(String),
    /// Prefer this device, accept another
    Ideal(String),
    /// Any camera
    Any,
}

/// Requested capture resolution (ideal, not exact)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// One acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Device selection
    pub device: DeviceSelector,
    /// Preferred resolution; `None` means platform default
    pub resolution: Option<Resolution>,
    /// Preferred facing when the device is not pinned
    pub facing: Option<Facing>,
}

impl StreamConstraints {
    /// Bare "any video" request used for probes and the last ladder tier
    pub fn minimal() -> Self {
        Self {
            device: DeviceSelector::Any,
            resolution: None,
            facing: None,
        }
    }
}

/// Platform camera access
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// List media inputs. Labels may be empty before permission was granted.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError>;

    /// Open a stream satisfying `constraints`
    async fn open(&self, constraints: &StreamConstraints) -> Result<MediaStream, CameraError>;

    /// Hardware-accelerated detector, when the platform has one
    fn frame_detector(&self) -> Option<Arc<dyn FrameDetector>> {
        None
    }
}

/// Presentation surface the live stream is bound to
pub trait PreviewSink: Send + Sync {
    /// Bind a stream for display
    fn attach(&self, stream: &MediaStream);

    /// Drop the binding
    fn detach(&self);

    /// Cosmetic scale used when zoom has no hardware support
    fn set_visual_scale(&self, scale: f64);
}

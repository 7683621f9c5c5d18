//! Error types for camera access, decode strategies and the scanner.
//!
//! Library code returns these `thiserror` enums; the CLI wraps them in
//! `anyhow` at its call sites.

/// Failure reported by a camera backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// The user or platform refused camera access
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    /// The requested device does not exist
    #[error("camera not found: {0}")]
    NotFound(String),

    /// The device is held exclusively by another process
    #[error("camera busy: {0}")]
    Busy(String),

    /// The constraints could not be satisfied
    #[error("constraints not satisfiable: {0}")]
    OverConstrained(String),

    /// The track stopped delivering frames (revoked, unplugged)
    #[error("camera track ended")]
    TrackEnded,

    /// Anything else the platform reports
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Failure of a decode strategy itself (not a "nothing found" result)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    /// The detector threw while processing a frame
    #[error("detector failed: {0}")]
    Detector(String),

    /// The frame format is not supported by this strategy
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// The strategy could not be initialised
    #[error("strategy initialisation failed: {0}")]
    Init(String),
}

/// Why no camera could be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// The device vanished or none matched
    NotFound,
    /// The device is held elsewhere
    Busy,
    /// Every constraint tier failed for another reason
    Failed,
}

impl Unavailability {
    /// Classify the last camera error seen by the acquirer
    pub fn from_camera_error(err: &CameraError) -> Self {
        match err {
            CameraError::NotFound(_) => Unavailability::NotFound,
            CameraError::Busy(_) => Unavailability::Busy,
            _ => Unavailability::Failed,
        }
    }
}

/// Coarse error category, stable for telemetry and UI branching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Camera access refused
    PermissionDenied,
    /// No camera present, or held elsewhere
    DeviceUnavailable,
    /// An active camera stopped delivering frames
    CameraLost,
    /// Both decode strategies are unusable
    UpstreamStrategyFailure,
    /// A static image held no decodable code
    NoCode,
    /// A payload decoded but is not an attendance code
    DecodeAmbiguous,
    /// Uploaded bytes are not a readable image
    Image,
    /// Operation needs an active session
    NotScanning,
    /// The session was closed while the operation was in flight
    Cancelled,
}

/// Errors surfaced by the scanner
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Camera permission refused
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    /// The platform lists no camera at all
    #[error("no camera available")]
    NoCameraAvailable,

    /// Every device and constraint tier failed
    #[error("camera unavailable ({reason:?}): {source}")]
    DeviceUnavailable {
        /// Classified cause
        reason: Unavailability,
        /// Last underlying error
        #[source]
        source: CameraError,
    },

    /// The active camera was revoked or lost mid-session
    #[error("camera lost during scanning")]
    CameraLost,

    /// The hardware strategy failed and the software strategy could not start
    #[error("no usable decode strategy: {0}")]
    UpstreamStrategyFailure(#[source] StrategyError),

    /// Static image exhausted without any decodable code
    #[error("no code found in image")]
    NoCodeFound,

    /// A payload decoded but did not contain an attendance code
    #[error("decoded payload is not an attendance code: {payload:?}")]
    InvalidPayload {
        /// Raw decoded text
        payload: String,
    },

    /// Image bytes could not be decoded
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// The operation needs an open scanner
    #[error("scanner is not scanning")]
    NotScanning,

    /// The session was torn down while this operation was in flight
    #[error("scan session was closed")]
    Cancelled,
}

impl ScanError {
    /// Map a backend error raised during acquisition
    pub fn from_acquisition(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied(msg) => ScanError::PermissionDenied(msg),
            other => ScanError::DeviceUnavailable {
                reason: Unavailability::from_camera_error(&other),
                source: other,
            },
        }
    }

    /// Coarse category
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ScanError::NoCameraAvailable | ScanError::DeviceUnavailable { .. } => {
                ErrorKind::DeviceUnavailable
            }
            ScanError::CameraLost => ErrorKind::CameraLost,
            ScanError::UpstreamStrategyFailure(_) => ErrorKind::UpstreamStrategyFailure,
            ScanError::NoCodeFound => ErrorKind::NoCode,
            ScanError::InvalidPayload { .. } => ErrorKind::DecodeAmbiguous,
            ScanError::Image(_) => ErrorKind::Image,
            ScanError::NotScanning => ErrorKind::NotScanning,
            ScanError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PermissionDenied
                | ErrorKind::DeviceUnavailable
                | ErrorKind::CameraLost
                | ErrorKind::UpstreamStrategyFailure
        )
    }

    /// User-facing text with a remediation hint
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => {
                "Camera access was denied. Allow camera access in your settings, then tap retry."
            }
            ScanError::NoCameraAvailable
            | ScanError::DeviceUnavailable {
                reason: Unavailability::NotFound,
                ..
            } => "No camera was found on this device. Enter the code manually instead.",
            ScanError::DeviceUnavailable {
                reason: Unavailability::Busy,
                ..
            } => "The camera is in use by another app. Close it and tap retry.",
            ScanError::DeviceUnavailable { .. } => {
                "The camera could not be started. Tap retry or enter the code manually."
            }
            ScanError::CameraLost => "The camera stopped unexpectedly. Tap retry.",
            ScanError::UpstreamStrategyFailure(_) => {
                "Scanning is not supported here. Enter the code manually."
            }
            ScanError::NoCodeFound => "No code was found in the image. Try a sharper photo.",
            ScanError::InvalidPayload { .. } => "That code is not an attendance code.",
            ScanError::Image(_) => "The file could not be read as an image.",
            ScanError::NotScanning => "The scanner is not running.",
            ScanError::Cancelled => "Scanning was cancelled.",
        }
    }
}

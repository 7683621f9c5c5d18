/// Kind of media input reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Camera
    VideoInput,
    /// Microphone
    AudioInput,
    /// Anything else the platform lists
    Other,
}

/// Raw device entry as enumerated by a camera backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform device identifier
    pub device_id: String,
    /// Human-readable label; empty until camera permission was granted once
    pub label: String,
    /// Input kind
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    /// Convenience constructor for a camera entry
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }
}

/// Best guess at which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear / environment-facing
    Rear,
    /// Front / user-facing
    Front,
    /// No hint available
    Unknown,
}

/// Camera device as seen by the scanner. Re-enumerated on every open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Platform device identifier
    pub device_id: String,
    /// Human-readable label (may be empty)
    pub label: String,
    /// Label-derived facing guess
    pub facing_guess: Facing,
}

/// Decoded codes and strategy outcomes
pub mod code;
/// Camera devices as reported by the platform
pub mod device;
/// Owned video frames
pub mod frame;
/// Zoom capabilities and state
pub mod zoom;

pub use code::{CanonicalCode, CodeResult, DecodeAttempt, StrategyKind};
pub use device::{CameraDevice, DeviceDescriptor, DeviceKind, Facing};
pub use frame::Frame;
pub use zoom::{RangeCapability, ZoomMode, ZoomState};

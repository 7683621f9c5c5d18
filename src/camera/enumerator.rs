//! Camera discovery and rear/front classification.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::{CameraBackend, StreamConstraints};
use crate::error::{CameraError, ScanError};
use crate::models::{CameraDevice, DeviceDescriptor, DeviceKind, Facing};

static REAR_RE: OnceLock<Regex> = OnceLock::new();
static FRONT_RE: OnceLock<Regex> = OnceLock::new();

fn rear_re() -> &'static Regex {
    REAR_RE.get_or_init(|| Regex::new(r"(?i)back|rear|environment").expect("static regex"))
}

fn front_re() -> &'static Regex {
    FRONT_RE.get_or_init(|| Regex::new(r"(?i)front|user|face").expect("static regex"))
}

/// Classify enumerated cameras by label.
///
/// When no label hints at a rear camera the last device is assumed to be the
/// rear one. Platforms usually list it last, but nothing guarantees that.
pub fn classify(descriptors: &[DeviceDescriptor]) -> Vec<CameraDevice> {
    let mut devices: Vec<CameraDevice> = descriptors
        .iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .map(|d| {
            let facing_guess = if rear_re().is_match(&d.label) {
                Facing::Rear
            } else if front_re().is_match(&d.label) {
                Facing::Front
            } else {
                Facing::Unknown
            };
            CameraDevice {
                device_id: d.device_id.clone(),
                label: d.label.clone(),
                facing_guess,
            }
        })
        .collect();

    if !devices.iter().any(|d| d.facing_guess == Facing::Rear) {
        if let Some(last) = devices.last_mut() {
            last.facing_guess = Facing::Rear;
        }
    }

    devices
}

/// Index of the device to try first: the first rear-classified camera
pub fn preferred_index(devices: &[CameraDevice]) -> Option<usize> {
    devices
        .iter()
        .position(|d| d.facing_guess == Facing::Rear)
        .or_else(|| devices.len().checked_sub(1))
}

/// Device to try first
pub fn preferred_device(devices: &[CameraDevice]) -> Option<&CameraDevice> {
    preferred_index(devices).and_then(|i| devices.get(i))
}

/// Enumerate and classify cameras.
///
/// Labels only appear after a permission grant, so when every camera label
/// is empty a throwaway probe stream is opened first and enumeration repeated.
pub async fn list_devices<B: CameraBackend + ?Sized>(
    backend: &B,
) -> Result<Vec<CameraDevice>, ScanError> {
    let mut descriptors = backend.enumerate().await.map_err(ScanError::from_acquisition)?;

    let unlabeled = {
        let mut cameras = descriptors
            .iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .peekable();
        cameras.peek().is_some() && cameras.all(|d| d.label.trim().is_empty())
    };

    if unlabeled {
        debug!("camera labels empty, opening permission probe");
        match backend.open(&StreamConstraints::minimal()).await {
            Ok(probe) => {
                probe.stop();
                descriptors = backend
                    .enumerate()
                    .await
                    .map_err(ScanError::from_acquisition)?;
            }
            Err(CameraError::PermissionDenied(msg)) => {
                return Err(ScanError::PermissionDenied(msg));
            }
            Err(e) => {
                warn!("permission probe failed, continuing unlabeled: {e}");
            }
        }
    }

    let devices = classify(&descriptors);
    if devices.is_empty() {
        return Err(ScanError::NoCameraAvailable);
    }
    debug!("enumerated {} camera(s)", devices.len());
    Ok(devices)
}

//! Zoom control: hardware constraint when the track supports it, otherwise a
//! cosmetic scale on the preview.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PreviewSink, VideoTrack};
use crate::models::{RangeCapability, ZoomMode, ZoomState};
use crate::session::lock;

/// Step used for the visual zoom slider
pub const SOFTWARE_ZOOM_STEP: f64 = 0.1;

fn software_range(max: f64) -> RangeCapability {
    RangeCapability {
        min: 1.0,
        max: max.max(1.0),
        step: SOFTWARE_ZOOM_STEP,
    }
}

/// Switch `state` to visual zoom for the rest of the stream, keeping `target`
/// as close as the visual range allows.
fn visual_fallback(
    state: &Mutex<ZoomState>,
    preview: Option<&Arc<dyn PreviewSink>>,
    software_max: f64,
    target: f64,
) -> ZoomState {
    let mut fallback = ZoomState::reset(software_range(software_max), ZoomMode::Software);
    fallback.level = fallback.clamp(target);
    *lock(state) = fallback;
    if let Some(preview) = preview {
        preview.set_visual_scale(fallback.level);
    }
    fallback
}

/// Zoom controller bound to one stream. Rebuilt on every reacquisition,
/// which resets the level and re-queries the capability range.
pub struct ZoomController {
    state: Arc<Mutex<ZoomState>>,
    track: Option<Arc<dyn VideoTrack>>,
    preview: Option<Arc<dyn PreviewSink>>,
    software_max: f64,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
}

impl ZoomController {
    /// Query `track` capabilities and start at level 1
    pub fn new(
        track: Option<Arc<dyn VideoTrack>>,
        preview: Option<Arc<dyn PreviewSink>>,
        software_max: f64,
        debounce: Duration,
    ) -> Self {
        let hardware = track
            .as_ref()
            .and_then(|t| t.capabilities().zoom)
            .filter(|r| r.min.is_finite() && r.max.is_finite() && r.max > r.min);
        let state = match hardware {
            Some(range) => ZoomState::reset(range, ZoomMode::Hardware),
            None => ZoomState::reset(software_range(software_max), ZoomMode::Software),
        };
        debug!(mode = ?state.mode, min = state.min, max = state.max, "zoom range");
        if let Some(preview) = &preview {
            preview.set_visual_scale(1.0);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            track,
            preview,
            software_max,
            debounce,
            pending: None,
        }
    }

    /// Current state
    pub fn state(&self) -> ZoomState {
        *lock(&self.state)
    }

    /// Request a zoom level; the returned state holds the clamped level.
    ///
    /// Hardware requests are debounced: a newer request cancels a pending one.
    pub fn set_zoom(&mut self, level: f64) -> ZoomState {
        let snapshot = {
            let mut state = lock(&self.state);
            state.level = state.clamp(level);
            *state
        };

        match (snapshot.mode, self.track.clone()) {
            (ZoomMode::Hardware, Some(track)) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    warn!("no async runtime to apply hardware zoom, switching to visual zoom");
                    return visual_fallback(
                        &self.state,
                        self.preview.as_ref(),
                        self.software_max,
                        snapshot.level,
                    );
                };
                if let Some(pending) = self.pending.take() {
                    pending.abort();
                }
                let state = Arc::clone(&self.state);
                let preview = self.preview.clone();
                let debounce = self.debounce;
                let software_max = self.software_max;
                let target = snapshot.level;
                self.pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    if let Err(e) = track.apply_zoom(target).await {
                        warn!("hardware zoom rejected, switching to visual zoom: {e}");
                        visual_fallback(&state, preview.as_ref(), software_max, target);
                    }
                }));
            }
            _ => {
                if let Some(preview) = &self.preview {
                    preview.set_visual_scale(snapshot.level);
                }
            }
        }

        snapshot
    }

    /// Cancel any pending hardware apply
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for ZoomController {
    fn drop(&mut self) {
        self.cancel();
    }
}

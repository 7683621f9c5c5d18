//! Lifecycle management: one exclusively owned stream session per scanner,
//! deterministic teardown, and the session generation counter.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::camera::zoom::ZoomController;
use crate::camera::{MediaStream, PreviewSink, TrackCapabilities};
use crate::models::StrategyKind;
use crate::strategy::{DecodeStrategy, SoftwareSampler};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Snapshot of the session generation.
///
/// Async continuations capture one before suspending and compare it with the
/// current value when they resume; a mismatch means the session they belong
/// to was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The live camera session
pub struct StreamSession {
    pub(crate) device_id: Option<String>,
    pub(crate) stream: MediaStream,
    pub(crate) capabilities: TrackCapabilities,
    pub(crate) strategy: Arc<dyn DecodeStrategy>,
    pub(crate) poller: Option<JoinHandle<()>>,
    pub(crate) sampler: Option<SoftwareSampler>,
    pub(crate) zoom: ZoomController,
}

impl StreamSession {
    pub(crate) fn new(
        stream: MediaStream,
        strategy: Arc<dyn DecodeStrategy>,
        zoom: ZoomController,
    ) -> Self {
        let capabilities = stream
            .video_track()
            .map(|t| t.capabilities())
            .unwrap_or_default();
        Self {
            device_id: stream.device_id().map(str::to_string),
            stream,
            capabilities,
            strategy,
            poller: None,
            sampler: None,
            zoom,
        }
    }

    /// Device the stream was opened on
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Capabilities captured at acquisition time
    pub fn capabilities(&self) -> &TrackCapabilities {
        &self.capabilities
    }

    /// Active strategy
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }
}

/// Owner of the single [`StreamSession`] and the generation counter
pub struct Lifecycle {
    generation: u64,
    session: Option<StreamSession>,
    preview: Option<Arc<dyn PreviewSink>>,
    preview_bound: bool,
    brightness: Option<u8>,
    released_at: Option<Instant>,
}

impl Lifecycle {
    /// Empty lifecycle; `preview` receives the stream binding
    pub fn new(preview: Option<Arc<dyn PreviewSink>>) -> Self {
        Self {
            generation: 0,
            session: None,
            preview,
            preview_bound: false,
            brightness: None,
            released_at: None,
        }
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    /// Whether `captured` still names the live session
    pub fn is_current(&self, captured: Generation) -> bool {
        captured.0 == self.generation
    }

    /// Active session, if any
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut StreamSession> {
        self.session.as_mut()
    }

    /// Whether a session is installed
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Latest mean-luma reading
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    pub(crate) fn record_brightness(&mut self, value: u8) {
        self.brightness = Some(value);
    }

    /// Note that a stream was just stopped outside of [`Lifecycle::teardown`]
    pub(crate) fn note_release(&mut self) {
        self.released_at = Some(Instant::now());
    }

    /// How much of `settle` is still left since the last stream was released
    pub fn settle_remaining(&self, settle: Duration) -> Duration {
        self.released_at
            .map_or(Duration::ZERO, |at| settle.saturating_sub(at.elapsed()))
    }

    pub(crate) fn preview(&self) -> Option<Arc<dyn PreviewSink>> {
        self.preview.clone()
    }

    /// Install a freshly acquired session. Any previous session is torn down
    /// first so two sessions never coexist.
    pub(crate) fn install(&mut self, session: StreamSession) -> Generation {
        if self.session.is_some() {
            self.teardown();
        }
        if let Some(preview) = &self.preview {
            preview.attach(&session.stream);
            self.preview_bound = true;
        }
        self.session = Some(session);
        self.generation()
    }

    /// Release every resource and advance the generation.
    ///
    /// Order: polling task, decoder, media tracks, preview binding, transient
    /// state. Safe to call any number of times; returns whether a session was
    /// actually released.
    pub fn teardown(&mut self) -> bool {
        self.generation += 1;
        let mut session = self.session.take();
        if let Some(session) = session.as_mut() {
            if let Some(poller) = session.poller.take() {
                poller.abort();
            }
            if let Some(sampler) = session.sampler.take() {
                sampler.stop();
            }
            session.strategy.dispose();
            session.stream.stop();
            self.released_at = Some(Instant::now());
        }
        if self.preview_bound {
            if let Some(preview) = &self.preview {
                preview.detach();
            }
            self.preview_bound = false;
        }
        let released = match session {
            Some(mut session) => {
                session.zoom.cancel();
                true
            }
            None => false,
        };
        self.brightness = None;
        debug!(generation = self.generation, released, "session teardown");
        released
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.teardown();
        }
    }
}

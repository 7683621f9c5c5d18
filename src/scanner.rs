//! Decode orchestration: the scanner state machine, strategy selection and
//! downgrade, result delivery, and the public [`Scanner`] entry points.
//!
//! All mutable state sits behind one mutex. Background tasks (hardware poll
//! loop, software sampler) hold only a [`Weak`] handle plus the session
//! [`Generation`] they were started for, so dropping the last `Scanner`
//! clone tears the session down and stale tasks fall silent.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::camera::acquirer::{Acquired, StreamAcquirer};
use crate::camera::enumerator::{list_devices, preferred_index};
use crate::camera::zoom::ZoomController;
use crate::camera::{CameraBackend, PreviewSink, VideoTrack};
use crate::config::ScannerConfig;
use crate::error::{CameraError, ErrorKind, ScanError, StrategyError};
use crate::models::{CameraDevice, CodeResult, DecodeAttempt, StrategyKind, ZoomState};
use crate::preprocess::Preprocessor;
use crate::session::{Generation, Lifecycle, StreamSession, lock};
use crate::static_scan::StaticImageScanner;
use crate::strategy::{
    DecodeStrategy, HardwareStrategy, SampleEvent, SoftwareDecoder, SoftwareSampler,
};
use crate::validator::validate;

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScannerState {
    /// Never opened
    Idle,
    /// Enumerating and acquiring a camera
    Initializing,
    /// A strategy is decoding frames
    Scanning,
    /// A code was delivered; the session is released
    Success,
    /// Closed, or ended by a fatal error
    Stopped,
}

impl fmt::Display for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScannerState::Idle => "idle",
            ScannerState::Initializing => "initializing",
            ScannerState::Scanning => "scanning",
            ScannerState::Success => "success",
            ScannerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why manual code entry is being suggested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualEntryReason {
    /// Opening the camera failed repeatedly
    RepeatedInitFailure,
    /// Codes keep decoding but none is an attendance code
    RepeatedInvalidPayload,
}

/// Receives scanner outcomes.
///
/// Callbacks run on whatever task produced the outcome and must not block.
/// Any `Fn(CodeResult)` closure is a listener.
pub trait ScanListener: Send + Sync {
    /// A validated code. Called at most once per session, after teardown.
    fn on_success(&self, result: CodeResult);

    /// A fatal error ended the session, or opening failed
    fn on_error(&self, error: &ScanError) {
        let _ = error;
    }

    /// Scanning is not getting anywhere; offer the manual input path
    fn on_manual_entry_suggested(&self, reason: ManualEntryReason) {
        let _ = reason;
    }
}

impl<F> ScanListener for F
where
    F: Fn(CodeResult) + Send + Sync,
{
    fn on_success(&self, result: CodeResult) {
        self(result)
    }
}

/// Read-only snapshot of the scanner
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStatus {
    /// Current state
    pub state: ScannerState,
    /// Current session generation
    pub generation: Generation,
    /// Active strategy while scanning
    pub strategy: Option<StrategyKind>,
    /// Device the live stream was opened on
    pub device_id: Option<String>,
    /// Zoom state while scanning
    pub zoom: Option<ZoomState>,
    /// Latest mean luma of a sampled frame
    pub brightness: Option<u8>,
    /// Brightness is below the configured low-light threshold
    pub low_light: bool,
    /// Manual entry was offered since the last successful open
    pub manual_entry_suggested: bool,
    /// Failed opens since the last successful one
    pub consecutive_init_failures: u32,
    /// Invalid payloads in a row during this session
    pub consecutive_ambiguous: u32,
    /// Category of the last error that ended a session or open
    pub last_error: Option<ErrorKind>,
}

type StrategyFactory = Arc<dyn Fn() -> Arc<dyn DecodeStrategy> + Send + Sync>;

struct Inner {
    lifecycle: Lifecycle,
    state: ScannerState,
    listener: Option<Arc<dyn ScanListener>>,
    devices: Vec<CameraDevice>,
    device_index: Option<usize>,
    consecutive_init_failures: u32,
    consecutive_ambiguous: u32,
    manual_entry_offered: bool,
    last_error: Option<ErrorKind>,
}

struct Shared {
    backend: Arc<dyn CameraBackend>,
    config: ScannerConfig,
    software: StrategyFactory,
    inner: Mutex<Inner>,
}

/// Configures a [`Scanner`]
pub struct ScannerBuilder {
    backend: Arc<dyn CameraBackend>,
    config: ScannerConfig,
    preview: Option<Arc<dyn PreviewSink>>,
    software: StrategyFactory,
}

impl ScannerBuilder {
    /// Replace the default configuration
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind live streams and visual zoom to `preview`
    pub fn preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Build the software strategy with `factory` instead of the `rqrr`
    /// decoder. Called once per session that needs it.
    pub fn software_strategy<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn DecodeStrategy> + Send + Sync + 'static,
    {
        self.software = Arc::new(factory);
        self
    }

    /// Finish
    pub fn build(self) -> Scanner {
        let inner = Inner {
            lifecycle: Lifecycle::new(self.preview),
            state: ScannerState::Idle,
            listener: None,
            devices: Vec::new(),
            device_index: None,
            consecutive_init_failures: 0,
            consecutive_ambiguous: 0,
            manual_entry_offered: false,
            last_error: None,
        };
        Scanner {
            shared: Arc::new(Shared {
                backend: self.backend,
                config: self.config.normalized(),
                software: self.software,
                inner: Mutex::new(inner),
            }),
        }
    }
}

/// Attendance QR scanner over a platform camera backend.
///
/// Cheap to clone; clones share one session. Dropping the last clone
/// releases the camera.
#[derive(Clone)]
pub struct Scanner {
    shared: Arc<Shared>,
}

impl Scanner {
    /// Scanner with default preview-less setup
    pub fn new(backend: Arc<dyn CameraBackend>, config: ScannerConfig) -> Self {
        Self::builder(backend).config(config).build()
    }

    /// Start configuring a scanner
    pub fn builder(backend: Arc<dyn CameraBackend>) -> ScannerBuilder {
        ScannerBuilder {
            backend,
            config: ScannerConfig::default(),
            preview: None,
            software: Arc::new(|| Arc::new(SoftwareDecoder::new()) as Arc<dyn DecodeStrategy>),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.shared.config
    }

    /// Open the camera and start scanning.
    ///
    /// A call while another open is in flight, or while already scanning, is
    /// a no-op. Failures leave the scanner `Stopped`, are reported to the
    /// listener's `on_error` and returned; calling `open` again retries.
    pub async fn open<L>(&self, listener: L) -> Result<(), ScanError>
    where
        L: ScanListener + 'static,
    {
        let (generation, settle) = {
            let mut inner = lock(&self.shared.inner);
            if matches!(
                inner.state,
                ScannerState::Initializing | ScannerState::Scanning
            ) {
                debug!(state = %inner.state, "open ignored, scanner already active");
                return Ok(());
            }
            let listener: Arc<dyn ScanListener> = Arc::new(listener);
            inner.state = ScannerState::Initializing;
            inner.listener = Some(listener);
            inner.consecutive_ambiguous = 0;
            (
                inner.lifecycle.generation(),
                inner
                    .lifecycle
                    .settle_remaining(self.shared.config.settle_delay()),
            )
        };
        info!(%generation, "opening scanner");
        if !settle.is_zero() {
            debug!(?settle, "camera released recently, settling");
            tokio::time::sleep(settle).await;
        }

        let outcome = match self.shared.acquire_preferred().await {
            Ok((devices, index, acquired)) => {
                self.shared
                    .activate(generation, devices, index, acquired)
                    .await
            }
            Err(e) => Err(e),
        };
        outcome.map_err(|e| self.shared.init_failed(generation, e))
    }

    /// Release everything. Safe to call at any time, any number of times.
    pub fn close(&self) {
        let mut inner = lock(&self.shared.inner);
        let released = inner.lifecycle.teardown();
        if matches!(
            inner.state,
            ScannerState::Initializing | ScannerState::Scanning
        ) {
            inner.state = ScannerState::Stopped;
        }
        inner.listener = None;
        info!(released, generation = %inner.lifecycle.generation(), "scanner closed");
    }

    /// Request a zoom level; returns the clamped state.
    ///
    /// Hardware zoom is applied on a debounced Tokio task. Called outside a
    /// runtime, the session switches to visual zoom instead.
    pub fn set_zoom(&self, level: f64) -> Result<ZoomState, ScanError> {
        let mut inner = lock(&self.shared.inner);
        if inner.state != ScannerState::Scanning {
            return Err(ScanError::NotScanning);
        }
        inner
            .lifecycle
            .session_mut()
            .map(|session| session.zoom.set_zoom(level))
            .ok_or(ScanError::NotScanning)
    }

    /// Move to the next enumerated camera, wrapping around.
    ///
    /// The current stream is released before the next one is requested; zoom
    /// starts over at level 1 on the new stream.
    pub async fn switch_device(&self) -> Result<(), ScanError> {
        let (generation, devices, index, previous) = {
            let mut inner = lock(&self.shared.inner);
            if inner.state != ScannerState::Scanning || inner.devices.is_empty() {
                return Err(ScanError::NotScanning);
            }
            let Some(previous) = inner.lifecycle.session().map(|s| s.stream.clone()) else {
                return Err(ScanError::NotScanning);
            };
            let index = inner
                .device_index
                .map_or(0, |i| (i + 1) % inner.devices.len());
            inner.lifecycle.teardown();
            inner.state = ScannerState::Initializing;
            (
                inner.lifecycle.generation(),
                inner.devices.clone(),
                index,
                previous,
            )
        };
        let device_id = devices[index].device_id.clone();
        info!(device = %device_id, %generation, "switching camera");

        let outcome = match self
            .shared
            .acquirer()
            .acquire(Some(&device_id), Some(previous))
            .await
        {
            Ok(acquired) => {
                self.shared
                    .activate(generation, devices, index, acquired)
                    .await
            }
            Err(e) => Err(e),
        };
        outcome.map_err(|e| self.shared.init_failed(generation, e))
    }

    /// Decode an uploaded image.
    ///
    /// Runs every preprocessing candidate through the hardware detector (if
    /// the backend has one) and then the software decoder. A valid code is
    /// also delivered to the listener, subject to the once-per-session rule.
    pub async fn submit_static_image(&self, bytes: &[u8]) -> Result<CodeResult, ScanError> {
        let config = &self.shared.config;
        let scanner = StaticImageScanner::new(
            Preprocessor::new(config.upscale_floor),
            self.shared.static_strategies(),
            config.deep_link_base.clone(),
        );
        let result = scanner.scan_bytes(bytes).await?;
        self.shared.complete(None, result.clone());
        Ok(result)
    }

    /// Accept a code typed by the user. Goes through the same validation
    /// and delivery gate as scanned codes.
    pub fn submit_manual_code(&self, text: &str) -> Result<CodeResult, ScanError> {
        let result = validate(text)
            .into_code_result(self.shared.config.deep_link_base.as_deref(), None)
            .ok_or_else(|| ScanError::InvalidPayload {
                payload: text.to_string(),
            })?;
        self.shared.complete(None, result.clone());
        Ok(result)
    }

    /// Snapshot of the current state
    pub fn status(&self) -> ScanStatus {
        let inner = lock(&self.shared.inner);
        let session = inner.lifecycle.session();
        let brightness = inner.lifecycle.brightness();
        ScanStatus {
            state: inner.state,
            generation: inner.lifecycle.generation(),
            strategy: session.map(StreamSession::strategy_kind),
            device_id: session.and_then(|s| s.device_id().map(str::to_string)),
            zoom: session.map(|s| s.zoom.state()),
            brightness,
            low_light: brightness.is_some_and(|b| b < self.shared.config.low_light_threshold),
            manual_entry_suggested: inner.manual_entry_offered,
            consecutive_init_failures: inner.consecutive_init_failures,
            consecutive_ambiguous: inner.consecutive_ambiguous,
            last_error: inner.last_error,
        }
    }
}

impl Shared {
    fn acquirer(&self) -> StreamAcquirer<'_, dyn CameraBackend> {
        StreamAcquirer::new(
            self.backend.as_ref(),
            self.config.tier_backoff(),
            self.config.settle_delay(),
        )
    }

    /// Enumerate, then acquire the preferred camera. When it is busy or
    /// missing, every other camera that passes a probe is tried in turn.
    async fn acquire_preferred(
        &self,
    ) -> Result<(Vec<CameraDevice>, usize, Acquired), ScanError> {
        let devices = list_devices(self.backend.as_ref()).await?;
        let preferred = preferred_index(&devices).ok_or(ScanError::NoCameraAvailable)?;
        let acquirer = self.acquirer();

        let mut last = match acquirer
            .acquire(Some(&devices[preferred].device_id), None)
            .await
        {
            Ok(acquired) => return Ok((devices, preferred, acquired)),
            Err(e @ ScanError::DeviceUnavailable { .. }) => e,
            Err(e) => return Err(e),
        };

        let alternates: Vec<(usize, String)> = devices
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != preferred)
            .map(|(i, d)| (i, d.device_id.clone()))
            .collect();
        for (index, device_id) in alternates {
            if !acquirer.probe(&device_id).await {
                debug!(device = %device_id, "alternate camera failed probe");
                continue;
            }
            // The probe just released this camera
            acquirer.settle().await;
            match acquirer.acquire(Some(&device_id), None).await {
                Ok(acquired) => {
                    info!(device = %device_id, "preferred camera unavailable, using alternate");
                    return Ok((devices, index, acquired));
                }
                Err(e @ ScanError::PermissionDenied(_)) => return Err(e),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Hardware when the backend exposes a detector that warms up, else the
    /// software decoder.
    async fn select_strategy(&self) -> Result<Arc<dyn DecodeStrategy>, ScanError> {
        if let Some(detector) = self.backend.frame_detector() {
            let hardware: Arc<dyn DecodeStrategy> =
                Arc::new(HardwareStrategy::new(detector, self.config.enhance_on_miss));
            match hardware.warm_up().await {
                Ok(()) => return Ok(hardware),
                Err(e) => warn!("hardware detector unavailable, using software decoder: {e}"),
            }
        }
        let software = (self.software)();
        software
            .warm_up()
            .await
            .map_err(ScanError::UpstreamStrategyFailure)?;
        Ok(software)
    }

    fn static_strategies(&self) -> Vec<Arc<dyn DecodeStrategy>> {
        let mut strategies: Vec<Arc<dyn DecodeStrategy>> = Vec::with_capacity(2);
        if let Some(detector) = self.backend.frame_detector() {
            strategies.push(Arc::new(HardwareStrategy::new(
                detector,
                self.config.enhance_on_miss,
            )));
        }
        strategies.push((self.software)());
        strategies
    }

    /// Install a freshly acquired stream and start its driver, unless the
    /// session was closed while acquisition was in flight.
    async fn activate(
        self: &Arc<Self>,
        generation: Generation,
        devices: Vec<CameraDevice>,
        index: usize,
        acquired: Acquired,
    ) -> Result<(), ScanError> {
        let strategy = match self.select_strategy().await {
            Ok(strategy) => strategy,
            Err(e) => {
                acquired.stream.stop();
                return Err(e);
            }
        };
        let Some(track) = acquired.stream.video_track() else {
            strategy.dispose();
            acquired.stream.stop();
            return Err(ScanError::CameraLost);
        };

        let mut inner = lock(&self.inner);
        if !inner.lifecycle.is_current(generation) || inner.state != ScannerState::Initializing {
            inner.lifecycle.note_release();
            drop(inner);
            info!(%generation, "acquisition resolved after close, releasing stream");
            strategy.dispose();
            acquired.stream.stop();
            return Err(ScanError::Cancelled);
        }

        let zoom = ZoomController::new(
            Some(Arc::clone(&track)),
            inner.lifecycle.preview(),
            self.config.software_zoom_max,
            self.config.zoom_debounce(),
        );
        let kind = strategy.kind();
        let session = StreamSession::new(acquired.stream, Arc::clone(&strategy), zoom);
        let generation = inner.lifecycle.install(session);

        let (poller, sampler) = match kind {
            StrategyKind::Hardware => {
                let poller = tokio::spawn(poll_hardware(
                    Arc::downgrade(self),
                    generation,
                    strategy,
                    track,
                    self.config.poll_interval(),
                ));
                (Some(poller), None)
            }
            StrategyKind::Software => (None, Some(self.start_sampler(generation, strategy, track))),
        };
        if let Some(session) = inner.lifecycle.session_mut() {
            session.poller = poller;
            session.sampler = sampler;
        }

        inner.state = ScannerState::Scanning;
        inner.devices = devices;
        inner.device_index = Some(index);
        inner.consecutive_init_failures = 0;
        inner.consecutive_ambiguous = 0;
        inner.manual_entry_offered = false;
        inner.last_error = None;
        info!(
            %generation,
            strategy = %kind,
            tier = acquired.tier,
            degraded = acquired.degraded,
            "scanning"
        );
        Ok(())
    }

    fn start_sampler(
        self: &Arc<Self>,
        generation: Generation,
        strategy: Arc<dyn DecodeStrategy>,
        track: Arc<dyn VideoTrack>,
    ) -> SoftwareSampler {
        let weak = Arc::downgrade(self);
        SoftwareSampler::start(
            strategy,
            track,
            self.config.software_sample_interval(),
            move |event| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                match event {
                    SampleEvent::Attempt {
                        attempt,
                        brightness,
                    } => {
                        shared.handle_attempt(generation, attempt, brightness);
                    }
                    SampleEvent::Lost(e) => {
                        debug!("software sampler lost its track: {e}");
                        shared.fail(generation, ScanError::CameraLost);
                    }
                }
            },
        )
    }

    /// Record one attempt. Returns whether the session is still scanning.
    fn handle_attempt(&self, generation: Generation, attempt: DecodeAttempt, brightness: u8) -> bool {
        let mut inner = lock(&self.inner);
        if !inner.lifecycle.is_current(generation) || inner.state != ScannerState::Scanning {
            return false;
        }
        inner.lifecycle.record_brightness(brightness);

        let Some(payload) = attempt.raw_payload else {
            trace!(strategy = %attempt.strategy, brightness, "no code in frame");
            return true;
        };

        let validation = validate(&payload);
        if let Some(result) = validation
            .into_code_result(self.config.deep_link_base.as_deref(), Some(attempt.strategy))
        {
            drop(inner);
            self.complete(Some(generation), result);
            return false;
        }

        inner.consecutive_ambiguous += 1;
        debug!(
            count = inner.consecutive_ambiguous,
            "decoded payload is not an attendance code"
        );
        if inner.consecutive_ambiguous >= self.config.ambiguous_threshold
            && !inner.manual_entry_offered
        {
            inner.manual_entry_offered = true;
            let listener = inner.listener.clone();
            drop(inner);
            info!("repeated invalid payloads, suggesting manual entry");
            if let Some(listener) = listener {
                listener.on_manual_entry_suggested(ManualEntryReason::RepeatedInvalidPayload);
            }
        }
        true
    }

    /// Deliver a result through the once-per-session gate.
    ///
    /// With `expected`, the result only counts if that generation is still
    /// scanning. Teardown completes before the listener runs.
    fn complete(&self, expected: Option<Generation>, result: CodeResult) -> bool {
        let mut inner = lock(&self.inner);
        if let Some(generation) = expected {
            if !inner.lifecycle.is_current(generation) || inner.state != ScannerState::Scanning {
                return false;
            }
        }
        if inner.state == ScannerState::Success {
            debug!("code already delivered this session, ignoring");
            return false;
        }
        inner.lifecycle.teardown();
        inner.state = ScannerState::Success;
        let listener = inner.listener.take();
        drop(inner);

        info!(code = %result.code, strategy = ?result.strategy, "attendance code accepted");
        if let Some(listener) = listener {
            listener.on_success(result);
        }
        true
    }

    /// End the session `generation` with a fatal error
    fn fail(&self, generation: Generation, error: ScanError) {
        let mut inner = lock(&self.inner);
        if !inner.lifecycle.is_current(generation) {
            return;
        }
        inner.lifecycle.teardown();
        inner.state = ScannerState::Stopped;
        inner.last_error = Some(error.kind());
        let listener = inner.listener.take();
        drop(inner);

        warn!(%generation, "scan session ended: {error}");
        if let Some(listener) = listener {
            listener.on_error(&error);
        }
    }

    /// Settle a failed open or switch. Returns the error for the caller.
    fn init_failed(&self, generation: Generation, error: ScanError) -> ScanError {
        let mut inner = lock(&self.inner);
        if !inner.lifecycle.is_current(generation) || inner.state != ScannerState::Initializing {
            debug!(%generation, "open failed after close: {error}");
            return ScanError::Cancelled;
        }
        inner.state = ScannerState::Stopped;
        inner.last_error = Some(error.kind());
        inner.consecutive_init_failures += 1;
        let offer = inner.consecutive_init_failures == self.config.init_failure_threshold;
        if offer {
            inner.manual_entry_offered = true;
        }
        let listener = inner.listener.take();
        drop(inner);

        warn!("scanner failed to start: {error}");
        if let Some(listener) = listener {
            listener.on_error(&error);
            if offer {
                listener.on_manual_entry_suggested(ManualEntryReason::RepeatedInitFailure);
            }
        }
        error
    }

    /// Replace a failing hardware strategy with the software one for the
    /// rest of the session. Runs on the poll task.
    async fn downgrade(
        self: &Arc<Self>,
        generation: Generation,
        track: Arc<dyn VideoTrack>,
        cause: StrategyError,
    ) {
        warn!(%generation, "hardware detector failed, switching to software decoder: {cause}");
        let software = (self.software)();
        if let Err(e) = software.warm_up().await {
            self.fail(generation, ScanError::UpstreamStrategyFailure(e));
            return;
        }

        let mut inner = lock(&self.inner);
        if !inner.lifecycle.is_current(generation) || inner.state != ScannerState::Scanning {
            software.dispose();
            return;
        }
        let sampler = self.start_sampler(generation, Arc::clone(&software), track);
        if let Some(session) = inner.lifecycle.session_mut() {
            session.strategy.dispose();
            session.strategy = software;
            // This task is the poller; dropping its handle detaches it.
            session.poller = None;
            session.sampler = Some(sampler);
        }
    }
}

/// Pull loop for the hardware strategy. Missed ticks are skipped rather than
/// bunched up behind a slow detector.
async fn poll_hardware(
    weak: Weak<Shared>,
    generation: Generation,
    strategy: Arc<dyn DecodeStrategy>,
    track: Arc<dyn VideoTrack>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let frame = match track.grab_frame().await {
            Ok(frame) => frame,
            Err(CameraError::TrackEnded) => {
                if let Some(shared) = weak.upgrade() {
                    shared.fail(generation, ScanError::CameraLost);
                }
                return;
            }
            Err(e) => {
                debug!("frame grab failed: {e}");
                continue;
            }
        };
        let brightness = frame.mean_luma();
        let outcome = strategy.attempt_decode(&frame).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        let attempt = match outcome {
            Ok(Some(payload)) => DecodeAttempt::hit(StrategyKind::Hardware, payload),
            Ok(None) => DecodeAttempt::miss(StrategyKind::Hardware),
            Err(e) => {
                shared.downgrade(generation, track, e).await;
                return;
            }
        };
        if !shared.handle_attempt(generation, attempt, brightness) {
            return;
        }
    }
}

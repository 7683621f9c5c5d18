//! Scripted fakes for the platform camera seams.

#![allow(dead_code)]

use async_trait::async_trait;
use attend_qr::camera::{
    CameraBackend, DeviceSelector, MediaStream, PreviewSink, StreamConstraints, TrackCapabilities,
    VideoTrack,
};
use attend_qr::error::{CameraError, StrategyError};
use attend_qr::models::{DeviceDescriptor, Frame, RangeCapability, StrategyKind};
use attend_qr::strategy::{DecodeStrategy, FrameDetector};
use attend_qr::{CodeResult, ErrorKind, ManualEntryReason, ScanError, ScanListener, ScannerConfig};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use qrcode::{Color, QrCode};
use std::io::Cursor;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const VALID_CODE: &str = "abcdef123456";

/// Shared, ordered record of side effects across fakes
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events().iter().position(|e| e.starts_with(prefix))
    }
}

pub struct FakeTrack {
    id: String,
    live: AtomicBool,
    ended: AtomicBool,
    zoom: Option<RangeCapability>,
    reject_zoom: bool,
    brightness: u8,
    applied: Mutex<Vec<f64>>,
    log: EventLog,
}

impl FakeTrack {
    pub fn is_stopped(&self) -> bool {
        !self.live.load(Ordering::SeqCst)
    }

    /// Simulate the camera being unplugged or revoked
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn applied_zoom(&self) -> Vec<f64> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.log.push(format!("stop:{}", self.id));
        }
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities { zoom: self.zoom }
    }

    async fn apply_zoom(&self, level: f64) -> Result<(), CameraError> {
        if self.reject_zoom {
            return Err(CameraError::OverConstrained("zoom".into()));
        }
        self.applied.lock().unwrap().push(level);
        Ok(())
    }

    async fn grab_frame(&self) -> Result<Frame, CameraError> {
        if self.ended.load(Ordering::SeqCst) || !self.is_live() {
            return Err(CameraError::TrackEnded);
        }
        Ok(Frame::from_luma(8, 8, vec![self.brightness; 64]).unwrap())
    }
}

#[derive(Clone)]
pub struct FakeDevice {
    pub id: String,
    pub label: String,
    pub zoom: Option<RangeCapability>,
}

impl FakeDevice {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            zoom: None,
        }
    }

    pub fn with_zoom(mut self, min: f64, max: f64, step: f64) -> Self {
        self.zoom = Some(RangeCapability { min, max, step });
        self
    }
}

/// Camera backend driven by flags the test flips
pub struct FakeBackend {
    devices: Vec<FakeDevice>,
    pub log: EventLog,
    granted: AtomicBool,
    deny: AtomicBool,
    busy: Mutex<HashSet<String>>,
    any_error: Mutex<Option<CameraError>>,
    open_delay: Mutex<Duration>,
    reject_zoom: bool,
    brightness: u8,
    detector: Option<Arc<ScriptedDetector>>,
    opened: Mutex<Vec<Arc<FakeTrack>>>,
    open_calls: Mutex<Vec<StreamConstraints>>,
    open_times: Mutex<Vec<Instant>>,
}

impl FakeBackend {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices,
            log: EventLog::default(),
            granted: AtomicBool::new(true),
            deny: AtomicBool::new(false),
            busy: Mutex::new(HashSet::new()),
            any_error: Mutex::new(None),
            open_delay: Mutex::new(Duration::ZERO),
            reject_zoom: false,
            brightness: 128,
            detector: None,
            opened: Mutex::new(Vec::new()),
            open_calls: Mutex::new(Vec::new()),
            open_times: Mutex::new(Vec::new()),
        }
    }

    /// One rear camera, one front camera
    pub fn phone() -> Self {
        Self::new(vec![
            FakeDevice::new("rear-0", "Back Camera"),
            FakeDevice::new("front-0", "Front Camera"),
        ])
    }

    pub fn with_detector(mut self, detector: Arc<ScriptedDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn rejecting_zoom(mut self) -> Self {
        self.reject_zoom = true;
        self
    }

    /// Labels stay empty until a stream has been opened once
    pub fn ungranted(self) -> Self {
        self.granted.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_denied(&self, denied: bool) {
        self.deny.store(denied, Ordering::SeqCst);
    }

    pub fn set_busy(&self, device_id: &str) {
        self.busy.lock().unwrap().insert(device_id.to_string());
    }

    pub fn fail_any(&self, error: CameraError) {
        *self.any_error.lock().unwrap() = Some(error);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn opened(&self) -> Vec<Arc<FakeTrack>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn last_track(&self) -> Arc<FakeTrack> {
        self.opened().last().cloned().expect("no stream opened")
    }

    pub fn open_calls(&self) -> Vec<StreamConstraints> {
        self.open_calls.lock().unwrap().clone()
    }

    /// When each `open` call arrived, in call order
    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().unwrap().clone()
    }

    fn pick(&self, selector: &DeviceSelector) -> Result<FakeDevice, CameraError> {
        let busy = self.busy.lock().unwrap();
        match selector {
            DeviceSelector::Exact(id) | DeviceSelector::Ideal(id) => {
                let device = self
                    .devices
                    .iter()
                    .find(|d| &d.id == id)
                    .ok_or_else(|| CameraError::NotFound(id.clone()))?;
                if busy.contains(id) {
                    return Err(CameraError::Busy(id.clone()));
                }
                Ok(device.clone())
            }
            DeviceSelector::Any => {
                if let Some(error) = self.any_error.lock().unwrap().clone() {
                    return Err(error);
                }
                if self.devices.is_empty() {
                    return Err(CameraError::NotFound("no video input".into()));
                }
                self.devices
                    .iter()
                    .find(|d| !busy.contains(&d.id))
                    .cloned()
                    .ok_or_else(|| CameraError::Busy("all cameras busy".into()))
            }
        }
    }
}

#[async_trait]
impl CameraBackend for FakeBackend {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let granted = self.granted.load(Ordering::SeqCst);
        let mut out: Vec<DeviceDescriptor> = self
            .devices
            .iter()
            .map(|d| DeviceDescriptor::video(d.id.clone(), if granted { d.label.as_str() } else { "" }))
            .collect();
        out.push(DeviceDescriptor {
            device_id: "mic-0".into(),
            label: if granted { "Microphone".into() } else { String::new() },
            kind: attend_qr::models::DeviceKind::AudioInput,
        });
        Ok(out)
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<MediaStream, CameraError> {
        self.open_calls.lock().unwrap().push(constraints.clone());
        self.open_times.lock().unwrap().push(Instant::now());
        let delay = *self.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied("user dismissed prompt".into()));
        }
        let device = self.pick(&constraints.device)?;
        self.granted.store(true, Ordering::SeqCst);

        let n = self.opened.lock().unwrap().len();
        let track = Arc::new(FakeTrack {
            id: format!("{}#{n}", device.id),
            live: AtomicBool::new(true),
            ended: AtomicBool::new(false),
            zoom: device.zoom,
            reject_zoom: self.reject_zoom,
            brightness: self.brightness,
            applied: Mutex::new(Vec::new()),
            log: self.log.clone(),
        });
        self.opened.lock().unwrap().push(Arc::clone(&track));
        Ok(MediaStream::new(Some(device.id), vec![track as Arc<dyn VideoTrack>]))
    }

    fn frame_detector(&self) -> Option<Arc<dyn FrameDetector>> {
        self.detector
            .as_ref()
            .map(|d| Arc::clone(d) as Arc<dyn FrameDetector>)
    }
}

/// Hardware detector replaying a script; empty script means "nothing found"
#[derive(Default)]
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Result<Vec<String>, StrategyError>>>,
    repeat: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, outcome: Result<Vec<String>, StrategyError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Report `payload` on every call once the script is used up
    pub fn always(&self, payload: &str) {
        *self.repeat.lock().unwrap() = Some(payload.to_string());
    }

    /// Hold every detection for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameDetector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<String>, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        Ok(self.repeat.lock().unwrap().iter().cloned().collect())
    }
}

/// Software strategy replaying a script; empty script means "nothing found"
pub struct ScriptedStrategy {
    script: Mutex<VecDeque<Option<String>>>,
    repeat: Mutex<Option<String>>,
    warm_up_error: Option<StrategyError>,
    calls: AtomicUsize,
    log: EventLog,
}

impl ScriptedStrategy {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            warm_up_error: None,
            calls: AtomicUsize::new(0),
            log,
        })
    }

    pub fn failing_warm_up(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(None),
            warm_up_error: Some(StrategyError::Init("no decoder on this platform".into())),
            calls: AtomicUsize::new(0),
            log,
        })
    }

    pub fn push(&self, payload: Option<&str>) {
        self.script
            .lock()
            .unwrap()
            .push_back(payload.map(str::to_string));
    }

    pub fn always(&self, payload: &str) {
        *self.repeat.lock().unwrap() = Some(payload.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecodeStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Software
    }

    async fn warm_up(&self) -> Result<(), StrategyError> {
        match &self.warm_up_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn attempt_decode(&self, _frame: &Frame) -> Result<Option<String>, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return Ok(next);
        }
        Ok(self.repeat.lock().unwrap().clone())
    }

    fn dispose(&self) {
        self.log.push("dispose:software");
    }
}

/// Preview recording attach/detach/scale into the shared log
pub struct FakePreview {
    log: EventLog,
    scale: Mutex<f64>,
}

impl FakePreview {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            scale: Mutex::new(1.0),
        })
    }

    pub fn scale(&self) -> f64 {
        *self.scale.lock().unwrap()
    }
}

impl PreviewSink for FakePreview {
    fn attach(&self, stream: &MediaStream) {
        self.log
            .push(format!("attach:{}", stream.device_id().unwrap_or("?")));
    }

    fn detach(&self) {
        self.log.push("detach");
    }

    fn set_visual_scale(&self, scale: f64) {
        *self.scale.lock().unwrap() = scale;
    }
}

/// Listener that records every callback
#[derive(Clone, Default)]
pub struct Recorder {
    successes: Arc<Mutex<Vec<CodeResult>>>,
    errors: Arc<Mutex<Vec<ErrorKind>>>,
    manual: Arc<Mutex<Vec<ManualEntryReason>>>,
}

impl Recorder {
    pub fn successes(&self) -> Vec<CodeResult> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.errors.lock().unwrap().clone()
    }

    pub fn manual(&self) -> Vec<ManualEntryReason> {
        self.manual.lock().unwrap().clone()
    }
}

impl ScanListener for Recorder {
    fn on_success(&self, result: CodeResult) {
        self.successes.lock().unwrap().push(result);
    }

    fn on_error(&self, error: &ScanError) {
        self.errors.lock().unwrap().push(error.kind());
    }

    fn on_manual_entry_suggested(&self, reason: ManualEntryReason) {
        self.manual.lock().unwrap().push(reason);
    }
}

/// Config with the default timings; tests run on a paused clock
pub fn test_config() -> ScannerConfig {
    ScannerConfig {
        enhance_on_miss: false,
        ..ScannerConfig::default()
    }
}

/// Advance the paused clock until `done` holds, or give up after `limit`
pub async fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(10);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if done() {
            return true;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
    done()
}

/// Render `payload` as a QR code, 6 px per module with a 4-module quiet zone
pub fn qr_image(payload: &str, dark: u8, light: u8) -> GrayImage {
    const MODULE: u32 = 6;
    const QUIET: u32 = 4;
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET) * MODULE;
    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / MODULE, y / MODULE);
        let inside = (QUIET..QUIET + modules).contains(&mx) && (QUIET..QUIET + modules).contains(&my);
        let is_dark = inside && colors[((my - QUIET) * modules + (mx - QUIET)) as usize] == Color::Dark;
        Luma([if is_dark { dark } else { light }])
    })
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

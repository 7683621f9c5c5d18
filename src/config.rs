//! Scanner tuning knobs.
//!
//! Every value is an empirically chosen default, not a contract. Values can be
//! loaded from JSON and overridden through `ATTEND_QR_*` environment variables.

use serde::Deserialize;
use std::time::Duration;

fn parse_env_u64(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn parse_env_u32(name: &str) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
}

fn parse_env_bool_u8(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Hardware strategy polling interval
    pub poll_interval_ms: u64,
    /// Software sampler cadence
    pub software_sample_interval_ms: u64,
    /// Pause between constraint tiers
    pub tier_backoff_ms: u64,
    /// Pause after releasing a stream before reacquiring
    pub settle_delay_ms: u64,
    /// Hardware zoom debounce window
    pub zoom_debounce_ms: u64,
    /// Consecutive invalid payloads before manual entry is offered
    pub ambiguous_threshold: u32,
    /// Consecutive failed opens before manual entry is offered
    pub init_failure_threshold: u32,
    /// Short-side floor for static-image upscale candidates
    pub upscale_floor: u32,
    /// Upper bound of the visual (software) zoom range
    pub software_zoom_max: f64,
    /// Mean luma below which the scene is reported as low light
    pub low_light_threshold: u8,
    /// Run the contrast-enhanced pass when the raw hardware pass misses
    pub enhance_on_miss: bool,
    /// Base URL for informational deep links (`<base>/a/<code>`)
    pub deep_link_base: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 75,
            software_sample_interval_ms: 100,
            tier_backoff_ms: 200,
            settle_delay_ms: 400,
            zoom_debounce_ms: 50,
            ambiguous_threshold: 3,
            init_failure_threshold: 3,
            upscale_floor: 800,
            software_zoom_max: 3.0,
            low_light_threshold: 40,
            enhance_on_miss: true,
            deep_link_base: None,
        }
    }
}

impl ScannerConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// Pull out-of-range values back to their usable minimum.
    ///
    /// Thresholds below 1 would never (or always) trigger; intervals of 0
    /// would spin.
    pub fn normalized(mut self) -> Self {
        self.poll_interval_ms = self.poll_interval_ms.max(1);
        self.software_sample_interval_ms = self.software_sample_interval_ms.max(1);
        self.ambiguous_threshold = self.ambiguous_threshold.max(1);
        self.init_failure_threshold = self.init_failure_threshold.max(1);
        self.upscale_floor = self.upscale_floor.clamp(64, 4096);
        if self.software_zoom_max.is_nan() || self.software_zoom_max < 1.0 {
            self.software_zoom_max = 1.0;
        }
        self
    }

    /// Apply `ATTEND_QR_*` overrides on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_env_u64("ATTEND_QR_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parse_env_u64("ATTEND_QR_SOFTWARE_SAMPLE_INTERVAL_MS") {
            self.software_sample_interval_ms = v;
        }
        if let Some(v) = parse_env_u64("ATTEND_QR_TIER_BACKOFF_MS") {
            self.tier_backoff_ms = v;
        }
        if let Some(v) = parse_env_u64("ATTEND_QR_SETTLE_DELAY_MS") {
            self.settle_delay_ms = v;
        }
        if let Some(v) = parse_env_u64("ATTEND_QR_ZOOM_DEBOUNCE_MS") {
            self.zoom_debounce_ms = v;
        }
        if let Some(v) = parse_env_u32("ATTEND_QR_AMBIGUOUS_THRESHOLD") {
            self.ambiguous_threshold = v;
        }
        if let Some(v) = parse_env_u32("ATTEND_QR_INIT_FAILURE_THRESHOLD") {
            self.init_failure_threshold = v;
        }
        if let Some(v) = parse_env_u32("ATTEND_QR_UPSCALE_FLOOR") {
            self.upscale_floor = v;
        }
        if let Some(v) = parse_env_bool_u8("ATTEND_QR_ENHANCE_ON_MISS") {
            self.enhance_on_miss = v;
        }
        if let Ok(base) = std::env::var("ATTEND_QR_DEEP_LINK_BASE") {
            let base = base.trim();
            if !base.is_empty() {
                self.deep_link_base = Some(base.to_string());
            }
        }
        self.normalized()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub(crate) fn software_sample_interval(&self) -> Duration {
        Duration::from_millis(self.software_sample_interval_ms.max(1))
    }

    pub(crate) fn tier_backoff(&self) -> Duration {
        Duration::from_millis(self.tier_backoff_ms)
    }

    pub(crate) fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub(crate) fn zoom_debounce(&self) -> Duration {
        Duration::from_millis(self.zoom_debounce_ms)
    }
}

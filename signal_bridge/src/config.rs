//! Run configuration.
//!
//! Everything here is fixed for the lifetime of one run.  `main` fills a
//! [`BridgeConfig`] from the command line and environment, then calls
//! [`BridgeConfig::validate`] before anything is opened.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use thiserror::Error;

use gesture_gate::DebounceConfig;
use pose_signal::{FeatureScales, DEFAULT_SMOOTHING};

pub const DEFAULT_BRIDGE_URL:    &str = "http://localhost:8000";
pub const DEFAULT_RESONANCE_KEY: &str = "REPLACE_ME_IN_ENV";
pub const DEFAULT_MARKER_PATH:   &str = "gesture_command.txt";

/// Budget for one continuous-parameter POST; must stay under a frame interval.
pub const PARAMS_TIMEOUT:  Duration = Duration::from_millis(100);
/// Budget for one gesture-command POST.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
/// Per-tick sleep when tracking hands only, to bound CPU use.
pub const HAND_TICK:       Duration = Duration::from_millis(50);

// ════════════════════════════════════════════════════════════════════════════
// Mode
// ════════════════════════════════════════════════════════════════════════════

/// Which outputs the frame loop produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Continuous parameters from the body pose only.
    Body,
    /// Gesture triggers from hands only.
    Hand,
    /// Both paths.
    Both,
}

impl Mode {
    pub fn tracks_body(&self) -> bool {
        matches!(self, Mode::Body | Mode::Both)
    }

    pub fn tracks_hands(&self) -> bool {
        matches!(self, Mode::Hand | Mode::Both)
    }

    /// Default per-tick sleep for this mode.
    pub fn default_tick(&self) -> Duration {
        match self {
            Mode::Hand => HAND_TICK,
            _          => Duration::ZERO,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConfigError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("smoothing factor must be in (0, 1], got {0}")]
    Smoothing(f32),

    #[error("{name} must be greater than zero")]
    ZeroTimeout { name: &'static str },

    #[error("{name} must be a finite number, got {value}")]
    Scale { name: &'static str, value: f32 },

    #[error("bridge URL {url:?} is not a valid http URL: {reason}")]
    BridgeUrl { url: String, reason: String },
}

// ════════════════════════════════════════════════════════════════════════════
// BridgeConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for one run of the bridge.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub mode:            Mode,
    /// Control surface base URL; `/dance` and `/gesture` are appended.
    pub bridge_url:      String,
    /// Shared secret sent in the `X-Resonance-Key` header.
    pub resonance_key:   String,
    /// Exponential smoothing factor α.
    pub smoothing:       f32,
    pub debounce:        DebounceConfig,
    pub scales:          FeatureScales,
    pub params_timeout:  Duration,
    pub command_timeout: Duration,
    /// Sleep after every tick.
    pub tick_interval:   Duration,
    /// Where trigger markers are written; `None` disables the marker.
    pub marker_path:     Option<PathBuf>,
    /// Skip the HTTP surface entirely.
    pub offline:         bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            mode:            Mode::Both,
            bridge_url:      DEFAULT_BRIDGE_URL.to_string(),
            resonance_key:   DEFAULT_RESONANCE_KEY.to_string(),
            smoothing:       DEFAULT_SMOOTHING,
            debounce:        DebounceConfig::default(),
            scales:          FeatureScales::default(),
            params_timeout:  PARAMS_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
            tick_interval:   Mode::Both.default_tick(),
            marker_path:     Some(PathBuf::from(DEFAULT_MARKER_PATH)),
            offline:         false,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(ConfigError::Smoothing(self.smoothing));
        }
        if self.params_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { name: "params timeout" });
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout { name: "command timeout" });
        }

        let scales = [
            ("energy scale",      self.scales.energy_scale),
            ("rotation scale",    self.scales.rotation_scale),
            ("spread rest ratio", self.scales.spread_rest_ratio),
            ("spread full ratio", self.scales.spread_full_ratio),
        ];
        for (name, value) in scales {
            if !value.is_finite() {
                return Err(ConfigError::Scale { name, value });
            }
        }

        if !self.offline {
            let bad = |reason: String| ConfigError::BridgeUrl {
                url: self.bridge_url.clone(),
                reason,
            };
            let url = reqwest::Url::parse(&self.bridge_url).map_err(|e| bad(e.to_string()))?;
            if url.scheme() != "http" {
                return Err(bad(format!("unsupported scheme `{}`", url.scheme())));
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

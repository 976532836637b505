//! Control-surface output.
//!
//! The surface is whatever consumes our parameters and commands.  In
//! production that is the HTTP bridge server (`POST /dance`,
//! `POST /gesture`); offline runs and tests use [`NullSurface`] or a
//! recording double.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use gesture_gate::GestureLabel;
use pose_signal::FeatureVector;

/// Header carrying the shared secret on command requests.
pub const RESONANCE_KEY_HEADER: &str = "X-Resonance-Key";

// ════════════════════════════════════════════════════════════════════════════
// DispatchError
// ════════════════════════════════════════════════════════════════════════════

/// Why one send did not reach the surface.  Never fatal to the frame loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("surface answered {0}")]
    Status(StatusCode),

    #[error("{0} has no command")]
    NoCommand(GestureLabel),
}

impl DispatchError {
    fn from_reqwest(err: reqwest::Error, budget: Duration) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout(budget)
        } else {
            DispatchError::Transport(err)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ControlSurface: HTTP or null backend
// ════════════════════════════════════════════════════════════════════════════

pub trait ControlSurface {
    /// Deliver one smoothed parameter vector.  Must return within the
    /// surface's parameter budget whatever the remote end does.
    fn send_params(&mut self, params: &FeatureVector) -> Result<(), DispatchError>;

    /// Deliver one gesture command.
    fn send_command(&mut self, label: GestureLabel) -> Result<(), DispatchError>;
}

// ── HTTP backend ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CommandBody<'a> {
    command: &'a str,
}

/// Blocking HTTP client.  Each request carries its own hard timeout covering
/// connect through response, so the two paths never share a budget.
pub struct HttpSurface {
    client:          Client,
    dance_url:       String,
    gesture_url:     String,
    key:             String,
    params_timeout:  Duration,
    command_timeout: Duration,
}

impl HttpSurface {
    pub fn new(
        base_url:        &str,
        key:             impl Into<String>,
        params_timeout:  Duration,
        command_timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .build()
            .map_err(DispatchError::Transport)?;

        let base = base_url.trim_end_matches('/');
        Ok(HttpSurface {
            client,
            dance_url:   format!("{}/dance", base),
            gesture_url: format!("{}/gesture", base),
            key:         key.into(),
            params_timeout,
            command_timeout,
        })
    }

    pub fn dance_url(&self) -> &str {
        &self.dance_url
    }

    pub fn gesture_url(&self) -> &str {
        &self.gesture_url
    }
}

fn check_status(status: StatusCode) -> Result<(), DispatchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(DispatchError::Status(status))
    }
}

impl ControlSurface for HttpSurface {
    fn send_params(&mut self, params: &FeatureVector) -> Result<(), DispatchError> {
        let budget = self.params_timeout;
        let resp = self.client
            .post(&self.dance_url)
            .timeout(budget)
            .json(params)
            .send()
            .map_err(|e| DispatchError::from_reqwest(e, budget))?;
        check_status(resp.status())
    }

    fn send_command(&mut self, label: GestureLabel) -> Result<(), DispatchError> {
        let command = label.command().ok_or(DispatchError::NoCommand(label))?;
        let budget = self.command_timeout;
        let resp = self.client
            .post(&self.gesture_url)
            .timeout(budget)
            .header(RESONANCE_KEY_HEADER, &self.key)
            .json(&CommandBody { command })
            .send()
            .map_err(|e| DispatchError::from_reqwest(e, budget))?;
        check_status(resp.status())
    }
}

// ── null backend (used with --offline) ────────────────────────────────────

/// Accepts everything and sends nothing.
#[derive(Debug, Default)]
pub struct NullSurface;

impl ControlSurface for NullSurface {
    fn send_params(&mut self, _params: &FeatureVector) -> Result<(), DispatchError> { Ok(()) }
    fn send_command(&mut self, _label: GestureLabel) -> Result<(), DispatchError> { Ok(()) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

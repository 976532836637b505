//! Fire-and-forget delivery to the control surface.
//!
//! Every send failure is counted and logged, never returned: the frame loop
//! must keep running whether or not anyone is listening.

use tracing::{info, warn};

use gesture_gate::TriggerEvent;
use pose_signal::FeatureVector;

use crate::marker::TriggerMarker;
use crate::surface::ControlSurface;

/// A run of parameter failures is reported on its first failure and then
/// once every this many.
pub const WARN_EVERY: u64 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub params_sent:     u64,
    pub params_failed:   u64,
    pub commands_sent:   u64,
    pub commands_failed: u64,
    pub marker_failed:   u64,
    /// Parameter failures since the last success.
    pub consecutive_failures: u64,
}

pub struct Dispatcher {
    surface: Box<dyn ControlSurface>,
    marker:  Option<TriggerMarker>,
    stats:   DispatchStats,
}

impl Dispatcher {
    pub fn new(surface: Box<dyn ControlSurface>) -> Self {
        Dispatcher { surface, marker: None, stats: DispatchStats::default() }
    }

    pub fn with_marker(mut self, marker: TriggerMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn marker(&self) -> Option<&TriggerMarker> {
        self.marker.as_ref()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Send one smoothed parameter vector.
    pub fn params(&mut self, params: &FeatureVector) {
        match self.surface.send_params(params) {
            Ok(()) => {
                if self.stats.consecutive_failures > 0 {
                    info!(
                        failures = self.stats.consecutive_failures,
                        "control surface reachable again",
                    );
                }
                self.stats.params_sent += 1;
                self.stats.consecutive_failures = 0;
            }
            Err(e) => {
                self.stats.params_failed += 1;
                self.stats.consecutive_failures += 1;
                let n = self.stats.consecutive_failures;
                if n == 1 || n % WARN_EVERY == 0 {
                    warn!(consecutive = n, "parameter send failed: {}", e);
                }
            }
        }
    }

    /// Deliver a trigger: marker first, then the command request.
    pub fn trigger(&mut self, ev: &TriggerEvent) {
        info!(label = %ev.label, at = ?ev.at, "gesture triggered");

        if let Some(marker) = &self.marker {
            if let Err(e) = marker.record(ev.label) {
                self.stats.marker_failed += 1;
                warn!(path = %marker.path().display(), "trigger marker write failed: {}", e);
            }
        }

        match self.surface.send_command(ev.label) {
            Ok(()) => self.stats.commands_sent += 1,
            Err(e) => {
                self.stats.commands_failed += 1;
                warn!(label = %ev.label, "gesture command failed: {}", e);
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

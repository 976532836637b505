//! Hold-and-cooldown debouncing of the per-frame label stream.
//!
//! # State machine
//!
//! ```text
//!            label ≠ None                     same label, held ≥ hold_threshold
//!   Idle ─────────────────▶ Holding(l, t₀) ─────────────────────────────────▶ Cooldown(t + cooldown)
//!    ▲                        │  ▲    │                                             │
//!    │        label == None   │  └────┘ different label: restart at t              │
//!    ├────────────────────────┘                                                    │
//!    └──────────────────────────────── t ≥ until ─────────────────────────────────┘
//! ```
//!
//! * A switch to a different label cancels the hold and restarts the timer.
//! * Releasing before the threshold fires nothing.
//! * The cooldown elapses on its own clock, whatever is being shown.  The
//!   frame on which it ends only returns to `Idle`; a hold can start on the
//!   next frame.
//!
//! Time is passed in by the caller (offset since loop start) so the machine
//! can be driven by a simulated clock in tests.

use std::time::Duration;

use tracing::debug;

use crate::classify::GestureLabel;

/// Continuous hold required before a label fires.
pub const HOLD_THRESHOLD: Duration = Duration::from_millis(1500);

/// Quiet period after a trigger during which nothing fires.
pub const COOLDOWN_DURATION: Duration = Duration::from_millis(3000);

// ════════════════════════════════════════════════════════════════════════════
// Config / events / state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebounceConfig {
    pub hold_threshold: Duration,
    pub cooldown:       Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        DebounceConfig {
            hold_threshold: HOLD_THRESHOLD,
            cooldown:       COOLDOWN_DURATION,
        }
    }
}

/// A gesture that was held long enough to fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEvent {
    pub label: GestureLabel,
    /// Loop time at which the hold qualified.
    pub at:    Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    /// No gesture sustained.
    Idle,
    /// `label` seen on every frame since `since`.
    Holding { label: GestureLabel, since: Duration },
    /// A trigger fired; nothing fires before `until`.
    Cooldown { until: Duration },
}

/// Flat view of the debouncer for status displays and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureState {
    pub current_label:     GestureLabel,
    pub label_start_time:  Option<Duration>,
    pub last_trigger_time: Option<Duration>,
}

// ════════════════════════════════════════════════════════════════════════════
// Debouncer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Debouncer {
    config:       DebounceConfig,
    state:        DebounceState,
    last_trigger: Option<Duration>,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Debouncer { config, state: DebounceState::Idle, last_trigger: None }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn gesture_state(&self) -> GestureState {
        let (current_label, label_start_time) = match self.state {
            DebounceState::Holding { label, since } => (label, Some(since)),
            _ => (GestureLabel::None, None),
        };
        GestureState {
            current_label,
            label_start_time,
            last_trigger_time: self.last_trigger,
        }
    }

    /// Back to `Idle`, forgetting any hold and cooldown.
    pub fn reset(&mut self) {
        self.state = DebounceState::Idle;
        self.last_trigger = None;
    }

    /// Advance one frame.  Returns the trigger if this frame qualified a hold.
    pub fn step(&mut self, t: Duration, label: GestureLabel) -> Option<TriggerEvent> {
        let (next, fired) = match self.state {
            DebounceState::Idle => {
                if label.is_none() {
                    (DebounceState::Idle, None)
                } else {
                    (DebounceState::Holding { label, since: t }, None)
                }
            }

            DebounceState::Holding { label: held, since } => {
                if label.is_none() {
                    (DebounceState::Idle, None)
                } else if label != held {
                    (DebounceState::Holding { label, since: t }, None)
                } else if t.saturating_sub(since) >= self.config.hold_threshold {
                    let until = t.saturating_add(self.config.cooldown);
                    (DebounceState::Cooldown { until }, Some(TriggerEvent { label, at: t }))
                } else {
                    (self.state, None)
                }
            }

            DebounceState::Cooldown { until } => {
                if t >= until {
                    (DebounceState::Idle, None)
                } else {
                    (self.state, None)
                }
            }
        };

        if next != self.state {
            debug!(from = ?self.state, to = ?next, t = ?t, "gesture state");
        }
        self.state = next;

        if let Some(ev) = fired {
            self.last_trigger = Some(ev.at);
        }
        fired
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new(DebounceConfig::default())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::GestureLabel::{OpenPalm, ThumbsUp, Victory};

    const FPS: f64 = 30.0;

    fn at(frame: u32) -> Duration {
        Duration::from_secs_f64(frame as f64 / FPS)
    }

    /// Feed `(label, seconds)` segments at 30 fps starting from `*frame`.
    /// Returns the triggers with the frame they fired on.
    fn drive(
        d:        &mut Debouncer,
        frame:    &mut u32,
        segments: &[(GestureLabel, f64)],
    ) -> Vec<(u32, TriggerEvent)> {
        let mut out = Vec::new();
        for &(label, secs) in segments {
            let n = (secs * FPS).round() as u32;
            for _ in 0..n {
                if let Some(ev) = d.step(at(*frame), label) {
                    out.push((*frame, ev));
                }
                *frame += 1;
            }
        }
        out
    }

    /// First frame after `start` whose elapsed time reaches the hold threshold.
    fn first_qualifying_frame(start: u32) -> u32 {
        (start..).find(|&f| at(f) - at(start) >= HOLD_THRESHOLD).unwrap()
    }

    #[test]
    fn single_trigger_for_sustained_hold() {
        let mut d = Debouncer::default();
        let mut frame = 0;
        let events = drive(&mut d, &mut frame, &[(Victory, 1.6)]);

        assert_eq!(events.len(), 1);
        let (f, ev) = events[0];
        assert_eq!(ev.label, Victory);
        assert_eq!(f, first_qualifying_frame(0));
        assert_eq!(ev.at, at(f));
        assert!(matches!(d.state(), DebounceState::Cooldown { .. }));

        // Keep holding for two more seconds: still inside the cooldown.
        let more = drive(&mut d, &mut frame, &[(Victory, 2.0)]);
        assert!(more.is_empty());
        assert_eq!(d.gesture_state().last_trigger_time, Some(ev.at));
    }

    #[test]
    fn fires_again_only_after_cooldown() {
        let mut d = Debouncer::default();
        let mut frame = 0;
        let events = drive(&mut d, &mut frame, &[(Victory, 8.0)]);

        assert_eq!(events.len(), 2);
        let first  = events[0].1.at;
        let second = events[1].1.at;
        assert!(second >= first + COOLDOWN_DURATION + HOLD_THRESHOLD);
    }

    #[test]
    fn switch_cancels_hold() {
        let mut d = Debouncer::default();
        let mut frame = 0;

        let early = drive(&mut d, &mut frame, &[(Victory, 1.0), (OpenPalm, 1.0)]);
        assert!(early.is_empty());

        let restart = frame;
        let late = drive(&mut d, &mut frame, &[(Victory, 1.6)]);
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].1.label, Victory);
        assert_eq!(late[0].0, first_qualifying_frame(restart));
    }

    #[test]
    fn release_before_threshold_fires_nothing() {
        let mut d = Debouncer::default();
        let mut frame = 0;
        let events = drive(&mut d, &mut frame, &[(Victory, 1.0), (GestureLabel::None, 0.1)]);
        assert!(events.is_empty());
        assert_eq!(d.state(), DebounceState::Idle);
        assert_eq!(d.gesture_state().current_label, GestureLabel::None);
    }

    #[test]
    fn holding_reports_label_and_start() {
        let mut d = Debouncer::default();
        d.step(at(3), ThumbsUp);
        d.step(at(4), ThumbsUp);
        let gs = d.gesture_state();
        assert_eq!(gs.current_label, ThumbsUp);
        assert_eq!(gs.label_start_time, Some(at(3)));
        assert_eq!(gs.last_trigger_time, None);
    }

    #[test]
    fn cooldown_blocks_other_labels_and_ends_on_its_own() {
        let mut d = Debouncer::default();
        let mut frame = 0;
        let events = drive(&mut d, &mut frame, &[(Victory, 1.6)]);
        let until = events[0].1.at + COOLDOWN_DURATION;

        // A different, fully held gesture inside the cooldown never fires.
        let blocked = drive(&mut d, &mut frame, &[(OpenPalm, 2.0)]);
        assert!(blocked.is_empty());

        // Nothing shown for the rest of the window: cooldown still ends.
        let _ = drive(&mut d, &mut frame, &[(GestureLabel::None, 1.0)]);
        assert!(at(frame - 1) >= until);
        assert_eq!(d.state(), DebounceState::Idle);
    }

    #[test]
    fn cooldown_exit_frame_ignores_label() {
        let config = DebounceConfig {
            hold_threshold: Duration::from_secs(1),
            cooldown:       Duration::from_secs(1),
        };
        let mut d = Debouncer::new(config);
        let s = Duration::from_secs;

        assert!(d.step(s(0), Victory).is_none());
        assert!(d.step(s(1), Victory).is_some());
        assert_eq!(d.state(), DebounceState::Cooldown { until: s(2) });

        // Cooldown ends: back to Idle even though Victory is shown.
        assert!(d.step(s(2), Victory).is_none());
        assert_eq!(d.state(), DebounceState::Idle);

        // The next frame starts a fresh hold.
        d.step(s(3), Victory);
        assert_eq!(d.state(), DebounceState::Holding { label: Victory, since: s(3) });
    }

    #[test]
    fn none_in_idle_stays_idle() {
        let mut d = Debouncer::default();
        for f in 0..100 {
            assert!(d.step(at(f), GestureLabel::None).is_none());
        }
        assert_eq!(d.state(), DebounceState::Idle);
    }

    #[test]
    fn reset_clears_cooldown() {
        let mut d = Debouncer::default();
        let mut frame = 0;
        drive(&mut d, &mut frame, &[(Victory, 1.6)]);
        d.reset();
        assert_eq!(d.state(), DebounceState::Idle);
        assert_eq!(d.gesture_state().last_trigger_time, None);
    }
}

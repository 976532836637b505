//! The frame loop.
//!
//! `Pipeline` owns every piece of cross-frame state: the previous pose, the
//! previous tick time, the smoothed parameters and the gesture debouncer.
//! One [`Pipeline::tick`] per observation, strictly in order:
//!
//! ```text
//!   frame ─┬─ pose? ──extract──▶ raw ──smooth──▶ state ──▶ Dispatcher::params
//!          │
//!          └─ hands ──classify_hands──▶ label ──Debouncer::step──▶ Dispatcher::trigger
//! ```
//!
//! Parameters are only sent on ticks where a pose was detected.  The tick
//! clock advances on every observation, detected or not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use gesture_gate::{classify_hands, Debouncer, GestureLabel, GestureState, TriggerEvent};
use pose_signal::{extract, FeatureScales, FeatureVector, LandmarkFrame, PoseLandmarks, TemporalSmoother};

use crate::config::{BridgeConfig, Mode};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::source::{LandmarkSource, SourceError};

// ════════════════════════════════════════════════════════════════════════════
// Shutdown
// ════════════════════════════════════════════════════════════════════════════

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN_REQUESTED
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
///
/// Installed without `SA_RESTART`.  Blocking reads live on helper threads in
/// any case (see [`crate::source`]); the loop polls the flag.
#[cfg(unix)]
pub fn install_signal_handlers() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = signal_handler as *const () as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
pub fn install_signal_handlers() {}

#[cfg(unix)]
extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

// ════════════════════════════════════════════════════════════════════════════
// Stats
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopStats {
    pub frames:         u64,
    pub pose_frames:    u64,
    pub hand_frames:    u64,
    pub params_emitted: u64,
    pub triggers:       u64,
    /// Frames per second over the last full one-second window.
    pub fps:            f32,
}

/// Counts frames in one-second windows of loop time.
#[derive(Clone, Debug, Default)]
struct FpsMeter {
    window_start: Option<Duration>,
    count:        u32,
}

impl FpsMeter {
    /// Count a frame at `t`; returns the rate when a window closes.
    fn tick(&mut self, t: Duration) -> Option<f32> {
        let start = match self.window_start {
            Some(s) => s,
            None => {
                self.window_start = Some(t);
                return None;
            }
        };
        self.count += 1;
        let span = t.saturating_sub(start);
        if span >= Duration::from_secs(1) {
            let fps = self.count as f32 / span.as_secs_f32();
            self.window_start = Some(t);
            self.count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

/// What one tick produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutcome {
    /// Smoothed parameters, when a pose was present and body tracking is on.
    pub params:  Option<FeatureVector>,
    /// This frame's gesture label (always `None` without hand tracking).
    pub label:   GestureLabel,
    pub trigger: Option<TriggerEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames.
    Exhausted,
    /// A stop was requested (signal or caller).
    Requested,
}

#[derive(Clone, Copy, Debug)]
pub struct RunSummary {
    pub reason:   StopReason,
    pub elapsed:  Duration,
    pub loop_:    LoopStats,
    pub dispatch: DispatchStats,
}

// ════════════════════════════════════════════════════════════════════════════
// Pipeline
// ════════════════════════════════════════════════════════════════════════════

pub struct Pipeline {
    mode:       Mode,
    scales:     FeatureScales,
    smoother:   TemporalSmoother,
    debouncer:  Debouncer,
    dispatcher: Dispatcher,
    prev_pose:  Option<PoseLandmarks>,
    last_tick:  Option<Duration>,
    fps:        FpsMeter,
    stats:      LoopStats,
}

impl Pipeline {
    pub fn new(config: &BridgeConfig, dispatcher: Dispatcher) -> Self {
        Pipeline {
            mode:       config.mode,
            scales:     config.scales,
            smoother:   TemporalSmoother::new(config.smoothing),
            debouncer:  Debouncer::new(config.debounce),
            dispatcher,
            prev_pose:  None,
            last_tick:  None,
            fps:        FpsMeter::default(),
            stats:      LoopStats::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current smoothed parameters.
    pub fn smoothed(&self) -> &FeatureVector {
        self.smoother.state()
    }

    pub fn gesture_state(&self) -> GestureState {
        self.debouncer.gesture_state()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Process one observation taken at loop time `t`.
    pub fn tick(&mut self, frame: &LandmarkFrame, t: Duration) -> TickOutcome {
        let dt = match self.last_tick {
            Some(prev) => t.saturating_sub(prev).as_secs_f32(),
            None       => 0.0,
        };
        self.last_tick = Some(t);

        self.stats.frames += 1;
        if frame.pose.is_some()    { self.stats.pose_frames += 1; }
        if !frame.hands.is_empty() { self.stats.hand_frames += 1; }

        // ── continuous path ───────────────────────────────────────────────
        let mut params = None;
        if self.mode.tracks_body() {
            if let Some(pose) = &frame.pose {
                let raw = extract(pose, self.prev_pose.as_ref(), dt, &self.scales);
                let state = *self.smoother.update(&raw);
                self.dispatcher.params(&state);
                self.prev_pose = Some(pose.clone());
                self.stats.params_emitted += 1;
                params = Some(state);
            }
        }

        // ── discrete path ─────────────────────────────────────────────────
        let mut label = GestureLabel::None;
        let mut trigger = None;
        if self.mode.tracks_hands() {
            label = classify_hands(&frame.hands);
            trigger = self.debouncer.step(t, label);
            if let Some(ev) = &trigger {
                self.dispatcher.trigger(ev);
                self.stats.triggers += 1;
            }
        }

        if let Some(fps) = self.fps.tick(t) {
            self.stats.fps = fps;
            debug!(frames = self.stats.frames, "{:.1} fps", fps);
        }

        TickOutcome { params, label, trigger }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run
// ════════════════════════════════════════════════════════════════════════════

/// Pull frames from `source` until it is exhausted or `stop` is set.
///
/// The flag is checked before every frame and handed to the source, so a
/// stop also ends a read that is waiting on silent input.  Only a source
/// failure ends the loop with an error; output failures are absorbed by the
/// dispatcher.
pub fn run<S: LandmarkSource + ?Sized>(
    source:        &mut S,
    pipeline:      &mut Pipeline,
    tick_interval: Duration,
    stop:          &AtomicBool,
) -> Result<RunSummary, SourceError> {
    info!(source = %source.describe(), mode = ?pipeline.mode(), "frame loop started");
    let start = Instant::now();

    let reason = loop {
        if stop.load(Ordering::SeqCst) {
            info!("stop requested");
            break StopReason::Requested;
        }

        let frame = match source.next_frame(stop)? {
            Some(f) => f,
            None if stop.load(Ordering::SeqCst) => {
                info!("stop requested");
                break StopReason::Requested;
            }
            None => {
                info!("landmark source exhausted");
                break StopReason::Exhausted;
            }
        };

        pipeline.tick(&frame, start.elapsed());

        if !tick_interval.is_zero() {
            thread::sleep(tick_interval);
        }
    };

    Ok(RunSummary {
        reason,
        elapsed:  start.elapsed(),
        loop_:    pipeline.stats(),
        dispatch: pipeline.dispatch_stats(),
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

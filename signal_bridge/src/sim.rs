//! Synthetic performer: frames without a camera.
//!
//! The body sways, bobs and slowly opens and closes its arms; one hand works
//! through a fixed script of gestures, each held long enough to fire with
//! the default hold threshold and spaced so the cooldown has ended before
//! the next one begins.
//!
//! | Segment | Shape | Seconds |
//! |---|---|---|
//! | 1 | ✌ victory | 3.0 |
//! | 2 | relaxed | 1.5 |
//! | 3 | 👍 thumbs up | 3.0 |
//! | 4 | relaxed | 1.5 |
//! | 5 | ✋ open palm | 3.0 |
//! | 6 | relaxed | 1.5 |

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pose_signal::landmarks::{hand, pose};
use pose_signal::{FingerStates, HandLandmarks, Landmark, LandmarkFrame, PoseLandmarks};

use crate::source::{LandmarkSource, SourceError, STOP_POLL};

const RELAXED:   FingerStates = FingerStates::new(false, false, false, false, false);
const VICTORY:   FingerStates = FingerStates::new(false, true,  true,  false, false);
const THUMBS_UP: FingerStates = FingerStates::new(true,  false, false, false, false);
const OPEN_PALM: FingerStates = FingerStates::new(true,  true,  true,  true,  true );

/// `(shape, seconds)`, repeated for as long as the source runs.
pub const SCRIPT: [(FingerStates, f32); 6] = [
    (VICTORY,   3.0),
    (RELAXED,   1.5),
    (THUMBS_UP, 3.0),
    (RELAXED,   1.5),
    (OPEN_PALM, 3.0),
    (RELAXED,   1.5),
];

/// Length of one pass through [`SCRIPT`].
pub fn script_period() -> f32 {
    SCRIPT.iter().map(|(_, s)| s).sum()
}

/// Finger shape the script shows at `t` seconds.
pub fn shape_at(t: f32) -> FingerStates {
    let mut t = t.max(0.0) % script_period();
    for (shape, secs) in SCRIPT {
        if t < secs {
            return shape;
        }
        t -= secs;
    }
    RELAXED
}

// ════════════════════════════════════════════════════════════════════════════
// Landmark builders
// ════════════════════════════════════════════════════════════════════════════

/// A right hand centred on `cx` with each finger up or curled.
pub fn hand_with(fingers: FingerStates, cx: f32) -> HandLandmarks {
    let chains = [
        (hand::THUMB_CMC,  fingers.thumb,  -0.08),
        (hand::INDEX_MCP,  fingers.index,  -0.04),
        (hand::MIDDLE_MCP, fingers.middle,  0.00),
        (hand::RING_MCP,   fingers.ring,    0.03),
        (hand::PINKY_MCP,  fingers.pinky,   0.06),
    ];

    let mut h = HandLandmarks::uniform(Landmark::new(cx, 0.7, 0.0));
    for (first, up, dx) in chains {
        let x = cx + dx;
        let tip_y = if up { 0.40 } else { 0.55 };
        h = h
            .with_point(first,     Landmark::new(x, 0.60, 0.0))
            .with_point(first + 1, Landmark::new(x, 0.50, 0.0))
            .with_point(first + 2, Landmark::new(x, 0.45, 0.0))
            .with_point(first + 3, Landmark::new(x, tip_y, 0.0));
    }
    h.with_handedness("Right").with_score(0.95)
}

/// The performer's body at `t` seconds.
pub fn pose_at(t: f32) -> PoseLandmarks {
    let cx    = 0.5 + 0.03 * (TAU * 0.5 * t).sin();
    let bob   = 0.04 * (TAU * t).sin();
    let reach = 0.5 + 0.5 * (TAU * 0.2 * t).sin();
    let twist = 0.1 * (TAU * 0.1 * t).sin();

    let shoulder_y = 0.35 + bob;
    let hip_y      = 0.60 + bob;
    let half       = 0.08;
    // Wrist span runs from one to three shoulder widths.
    let wrist_half = half * (1.0 + 2.0 * reach);

    let p = |x: f32, y: f32, z: f32| Landmark::new(x, y, z);
    PoseLandmarks::uniform(p(cx, hip_y, 0.0))
        .with_point(pose::NOSE,           p(cx, shoulder_y - 0.12, 0.0))
        .with_point(pose::LEFT_SHOULDER,  p(cx + half, shoulder_y, -twist / 2.0))
        .with_point(pose::RIGHT_SHOULDER, p(cx - half, shoulder_y,  twist / 2.0))
        .with_point(pose::LEFT_ELBOW,     p(cx + (half + wrist_half) / 2.0, shoulder_y + 0.08, 0.0))
        .with_point(pose::RIGHT_ELBOW,    p(cx - (half + wrist_half) / 2.0, shoulder_y + 0.08, 0.0))
        .with_point(pose::LEFT_WRIST,     p(cx + wrist_half, shoulder_y + 0.10, 0.0))
        .with_point(pose::RIGHT_WRIST,    p(cx - wrist_half, shoulder_y + 0.10, 0.0))
        .with_point(pose::LEFT_HIP,       p(cx + 0.05, hip_y, 0.0))
        .with_point(pose::RIGHT_HIP,      p(cx - 0.05, hip_y, 0.0))
        .with_point(pose::LEFT_KNEE,      p(cx + 0.05, hip_y + 0.17, 0.0))
        .with_point(pose::RIGHT_KNEE,     p(cx - 0.05, hip_y + 0.17, 0.0))
        .with_point(pose::LEFT_ANKLE,     p(cx + 0.06, 0.95 + bob * 0.3, 0.0))
        .with_point(pose::RIGHT_ANKLE,    p(cx - 0.06, 0.95 + bob * 0.3, 0.0))
}

// ════════════════════════════════════════════════════════════════════════════
// SimSource
// ════════════════════════════════════════════════════════════════════════════

pub struct SimSource {
    fps:      f32,
    frames:   u64,
    next:     u64,
    realtime: bool,
    started:  Option<Instant>,
}

impl SimSource {
    /// `secs` seconds of frames at `fps`, produced as fast as they are asked for.
    pub fn new(fps: f32, secs: f32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        let frames = (secs.max(0.0) * fps).round() as u64;
        SimSource { fps, frames, next: 0, realtime: false, started: None }
    }

    /// Pace frames at `fps` on the wall clock, like a camera.
    pub fn realtime(mut self) -> Self {
        self.realtime = true;
        self
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn total_frames(&self) -> u64 {
        self.frames
    }

    /// Script time of frame `index`.
    pub fn frame_time(&self, index: u64) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps as f64)
    }

    /// Frame `index` of the script.
    pub fn frame(&self, index: u64) -> LandmarkFrame {
        let t = self.frame_time(index).as_secs_f32();
        LandmarkFrame::empty()
            .with_pose(pose_at(t))
            .with_hand(hand_with(shape_at(t), 0.7))
    }
}

impl LandmarkSource for SimSource {
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError> {
        if self.next >= self.frames {
            return Ok(None);
        }
        if self.realtime {
            let started = *self.started.get_or_insert_with(Instant::now);
            let due = started + self.frame_time(self.next);
            loop {
                if stop.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                let now = Instant::now();
                if due <= now {
                    break;
                }
                thread::sleep((due - now).min(STOP_POLL));
            }
        }
        let frame = self.frame(self.next);
        self.next += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("simulator ({} frames @ {} fps)", self.frames, self.fps)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_gate::{classify, classify_hands, GestureLabel};
    use pose_signal::{extract, finger_states, FeatureScales};

    #[test]
    fn hand_builder_matches_requested_fingers() {
        for bits in 0u8..32 {
            let want = FingerStates::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0, bits & 16 != 0);
            assert_eq!(finger_states(&hand_with(want, 0.5)), want, "bits {:05b}", bits);
        }
    }

    #[test]
    fn script_shapes_classify_as_intended() {
        assert_eq!(classify(shape_at(1.0)),  GestureLabel::Victory);
        assert_eq!(classify(shape_at(3.5)),  GestureLabel::None);
        assert_eq!(classify(shape_at(5.0)),  GestureLabel::ThumbsUp);
        assert_eq!(classify(shape_at(10.0)), GestureLabel::OpenPalm);
        assert_eq!(classify(shape_at(13.0)), GestureLabel::None);
        // Wraps around.
        assert_eq!(classify(shape_at(script_period() + 1.0)), GestureLabel::Victory);
    }

    #[test]
    fn produces_exactly_the_requested_frames() {
        let mut src = SimSource::new(30.0, 2.0);
        let stop = AtomicBool::new(false);
        let mut n = 0;
        while let Some(frame) = src.next_frame(&stop).unwrap() {
            assert!(frame.pose.is_some());
            assert_eq!(frame.hands.len(), 1);
            n += 1;
        }
        assert_eq!(n, 60);
        assert_eq!(n, src.total_frames());
        assert!(src.next_frame(&stop).unwrap().is_none());
    }

    #[test]
    fn body_features_stay_bounded_and_move() {
        let src = SimSource::new(30.0, 10.0);
        let scales = FeatureScales::default();
        let dt = 1.0 / 30.0;
        let mut prev: Option<PoseLandmarks> = None;
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);

        for i in 0..src.total_frames() {
            let frame = src.frame(i);
            let p = frame.pose.unwrap();
            let fv = extract(&p, prev.as_ref(), dt, &scales);
            assert!(fv.is_bounded(), "frame {}: {:?}", i, fv);
            lo = lo.min(fv.arm_spread);
            hi = hi.max(fv.arm_spread);
            prev = Some(p);
        }
        assert!(lo < 0.1 && hi > 0.9, "arm spread only covered {}..{}", lo, hi);
    }

    #[test]
    fn frames_carry_the_scripted_gesture() {
        let src = SimSource::new(30.0, 15.0);
        assert_eq!(classify_hands(&src.frame(30).hands), GestureLabel::Victory);
        assert_eq!(classify_hands(&src.frame(150).hands), GestureLabel::ThumbsUp);
    }

    #[test]
    fn realtime_paces_frames() {
        let mut src = SimSource::new(100.0, 0.05).realtime();
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        while src.next_frame(&stop).unwrap().is_some() {}
        // Five frames at 100 fps: the last one is due 40 ms in.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn slow_realtime_stops_between_frames() {
        let mut src = SimSource::new(0.2, 60.0).realtime();
        let stop = AtomicBool::new(false);
        assert!(src.next_frame(&stop).unwrap().is_some());

        stop.store(true, Ordering::SeqCst);
        let start = Instant::now();
        assert!(src.next_frame(&stop).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

//! Continuous body features and finger predicates.
//!
//! Every function here is pure and infallible.  Degenerate input (no previous
//! frame, zero elapsed time, shoulders on top of each other, non-finite
//! coordinates) yields the neutral value `0.0` for the affected feature, and
//! every field of a [`FeatureVector`] is clamped into its declared range.
//!
//! The scale constants are empirical.  They are kept as named values in
//! [`FeatureScales`] so they can be recalibrated without touching the
//! formulas.

use serde::Serialize;

use crate::landmarks::{hand, pose, HandLandmarks, PoseLandmarks};

// ════════════════════════════════════════════════════════════════════════════
// Scale constants
// ════════════════════════════════════════════════════════════════════════════

/// Velocity (normalized units / second) → energy multiplier.
pub const ENERGY_SCALE: f32 = 2.0;

/// Shoulder depth difference → rotation multiplier.
pub const ROTATION_SCALE: f32 = 5.0;

/// Wrist span / shoulder width ratio that reads as "arms at sides" (spread 0).
pub const SPREAD_REST_RATIO: f32 = 1.0;

/// Wrist span / shoulder width ratio that reads as "fully spread" (spread 1).
pub const SPREAD_FULL_RATIO: f32 = 3.0;

/// Shoulder widths below this are treated as zero.
const MIN_SHOULDER_WIDTH: f32 = 1e-6;

/// Points whose displacement contributes to `energy`.
pub const ENERGY_POINTS: [usize; 5] = [
    pose::LEFT_WRIST,
    pose::RIGHT_WRIST,
    pose::LEFT_ANKLE,
    pose::RIGHT_ANKLE,
    pose::NOSE,
];

/// Overridable calibration for the body feature formulas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureScales {
    pub energy_scale:      f32,
    pub rotation_scale:    f32,
    pub spread_rest_ratio: f32,
    pub spread_full_ratio: f32,
}

impl Default for FeatureScales {
    fn default() -> Self {
        FeatureScales {
            energy_scale:      ENERGY_SCALE,
            rotation_scale:    ROTATION_SCALE,
            spread_rest_ratio: SPREAD_REST_RATIO,
            spread_full_ratio: SPREAD_FULL_RATIO,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FeatureVector
// ════════════════════════════════════════════════════════════════════════════

/// Continuous control parameters for one frame.
///
/// Serializes to the flat JSON object the control surface expects:
/// `{"energy":…, "arm_spread":…, "height":…, "rotation":…, "speed":…}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeatureVector {
    /// 0–1, overall body movement.
    pub energy:     f32,
    /// 0–1, how far the arms are spread relative to the shoulders.
    pub arm_spread: f32,
    /// 0–1, vertical body position (1 = high in frame).
    pub height:     f32,
    /// −1–1, torso rotation from shoulder depth.
    pub rotation:   f32,
    /// Alias of `energy`.
    pub speed:      f32,
}

impl FeatureVector {
    /// Standing still, facing the camera, mid-frame.
    pub const NEUTRAL: FeatureVector = FeatureVector {
        energy:     0.0,
        arm_spread: 0.0,
        height:     0.5,
        rotation:   0.0,
        speed:      0.0,
    };

    /// True when every field lies inside its declared range.
    pub fn is_bounded(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        unit(self.energy)
            && unit(self.arm_spread)
            && unit(self.height)
            && (-1.0..=1.0).contains(&self.rotation)
            && unit(self.speed)
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        FeatureVector::NEUTRAL
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Body features
// ════════════════════════════════════════════════════════════════════════════

/// Clamp into `lo..=hi`; NaN becomes the neutral 0.
fn bounded(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(lo, hi) }
}

/// Summed displacement of the [`ENERGY_POINTS`] per second, scaled into 0–1.
///
/// Exactly `0.0` when there is no previous pose or `dt` is not a positive
/// finite number.
pub fn movement_energy(
    curr:  &PoseLandmarks,
    prev:  Option<&PoseLandmarks>,
    dt:    f32,
    scale: f32,
) -> f32 {
    let prev = match prev {
        Some(p) if dt > 0.0 && dt.is_finite() => p,
        _ => return 0.0,
    };

    let total: f32 = ENERGY_POINTS.iter()
        .map(|&i| curr.points()[i].distance(&prev.points()[i]))
        .sum();

    bounded(total / dt * scale, 0.0, 1.0)
}

/// Wrist span measured in shoulder widths, mapped from the rest ratio (0)
/// to the full-spread ratio (1).
pub fn arm_spread(p: &PoseLandmarks, scales: &FeatureScales) -> f32 {
    let wrists    = (p.left_wrist().x - p.right_wrist().x).abs();
    let shoulders = (p.left_shoulder().x - p.right_shoulder().x).abs();
    let range     = scales.spread_full_ratio - scales.spread_rest_ratio;

    if !(shoulders >= MIN_SHOULDER_WIDTH) || range.abs() < f32::EPSILON {
        return 0.0;
    }

    bounded((wrists / shoulders - scales.spread_rest_ratio) / range, 0.0, 1.0)
}

/// `1 − mean hip y`.  Crouching lowers it, jumping raises it.
pub fn body_height(p: &PoseLandmarks) -> f32 {
    let hip_y = (p.left_hip().y + p.right_hip().y) / 2.0;
    bounded(1.0 - hip_y, 0.0, 1.0)
}

/// Right-minus-left shoulder depth, scaled into −1–1.
pub fn rotation(p: &PoseLandmarks, scale: f32) -> f32 {
    bounded((p.right_shoulder().z - p.left_shoulder().z) * scale, -1.0, 1.0)
}

/// Compute every continuous feature for `curr`.
///
/// `prev` is the last pose seen and `dt` the seconds elapsed since the
/// previous tick; both only affect `energy` (and its alias `speed`).
pub fn extract(
    curr:   &PoseLandmarks,
    prev:   Option<&PoseLandmarks>,
    dt:     f32,
    scales: &FeatureScales,
) -> FeatureVector {
    let energy = movement_energy(curr, prev, dt, scales.energy_scale);
    FeatureVector {
        energy,
        arm_spread: arm_spread(curr, scales),
        height:     body_height(curr),
        rotation:   rotation(curr, scales.rotation_scale),
        speed:      energy,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Finger predicates
// ════════════════════════════════════════════════════════════════════════════

/// Which fingers of one hand are extended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FingerStates {
    pub thumb:  bool,
    pub index:  bool,
    pub middle: bool,
    pub ring:   bool,
    pub pinky:  bool,
}

impl FingerStates {
    pub const fn new(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> Self {
        FingerStates { thumb, index, middle, ring, pinky }
    }

    pub fn extended_count(&self) -> usize {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
            .iter()
            .filter(|e| **e)
            .count()
    }
}

/// A finger is extended when its tip is above (smaller y than) the joint.
fn extended(h: &HandLandmarks, tip: usize, joint: usize) -> bool {
    h.points()[tip].y < h.points()[joint].y
}

/// Evaluate the five extension predicates.  The thumb compares its tip with
/// the IP joint, the other fingers compare their tip with the PIP joint.
pub fn finger_states(h: &HandLandmarks) -> FingerStates {
    FingerStates {
        thumb:  extended(h, hand::THUMB_TIP,  hand::THUMB_IP),
        index:  extended(h, hand::INDEX_TIP,  hand::INDEX_PIP),
        middle: extended(h, hand::MIDDLE_TIP, hand::MIDDLE_PIP),
        ring:   extended(h, hand::RING_TIP,   hand::RING_PIP),
        pinky:  extended(h, hand::PINKY_TIP,  hand::PINKY_PIP),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Exponential smoothing of the continuous parameter stream.

use crate::features::FeatureVector;

/// Default blend weight; lower is smoother but slower to respond.
pub const DEFAULT_SMOOTHING: f32 = 0.3;

/// Single-pole exponential filter over every field of a [`FeatureVector`].
///
/// Owns the one persistent smoothed state.  Each update moves every field a
/// fraction `alpha` of the way toward the raw sample, so a constant input is
/// approached monotonically and never overshot.  `speed` is not filtered on
/// its own: it always mirrors the smoothed `energy`.
///
/// The state starts at [`FeatureVector::NEUTRAL`], whose `height` of 0.5 is a
/// plausible standing value rather than the floor.
#[derive(Clone, Debug)]
pub struct TemporalSmoother {
    alpha: f32,
    state: FeatureVector,
}

impl TemporalSmoother {
    /// `alpha` must lie in `(0, 1]`; configuration validates it before a
    /// smoother is built.
    pub fn new(alpha: f32) -> Self {
        TemporalSmoother { alpha, state: FeatureVector::NEUTRAL }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend one raw sample into the state and return the new state.
    pub fn update(&mut self, raw: &FeatureVector) -> &FeatureVector {
        let a = self.alpha;
        let s = &mut self.state;
        s.energy     = blend(s.energy,     raw.energy,     a);
        s.arm_spread = blend(s.arm_spread, raw.arm_spread, a);
        s.height     = blend(s.height,     raw.height,     a);
        s.rotation   = blend(s.rotation,   raw.rotation,   a);
        s.speed      = s.energy;
        &self.state
    }

    pub fn state(&self) -> &FeatureVector {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = FeatureVector::NEUTRAL;
    }
}

/// Move `from` a fraction `a` of the way to `to`.  The f32 rounding of the
/// blend can land just past `to`, so the result is held between the two.
fn blend(from: f32, to: f32, a: f32) -> f32 {
    let next = from + (to - from) * a;
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    next.max(lo).min(hi)
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        TemporalSmoother::new(DEFAULT_SMOOTHING)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> FeatureVector {
        FeatureVector { energy: 0.8, arm_spread: 1.0, height: 0.1, rotation: -0.6, speed: 0.8 }
    }

    #[test]
    fn initial_state_is_neutral() {
        let s = TemporalSmoother::default();
        assert_eq!(*s.state(), FeatureVector::NEUTRAL);
        assert_eq!(s.state().height, 0.5);
        assert_eq!(s.alpha(), DEFAULT_SMOOTHING);
    }

    #[test]
    fn first_update_blends_from_neutral() {
        let mut s = TemporalSmoother::new(0.5);
        let out = *s.update(&target());
        assert!((out.energy - 0.4).abs() < 1e-6);
        assert!((out.height - 0.3).abs() < 1e-6);
        assert!((out.rotation + 0.3).abs() < 1e-6);
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let t = target();
        for alpha in [0.3, 0.7, 1.0] {
            let mut s = TemporalSmoother::new(alpha);
            let mut prev = *s.state();
            for _ in 0..200 {
                let next = *s.update(&t);
                // Rising fields never pass the target, falling fields never undershoot it.
                assert!(next.energy >= prev.energy && next.energy <= t.energy, "alpha {}", alpha);
                assert!(next.arm_spread >= prev.arm_spread && next.arm_spread <= t.arm_spread, "alpha {}", alpha);
                assert!(next.height <= prev.height && next.height >= t.height, "alpha {}: height {}", alpha, next.height);
                assert!(next.rotation <= prev.rotation && next.rotation >= t.rotation, "alpha {}", alpha);
                prev = next;
            }
            assert!((prev.energy - t.energy).abs() < 1e-4);
            assert!((prev.height - t.height).abs() < 1e-4);
        }
    }

    #[test]
    fn falling_height_lands_on_target_at_alpha_one() {
        // 0.5 + (0.1 - 0.5) * 1.0 rounds to 0.099999994 in f32.
        let mut s = TemporalSmoother::new(1.0);
        let out = *s.update(&FeatureVector { height: 0.1, ..FeatureVector::NEUTRAL });
        assert_eq!(out.height, 0.1);
    }

    #[test]
    fn alpha_one_tracks_input_exactly() {
        let mut s = TemporalSmoother::new(1.0);
        assert_eq!(*s.update(&target()), target());
    }

    #[test]
    fn speed_mirrors_smoothed_energy() {
        let mut s = TemporalSmoother::new(0.3);
        let raw = FeatureVector { speed: 0.0, ..target() };
        let out = s.update(&raw);
        assert_eq!(out.speed, out.energy);
    }

    #[test]
    fn reset_restores_neutral() {
        let mut s = TemporalSmoother::new(0.3);
        s.update(&target());
        s.reset();
        assert_eq!(*s.state(), FeatureVector::NEUTRAL);
    }
}

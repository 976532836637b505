//! # pose_signal
//!
//! Turns per-frame body landmarks from an external pose estimator into a
//! bounded vector of continuous control parameters, and hand landmarks into
//! finger-extension predicates.
//!
//! * [`landmarks`]: the frame types handed over by the inference engine.
//! * [`features`]: pure feature formulas (`energy`, `arm_spread`, `height`,
//!   `rotation`, `speed`) and the five finger predicates.
//! * [`smoothing`]: a single-pole exponential filter holding the one
//!   persistent [`FeatureVector`].
//!
//! Nothing in this crate does I/O or can fail: degenerate input produces the
//! neutral value for the affected feature.
//!
//! ## Quick start
//!
//! ```rust
//! use pose_signal::{extract, FeatureScales, Landmark, PoseLandmarks, TemporalSmoother};
//!
//! let pose = PoseLandmarks::uniform(Landmark::new(0.5, 0.5, 0.0));
//! let raw = extract(&pose, None, 1.0 / 30.0, &FeatureScales::default());
//! assert_eq!(raw.energy, 0.0);
//!
//! let mut smoother = TemporalSmoother::new(0.3);
//! let state = smoother.update(&raw);
//! assert!(state.height <= 0.5);
//! ```

pub mod landmarks;
pub mod features;
pub mod smoothing;

pub use landmarks::{
    Landmark, PoseLandmarks, HandLandmarks, LandmarkFrame,
    POSE_POINTS, HAND_POINTS,
};
pub use features::{
    FeatureVector, FeatureScales, FingerStates,
    extract, movement_energy, arm_spread, body_height, rotation, finger_states,
    ENERGY_SCALE, ROTATION_SCALE, SPREAD_REST_RATIO, SPREAD_FULL_RATIO,
};
pub use smoothing::{TemporalSmoother, DEFAULT_SMOOTHING};

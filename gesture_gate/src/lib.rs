//! # gesture_gate
//!
//! Discrete gesture triggers from hand landmarks.
//!
//! ```text
//!   HandLandmarks ──finger_states──▶ FingerStates ──classify──▶ GestureLabel
//!                                                                   │
//!                                        Debouncer::step(t, label) ◀┘
//!                                                   │
//!                                                   ▼
//!                                        Option<TriggerEvent>
//! ```
//!
//! ## Gesture table
//!
//! | Label | Fingers | Command |
//! |---|---|---|
//! | Victory | index + middle up, ring + pinky curled | `VICTORY` |
//! | ThumbsUp | thumb up, four fingers curled | `APPROVE` |
//! | OpenPalm | all five up | `CANCEL` |
//!
//! Classification is first-match-wins in the table order above.  A label
//! only becomes a [`TriggerEvent`] after being held continuously for the hold
//! threshold, and no further trigger can fire until the cooldown has passed.

pub mod classify;
pub mod debounce;

pub use classify::{GestureLabel, classify, classify_hand, classify_hands};
pub use debounce::{
    Debouncer, DebounceConfig, DebounceState, GestureState, TriggerEvent,
    HOLD_THRESHOLD, COOLDOWN_DURATION,
};

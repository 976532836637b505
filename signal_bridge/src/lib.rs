//! # signal_bridge
//!
//! Frame loop that turns body and hand landmarks into control-surface output.
//!
//! ## Outputs
//!
//! | Path | Input | Output |
//! |---|---|---|
//! | Continuous | body pose, every frame it is detected | `POST /dance` with the smoothed [`FeatureVector`](pose_signal::FeatureVector) |
//! | Discrete | hand gestures, held ≥ 1.5 s, 3 s cooldown | `POST /gesture` `{"command": …}` + trigger marker file |
//!
//! Neither output ever stalls the loop: parameter posts carry a 100 ms hard
//! timeout and every failure is logged and dropped.
//!
//! ## Frame sources
//!
//! * (default): the built-in synthetic performer, or JSON lines from a file,
//!   stdin, or a detector child process.
//! * `leap`: hand landmarks from a real LeapMotion controller via LeapC.

pub mod config;
pub mod source;
pub mod sim;
pub mod surface;
pub mod marker;
pub mod dispatch;
pub mod pipeline;

pub use config::{BridgeConfig, ConfigError, Mode};
pub use dispatch::{DispatchStats, Dispatcher};
pub use marker::TriggerMarker;
pub use pipeline::{run, LoopStats, Pipeline, RunSummary, StopReason, TickOutcome};
pub use sim::SimSource;
pub use source::{DetectorProcess, JsonLinesSource, LandmarkSource, SourceError};
pub use surface::{ControlSurface, DispatchError, HttpSurface, NullSurface};

#[cfg(feature = "leap")]
pub use source::LeapSource;

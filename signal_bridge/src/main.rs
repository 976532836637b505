//! signal_bridge: landmark frames in, control-surface signals out.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use gesture_gate::DebounceConfig;
use pose_signal::FeatureScales;
use signal_bridge::config::{self, BridgeConfig, Mode};
use signal_bridge::pipeline::{install_signal_handlers, shutdown_flag};
use signal_bridge::{
    run, ControlSurface, DetectorProcess, Dispatcher, HttpSurface, JsonLinesSource,
    LandmarkSource, NullSurface, Pipeline, SimSource, TriggerMarker,
};

#[derive(Parser, Debug)]
#[command(name = "signal_bridge", version, about = "Pose and hand landmarks to control-surface signals")]
struct Cli {
    /// Which outputs to produce
    #[arg(long, value_enum, default_value = "both")]
    mode: Mode,

    /// JSON-lines landmark file, or `-` for stdin (default: built-in simulator)
    #[arg(long, conflicts_with = "detector")]
    input: Option<PathBuf>,

    /// Detector command that prints READY then one JSON frame per line
    #[arg(long)]
    detector: Option<String>,

    /// Argument passed to the detector (repeatable; may start with `-`)
    #[arg(long = "detector-arg", requires = "detector", allow_hyphen_values = true)]
    detector_args: Vec<String>,

    /// Control surface base URL
    #[arg(long, env = "BRIDGE_SERVER_URL", default_value = config::DEFAULT_BRIDGE_URL)]
    bridge_url: String,

    /// Shared secret for gesture commands
    #[arg(long, env = "RESONANCE_KEY", default_value = config::DEFAULT_RESONANCE_KEY, hide_env_values = true)]
    resonance_key: String,

    /// Exponential smoothing factor, 0 < α ≤ 1
    #[arg(long, default_value_t = pose_signal::DEFAULT_SMOOTHING)]
    smoothing: f32,

    /// Seconds a gesture must be held before it fires
    #[arg(long, default_value_t = 1.5)]
    hold_secs: f64,

    /// Seconds after a trigger during which nothing fires
    #[arg(long, default_value_t = 3.0)]
    cooldown_secs: f64,

    /// Hard timeout for each parameter POST
    #[arg(long, default_value_t = 100)]
    params_timeout_ms: u64,

    /// Hard timeout for each gesture POST
    #[arg(long, default_value_t = 1000)]
    command_timeout_ms: u64,

    /// Sleep after every frame (default: 50 in hand mode, 0 otherwise)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Trigger marker file
    #[arg(long, default_value = config::DEFAULT_MARKER_PATH)]
    marker_path: PathBuf,

    /// Don't write the trigger marker
    #[arg(long)]
    no_marker: bool,

    /// Don't talk to the control surface at all
    #[arg(long)]
    offline: bool,

    /// Movement energy scale
    #[arg(long, default_value_t = pose_signal::ENERGY_SCALE)]
    energy_scale: f32,

    /// Shoulder-depth rotation scale
    #[arg(long, default_value_t = pose_signal::ROTATION_SCALE)]
    rotation_scale: f32,

    /// Simulator run length in seconds
    #[arg(long, default_value_t = 20.0)]
    sim_secs: f32,

    /// Simulator frame rate
    #[arg(long, default_value_t = 30.0)]
    sim_fps: f32,

    /// Read hands from a LeapMotion controller
    #[cfg(feature = "leap")]
    #[arg(long, conflicts_with_all = ["input", "detector"])]
    leap: bool,
}

fn seconds(name: &str, secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("--{} must be a non-negative number of seconds, got {}", name, secs))
}

impl Cli {
    fn config(&self) -> anyhow::Result<BridgeConfig> {
        let debounce = DebounceConfig {
            hold_threshold: seconds("hold-secs", self.hold_secs)?,
            cooldown:       seconds("cooldown-secs", self.cooldown_secs)?,
        };
        let scales = FeatureScales {
            energy_scale:   self.energy_scale,
            rotation_scale: self.rotation_scale,
            ..FeatureScales::default()
        };
        let tick_interval = match self.tick_ms {
            Some(ms) => Duration::from_millis(ms),
            None     => self.mode.default_tick(),
        };

        let cfg = BridgeConfig {
            mode:            self.mode,
            bridge_url:      self.bridge_url.clone(),
            resonance_key:   self.resonance_key.clone(),
            smoothing:       self.smoothing,
            debounce,
            scales,
            params_timeout:  Duration::from_millis(self.params_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            tick_interval,
            marker_path:     (!self.no_marker).then(|| self.marker_path.clone()),
            offline:         self.offline,
        };
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }

    fn open_source(&self) -> anyhow::Result<Box<dyn LandmarkSource>> {
        #[cfg(feature = "leap")]
        if self.leap {
            let leap = signal_bridge::LeapSource::connect().context("opening LeapMotion controller")?;
            return Ok(Box::new(leap));
        }

        if let Some(cmd) = &self.detector {
            let det = DetectorProcess::spawn(cmd, &self.detector_args)
                .with_context(|| format!("starting detector `{}`", cmd))?;
            return Ok(Box::new(det));
        }

        match &self.input {
            Some(p) if p.as_os_str() == "-" => Ok(Box::new(JsonLinesSource::stdin())),
            Some(p) => Ok(Box::new(JsonLinesSource::open(p)?)),
            None => {
                if !(self.sim_fps > 0.0) {
                    bail!("--sim-fps must be positive, got {}", self.sim_fps);
                }
                Ok(Box::new(SimSource::new(self.sim_fps, self.sim_secs).realtime()))
            }
        }
    }
}

fn open_surface(cfg: &BridgeConfig) -> anyhow::Result<Box<dyn ControlSurface>> {
    if cfg.offline {
        info!("offline: control surface disabled");
        return Ok(Box::new(NullSurface));
    }
    if cfg.resonance_key == config::DEFAULT_RESONANCE_KEY {
        warn!("RESONANCE_KEY not set; gesture commands carry the placeholder key");
    }
    let http = HttpSurface::new(&cfg.bridge_url, cfg.resonance_key.clone(), cfg.params_timeout, cfg.command_timeout)
        .context("building HTTP client")?;
    info!(dance = http.dance_url(), gesture = http.gesture_url(), "control surface");
    Ok(Box::new(http))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_bridge=info,gesture_gate=info".into()),
        )
        .init();

    info!("signal_bridge v{} starting", env!("CARGO_PKG_VERSION"));

    let cfg = cli.config()?;
    let mut source = cli.open_source()?;

    let mut dispatcher = Dispatcher::new(open_surface(&cfg)?);
    if let Some(path) = &cfg.marker_path {
        info!(path = %path.display(), "trigger marker");
        dispatcher = dispatcher.with_marker(TriggerMarker::new(path));
    }

    let mut pipeline = Pipeline::new(&cfg, dispatcher);
    install_signal_handlers();

    let summary = run(&mut source, &mut pipeline, cfg.tick_interval, shutdown_flag())
        .context("landmark source failed")?;

    let l = summary.loop_;
    let d = summary.dispatch;
    info!(
        reason          = ?summary.reason,
        elapsed         = ?summary.elapsed,
        frames          = l.frames,
        pose_frames     = l.pose_frames,
        hand_frames     = l.hand_frames,
        triggers        = l.triggers,
        params_failed   = d.params_failed,
        commands_failed = d.commands_failed,
        "stopped",
    );
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("signal_bridge").chain(args.iter().copied()))
    }

    #[test]
    fn detector_args_may_look_like_flags() {
        let cli = parse(&[
            "--detector", "python",
            "--detector-arg", "det.py",
            "--detector-arg", "--camera",
            "--detector-arg", "0",
            "--detector-arg", "-c",
        ]).unwrap();
        assert_eq!(cli.detector.as_deref(), Some("python"));
        assert_eq!(cli.detector_args, ["det.py", "--camera", "0", "-c"]);
    }

    #[test]
    fn detector_arg_needs_a_detector() {
        assert!(parse(&["--detector-arg", "x"]).is_err());
    }

    #[test]
    fn input_and_detector_conflict() {
        assert!(parse(&["--input", "-", "--detector", "det"]).is_err());
    }

    #[test]
    fn defaults_build_a_valid_config() {
        let cli = parse(&["--offline", "--mode", "hand"]).unwrap();
        let cfg = cli.config().unwrap();
        assert_eq!(cfg.mode, Mode::Hand);
        assert_eq!(cfg.tick_interval, Mode::Hand.default_tick());
        assert_eq!(cfg.debounce.hold_threshold, Duration::from_millis(1500));
        assert_eq!(cfg.debounce.cooldown, Duration::from_secs(3));
        assert_eq!(cfg.params_timeout, Duration::from_millis(100));
        assert_eq!(cfg.command_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.marker_path.as_deref(), Some(std::path::Path::new(config::DEFAULT_MARKER_PATH)));
        assert!(cfg.offline);
    }

    #[test]
    fn no_marker_and_explicit_tick() {
        let cfg = parse(&["--offline", "--no-marker", "--tick-ms", "5"]).unwrap().config().unwrap();
        assert_eq!(cfg.marker_path, None);
        assert_eq!(cfg.tick_interval, Duration::from_millis(5));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse(&["--offline", "--hold-secs=-1"]).unwrap().config().is_err());
        assert!(parse(&["--offline", "--smoothing", "0"]).unwrap().config().is_err());
        assert!(parse(&["--offline", "--params-timeout-ms", "0"]).unwrap().config().is_err());
        assert!(parse(&["--mode", "sideways"]).is_err());
    }
}

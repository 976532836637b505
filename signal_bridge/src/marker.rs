//! Out-of-band trigger marker.
//!
//! Each trigger overwrites one small file with `COMMAND|unix_seconds\n`, so a
//! process that can't speak HTTP can poll the file for the latest command.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use gesture_gate::GestureLabel;

/// Seconds since the Unix epoch, with sub-second precision.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Clone, Debug)]
pub struct TriggerMarker {
    path: PathBuf,
}

impl TriggerMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TriggerMarker { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the marker contents with `label` stamped now.
    pub fn record(&self, label: GestureLabel) -> io::Result<()> {
        self.write(label, unix_now())
    }

    pub fn write(&self, label: GestureLabel, unix_ts: f64) -> io::Result<()> {
        let command = label.command().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{} has no command", label))
        })?;
        fs::write(&self.path, format!("{}|{}\n", command, unix_ts))
    }

    /// Read back the last record, if the file exists and is well formed.
    pub fn read(&self) -> io::Result<Option<(String, f64)>> {
        match fs::read_to_string(&self.path) {
            Ok(s)  => Ok(parse_record(&s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Parse `COMMAND|seconds` (trailing newline optional).
pub fn parse_record(s: &str) -> Option<(String, f64)> {
    let (command, ts) = s.trim_end().split_once('|')?;
    if command.is_empty() {
        return None;
    }
    Some((command.to_string(), ts.parse().ok()?))
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

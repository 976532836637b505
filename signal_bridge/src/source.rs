//! Landmark sources: the inference engine seen from the frame loop.
//!
//! Whatever runs the camera and the pose/hand models, the loop only ever
//! asks a [`LandmarkSource`] for the next frame.  Concrete sources:
//!
//! | Source | Where frames come from |
//! |---|---|
//! | [`JsonLinesSource`] | a file or stdin, one JSON object per frame |
//! | [`DetectorProcess`] | a child process speaking the same JSON lines |
//! | [`SimSource`](crate::sim::SimSource) | a scripted synthetic performer |
//! | `LeapSource` | a LeapMotion controller (`leap` feature) |
//!
//! ## Wire format
//!
//! ```json
//! {"pose": [[x,y,z], …33], "hands": [{"landmarks": [[x,y,z], …21], "handedness": "Right", "score": 0.97}]}
//! ```
//!
//! Points may also be written as `{"x":…, "y":…, "z":…}`.  Both keys are
//! optional; `{}` or a blank line is a frame with nothing detected.  A pose
//! or hand with the wrong number of points is dropped.
//!
//! ## Stopping
//!
//! Every read takes the loop's stop flag.  Line-based sources read on a
//! helper thread and wait on a channel, so a stop is noticed within
//! [`STOP_POLL`] even while the input itself is silent.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use pose_signal::{HandLandmarks, Landmark, LandmarkFrame, PoseLandmarks};

/// First line a detector process must print once its models are loaded.
pub const READY_LINE: &str = "READY";

/// How often a blocked read looks at the stop flag.
pub const STOP_POLL: Duration = Duration::from_millis(50);

/// Lines read ahead of the frame loop before the reader thread waits.
const LINE_BACKLOG: usize = 64;

// ════════════════════════════════════════════════════════════════════════════
// SourceError
// ════════════════════════════════════════════════════════════════════════════

/// A source that can no longer produce frames.  Fatal to the loop.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open landmark input {}: {source}", .path.display())]
    Open { path: PathBuf, #[source] source: io::Error },

    #[error("cannot start detector `{command}`: {source}")]
    Spawn { command: String, #[source] source: io::Error },

    #[error("detector did not report READY (first line: {0:?})")]
    NotReady(String),

    #[error("landmark input read failed: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "leap")]
    #[error("LeapMotion: {0}")]
    Leap(String),
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait
// ════════════════════════════════════════════════════════════════════════════

pub trait LandmarkSource {
    /// Block until the next frame.  `Ok(None)` once the source is exhausted,
    /// or as soon as possible after `stop` is set.
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError> {
        (**self).next_frame(stop)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum PointJson {
    Triple([f32; 3]),
    Named { x: f32, y: f32, #[serde(default)] z: f32 },
}

impl From<&PointJson> for Landmark {
    fn from(p: &PointJson) -> Self {
        match *p {
            PointJson::Triple(xyz)        => Landmark::from(xyz),
            PointJson::Named { x, y, z } => Landmark::new(x, y, z),
        }
    }
}

#[derive(Deserialize)]
struct HandJson {
    landmarks: Vec<PointJson>,
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Deserialize)]
struct FrameJson {
    #[serde(default)]
    pose: Option<Vec<PointJson>>,
    #[serde(default)]
    hands: Vec<HandJson>,
    /// Detector-side problem for this frame (camera hiccup etc).
    #[serde(default)]
    error: Option<String>,
}

fn points(raw: &[PointJson]) -> Vec<Landmark> {
    raw.iter().map(Landmark::from).collect()
}

/// Parse one line of the wire format.
///
/// Only malformed JSON is an error; wrong point counts drop the offending
/// pose or hand with a debug log.
pub fn parse_frame(line: &str) -> Result<LandmarkFrame, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LandmarkFrame::empty());
    }
    let raw: FrameJson = serde_json::from_str(line)?;

    if let Some(err) = &raw.error {
        debug!("detector reported: {}", err);
    }

    let mut frame = LandmarkFrame::empty();
    if let Some(pose) = &raw.pose {
        match PoseLandmarks::from_points(&points(pose)) {
            Some(p) => frame.pose = Some(p),
            None    => debug!(points = pose.len(), "dropping pose with wrong point count"),
        }
    }
    for h in &raw.hands {
        match HandLandmarks::from_points(&points(&h.landmarks)) {
            Some(mut hand) => {
                hand.handedness = h.handedness.clone();
                hand.score = h.score;
                frame.hands.push(hand);
            }
            None => debug!(points = h.landmarks.len(), "dropping hand with wrong point count"),
        }
    }
    Ok(frame)
}

// ════════════════════════════════════════════════════════════════════════════
// JsonLinesSource
// ════════════════════════════════════════════════════════════════════════════

/// Read `reader` line by line into `tx` until EOF, a read error, or the
/// receiving side going away.
fn pump_lines<R: BufRead>(mut reader: R, tx: SyncSender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if tx.send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

/// One frame per line from any buffered reader.
///
/// The reader is drained on its own thread; the frame loop only ever waits
/// on the channel.
pub struct JsonLinesSource {
    lines:     Receiver<io::Result<String>>,
    name:      String,
    malformed: u64,
}

impl JsonLinesSource {
    pub fn new<R>(reader: R, name: impl Into<String>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::sync_channel(LINE_BACKLOG);
        thread::spawn(move || pump_lines(reader, tx));
        JsonLinesSource { lines, name: name.into(), malformed: 0 }
    }

    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(JsonLinesSource::new(BufReader::new(file), path.display().to_string()))
    }

    pub fn stdin() -> Self {
        JsonLinesSource::new(BufReader::new(io::stdin()), "stdin")
    }

    /// Lines that failed to parse so far.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    fn parse(&mut self, line: &str) -> LandmarkFrame {
        match parse_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                // A garbled line is one missed observation, not the end.
                self.malformed += 1;
                if self.malformed == 1 || self.malformed % 100 == 0 {
                    warn!(source = %self.name, count = self.malformed, "malformed landmark line: {}", e);
                }
                LandmarkFrame::empty()
            }
        }
    }
}

impl LandmarkSource for JsonLinesSource {
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError> {
        loop {
            match self.lines.recv_timeout(STOP_POLL) {
                Ok(Ok(line)) => return Ok(Some(self.parse(&line))),
                Ok(Err(e)) => return Err(SourceError::Io(e)),
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
                Err(RecvTimeoutError::Timeout) => {
                    if stop.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("json lines ({})", self.name)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DetectorProcess
// ════════════════════════════════════════════════════════════════════════════

/// A child process that owns the camera and the models and prints frames.
///
/// Handshake: the first stdout line must be [`READY_LINE`].  The child is
/// killed when this value is dropped, however the loop ended.
pub struct DetectorProcess {
    child:   Child,
    command: String,
    lines:   JsonLinesSource,
}

impl DetectorProcess {
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, SourceError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn { command: command.to_string(), source })?;

        let stdout = match child.stdout.take() {
            Some(s) => s,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::NotReady(String::new()));
            }
        };
        let mut reader = BufReader::new(stdout);

        let mut first = String::new();
        let read = reader.read_line(&mut first);
        if !matches!(read, Ok(n) if n > 0) || first.trim() != READY_LINE {
            let _ = child.kill();
            let _ = child.wait();
            read?;
            return Err(SourceError::NotReady(first.trim().to_string()));
        }

        info!(command, pid = child.id(), "detector ready");
        Ok(DetectorProcess {
            child,
            command: command.to_string(),
            lines: JsonLinesSource::new(reader, command),
        })
    }
}

impl LandmarkSource for DetectorProcess {
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError> {
        let frame = self.lines.next_frame(stop)?;
        if frame.is_none() && !stop.load(Ordering::SeqCst) {
            info!(command = %self.command, "detector closed its output");
        }
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("detector `{}` (pid {})", self.command, self.child.id())
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapSource (real hardware, feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Hand landmarks from a LeapMotion controller.
///
/// Leap reports millimetres relative to the device with y pointing up; each
/// joint is mapped into the detector's normalized frame (x, y in 0–1, y
/// growing downward) so the same finger predicates apply.  No pose is ever
/// produced.
#[cfg(feature = "leap")]
pub struct LeapSource {
    connection: leaprs::Connection,
}

#[cfg(feature = "leap")]
const LEAP_SPAN_MM:   f32 = 400.0;
#[cfg(feature = "leap")]
const LEAP_HEIGHT_MM: f32 = 500.0;

#[cfg(feature = "leap")]
fn leap_point(x: f32, y: f32, z: f32) -> Landmark {
    Landmark::new(0.5 + x / LEAP_SPAN_MM, 1.0 - y / LEAP_HEIGHT_MM, z / LEAP_SPAN_MM)
}

#[cfg(feature = "leap")]
impl LeapSource {
    pub fn connect() -> Result<Self, SourceError> {
        use leaprs::*;
        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|e| SourceError::Leap(format!("{:?}", e)))?;
        connection.open().map_err(|e| SourceError::Leap(format!("{:?}", e)))?;
        Ok(LeapSource { connection })
    }

    fn hand(hand: &leaprs::Hand) -> Option<HandLandmarks> {
        use pose_signal::landmarks::hand as idx;
        macro_rules! lm {
            ($v:expr) => {{ let v = $v; leap_point(v.x, v.y, v.z) }};
        }

        let digits: Vec<_> = hand.digits().collect();
        if digits.len() < 5 {
            return None;
        }

        // Wrist stands in for every unset point; each finger fills its own
        // MCP / PIP / DIP / TIP slots.
        let wrist = lm!(hand.palm().position());
        let mut h = HandLandmarks::uniform(wrist);
        let firsts = [idx::THUMB_CMC, idx::INDEX_MCP, idx::MIDDLE_MCP, idx::RING_MCP, idx::PINKY_MCP];
        for (digit, first) in digits.iter().zip(firsts) {
            h = h
                .with_point(first,     lm!(digit.proximal().prev_joint()))
                .with_point(first + 1, lm!(digit.proximal().next_joint()))
                .with_point(first + 2, lm!(digit.intermediate().next_joint()))
                .with_point(first + 3, lm!(digit.distal().next_joint()));
        }

        let side = match hand.hand_type() {
            leaprs::HandType::Left => "Left",
            _                      => "Right",
        };
        Some(h.with_handedness(side))
    }
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapSource {
    fn next_frame(&mut self, stop: &AtomicBool) -> Result<Option<LandmarkFrame>, SourceError> {
        use leaprs::*;
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            let msg = match self.connection.poll(100) {
                Ok(m)  => m,
                // Poll timeout: a tick in which nothing was seen.
                Err(_) => return Ok(Some(LandmarkFrame::empty())),
            };
            if let Event::Tracking(frame) = msg.event() {
                let hands = frame.hands().filter_map(|h| LeapSource::hand(&h)).collect();
                return Ok(Some(LandmarkFrame { pose: None, hands }));
            }
        }
    }

    fn describe(&self) -> String {
        "LeapMotion".to_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Instant;

    /// A stop flag nobody sets.
    static RUNNING: AtomicBool = AtomicBool::new(false);

    /// Set `stop` after `delay` on another thread.
    fn stop_after(delay: Duration) -> Arc<AtomicBool> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(delay);
            flag.store(true, Ordering::SeqCst);
        });
        stop
    }

    fn triples(n: usize, y: f32) -> String {
        let pts: Vec<String> = (0..n).map(|_| format!("[0.5,{},0.0]", y)).collect();
        format!("[{}]", pts.join(","))
    }

    #[test]
    fn parses_pose_and_hands() {
        let line = format!(
            r#"{{"pose": {}, "hands": [{{"landmarks": {}, "handedness": "Left", "score": 0.9}}]}}"#,
            triples(33, 0.4),
            triples(21, 0.6),
        );
        let frame = parse_frame(&line).unwrap();
        let pose = frame.pose.unwrap();
        assert_eq!(pose.nose(), &Landmark::new(0.5, 0.4, 0.0));
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness.as_deref(), Some("Left"));
        assert_eq!(frame.hands[0].score, Some(0.9));
    }

    #[test]
    fn named_points_accepted() {
        let pts: Vec<String> = (0..21).map(|i| format!(r#"{{"x":0.1,"y":{}}}"#, i as f32 / 100.0)).collect();
        let line = format!(r#"{{"hands":[{{"landmarks":[{}]}}]}}"#, pts.join(","));
        let frame = parse_frame(&line).unwrap();
        assert_eq!(frame.hands[0].points()[20], Landmark::new(0.1, 0.2, 0.0));
        assert!(frame.pose.is_none());
    }

    #[test]
    fn empty_objects_and_blank_lines_are_no_detection() {
        assert!(parse_frame("{}").unwrap().is_empty());
        assert!(parse_frame("   \n").unwrap().is_empty());
        assert!(parse_frame(r#"{"pose": null, "hands": []}"#).unwrap().is_empty());
        assert!(parse_frame(r#"{"error": "camera read failed"}"#).unwrap().is_empty());
    }

    #[test]
    fn wrong_point_counts_are_dropped() {
        let line = format!(
            r#"{{"pose": {}, "hands": [{{"landmarks": {}}}, {{"landmarks": {}}}]}}"#,
            triples(32, 0.4),
            triples(20, 0.6),
            triples(21, 0.6),
        );
        let frame = parse_frame(&line).unwrap();
        assert!(frame.pose.is_none());
        assert_eq!(frame.hands.len(), 1);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"pose": [[1, 2]]}"#).is_err());
    }

    #[test]
    fn json_lines_source_reads_to_eof() {
        let input = format!("{{}}\nnot json\n{{\"pose\": {}}}\n", triples(33, 0.5));
        let mut src = JsonLinesSource::new(Cursor::new(input), "test");

        assert!(src.next_frame(&RUNNING).unwrap().unwrap().is_empty());
        // Malformed line: an empty frame, and the stream goes on.
        assert!(src.next_frame(&RUNNING).unwrap().unwrap().is_empty());
        assert_eq!(src.malformed(), 1);
        assert!(src.next_frame(&RUNNING).unwrap().unwrap().pose.is_some());
        assert!(src.next_frame(&RUNNING).unwrap().is_none());
        assert!(src.next_frame(&RUNNING).unwrap().is_none());
    }

    #[test]
    fn missing_input_file() {
        let err = JsonLinesSource::open(Path::new("/definitely/not/here.jsonl")).err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn missing_detector_binary() {
        let err = DetectorProcess::spawn("signal-bridge-no-such-detector", &[]).err().unwrap();
        assert!(matches!(err, SourceError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn detector_handshake_and_frames() {
        let script = "echo READY; echo '{}'; echo '{}'".to_string();
        let mut det = DetectorProcess::spawn("sh", &["-c".to_string(), script]).unwrap();
        assert!(det.next_frame(&RUNNING).unwrap().unwrap().is_empty());
        assert!(det.next_frame(&RUNNING).unwrap().unwrap().is_empty());
        assert!(det.next_frame(&RUNNING).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn detector_without_ready_is_rejected() {
        let args = ["-c".to_string(), "echo loading models".to_string()];
        match DetectorProcess::spawn("sh", &args) {
            Err(SourceError::NotReady(first)) => assert_eq!(first, "loading models"),
            other => panic!("expected NotReady, got {:?}", other.err()),
        }
    }

    #[test]
    fn silent_reader_returns_once_stopped() {
        // The sender is held open, so the reader thread stays blocked.
        let (_hold, rx) = mpsc::channel::<()>();
        struct Silent(Receiver<()>);
        impl io::Read for Silent {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                let _ = self.0.recv();
                Ok(0)
            }
        }
        let mut src = JsonLinesSource::new(BufReader::new(Silent(rx)), "silent");

        let stop = stop_after(Duration::from_millis(150));
        let start = Instant::now();
        assert!(src.next_frame(&stop).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1), "took {:?}", start.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn stopped_detector_is_killed_on_drop() {
        let args = ["-c".to_string(), "echo READY; exec sleep 30".to_string()];
        let mut det = DetectorProcess::spawn("sh", &args).unwrap();
        let pid = det.child.id() as libc::pid_t;

        let stop = stop_after(Duration::from_millis(150));
        let start = Instant::now();
        assert!(det.next_frame(&stop).unwrap().is_none());
        drop(det);
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());

        // Reaped: the pid no longer exists.
        assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
    }
}

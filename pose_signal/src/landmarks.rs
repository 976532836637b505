//! Landmark frame types.
//!
//! One [`LandmarkFrame`] is produced by the external inference engine per
//! captured camera frame.  Body points follow the 33-point MediaPipe Pose
//! layout; hand points follow the 21-point MediaPipe Hands layout.  Frames
//! are immutable once built and are replaced, never mutated, by the next one.

/// Number of points in a body pose.
pub const POSE_POINTS: usize = 33;

/// Number of joints in one hand.
pub const HAND_POINTS: usize = 21;

/// Body landmark indices (MediaPipe Pose).
pub mod pose {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}

/// Hand joint indices (MediaPipe Hands).
pub mod hand {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

// ════════════════════════════════════════════════════════════════════════════
// Landmark
// ════════════════════════════════════════════════════════════════════════════

/// A single 3D landmark point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    /// 0–1, normalized to image width.
    pub x: f32,
    /// 0–1, normalized to image height.  Smaller is higher in the frame.
    pub y: f32,
    /// Relative depth.
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    /// Euclidean distance to `other` in all three axes.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(p: [f32; 3]) -> Self {
        Landmark::new(p[0], p[1], p[2])
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PoseLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// The 33 body points of one detected person.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseLandmarks {
    points: [Landmark; POSE_POINTS],
}

impl PoseLandmarks {
    /// Build from a point list; `None` unless exactly [`POSE_POINTS`] long.
    pub fn from_points(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; POSE_POINTS] = points.try_into().ok()?;
        Some(PoseLandmarks { points })
    }

    /// Every point at the same position.
    pub fn uniform(p: Landmark) -> Self {
        PoseLandmarks { points: [p; POSE_POINTS] }
    }

    /// Copy with point `index` replaced.  Out-of-range indices are ignored.
    pub fn with_point(mut self, index: usize, p: Landmark) -> Self {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = p;
        }
        self
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark; POSE_POINTS] {
        &self.points
    }

    pub fn nose(&self)           -> &Landmark { &self.points[pose::NOSE] }
    pub fn left_shoulder(&self)  -> &Landmark { &self.points[pose::LEFT_SHOULDER] }
    pub fn right_shoulder(&self) -> &Landmark { &self.points[pose::RIGHT_SHOULDER] }
    pub fn left_wrist(&self)     -> &Landmark { &self.points[pose::LEFT_WRIST] }
    pub fn right_wrist(&self)    -> &Landmark { &self.points[pose::RIGHT_WRIST] }
    pub fn left_hip(&self)       -> &Landmark { &self.points[pose::LEFT_HIP] }
    pub fn right_hip(&self)      -> &Landmark { &self.points[pose::RIGHT_HIP] }
    pub fn left_ankle(&self)     -> &Landmark { &self.points[pose::LEFT_ANKLE] }
    pub fn right_ankle(&self)    -> &Landmark { &self.points[pose::RIGHT_ANKLE] }
}

// ════════════════════════════════════════════════════════════════════════════
// HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// The 21 joints of one detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; HAND_POINTS],
    /// "Left" / "Right" as reported by the detector, if it reports it.
    pub handedness: Option<String>,
    /// Detection confidence 0–1, if reported.
    pub score: Option<f32>,
}

impl HandLandmarks {
    /// Build from a point list; `None` unless exactly [`HAND_POINTS`] long.
    pub fn from_points(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; HAND_POINTS] = points.try_into().ok()?;
        Some(HandLandmarks { points, handedness: None, score: None })
    }

    pub fn uniform(p: Landmark) -> Self {
        HandLandmarks { points: [p; HAND_POINTS], handedness: None, score: None }
    }

    pub fn with_point(mut self, index: usize, p: Landmark) -> Self {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = p;
        }
        self
    }

    pub fn with_handedness(mut self, handedness: impl Into<String>) -> Self {
        self.handedness = Some(handedness.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark; HAND_POINTS] {
        &self.points
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkFrame
// ════════════════════════════════════════════════════════════════════════════

/// Everything the inference engine found in one camera frame.
///
/// A frame with neither a pose nor any hand is a "no detection" observation,
/// which is a normal state of affairs and not an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkFrame {
    pub pose:  Option<PoseLandmarks>,
    pub hands: Vec<HandLandmarks>,
}

impl LandmarkFrame {
    /// A frame in which nothing was detected.
    pub fn empty() -> Self {
        LandmarkFrame::default()
    }

    pub fn with_pose(mut self, pose: PoseLandmarks) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn with_hand(mut self, hand: HandLandmarks) -> Self {
        self.hands.push(hand);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.hands.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

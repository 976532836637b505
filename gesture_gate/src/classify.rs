//! Gesture classification from finger predicates.

use pose_signal::{finger_states, FingerStates, HandLandmarks};

// ════════════════════════════════════════════════════════════════════════════
// GestureLabel
// ════════════════════════════════════════════════════════════════════════════

/// The closed set of recognised hand gestures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    /// Nothing recognised (or nothing detected).
    #[default]
    None,
    /// ✌ index and middle up, ring and pinky curled.
    Victory,
    /// 👍 thumb up, every other finger curled.
    ThumbsUp,
    /// ✋ all five fingers up.
    OpenPalm,
}

impl GestureLabel {
    /// Every label that can fire a trigger, in classification priority order.
    pub const TRIGGERS: [GestureLabel; 3] = [
        GestureLabel::Victory,
        GestureLabel::ThumbsUp,
        GestureLabel::OpenPalm,
    ];

    pub fn is_none(&self) -> bool {
        *self == GestureLabel::None
    }

    /// Label name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::None     => "NONE",
            GestureLabel::Victory  => "VICTORY",
            GestureLabel::ThumbsUp => "THUMBS_UP",
            GestureLabel::OpenPalm => "OPEN_PALM",
        }
    }

    /// Command string understood by the control surface and written to the
    /// trigger marker.  `None` never triggers and has no command.
    pub fn command(&self) -> Option<&'static str> {
        match self {
            GestureLabel::None     => None,
            GestureLabel::Victory  => Some("VICTORY"),
            GestureLabel::ThumbsUp => Some("APPROVE"),
            GestureLabel::OpenPalm => Some("CANCEL"),
        }
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Predicates, checked in this order, first match wins
// ════════════════════════════════════════════════════════════════════════════

fn is_victory(s: &FingerStates) -> bool {
    s.index && s.middle && !s.ring && !s.pinky
}

fn is_thumbs_up(s: &FingerStates) -> bool {
    s.thumb && !s.index && !s.middle && !s.ring && !s.pinky
}

fn is_open_palm(s: &FingerStates) -> bool {
    s.thumb && s.index && s.middle && s.ring && s.pinky
}

/// Map finger predicates to exactly one label.
///
/// The order (Victory, ThumbsUp, OpenPalm) is fixed: noisy landmarks can
/// satisfy overlapping readings, and the result must not depend on anything
/// but the predicates.
pub fn classify(s: FingerStates) -> GestureLabel {
    if is_victory(&s) {
        GestureLabel::Victory
    } else if is_thumbs_up(&s) {
        GestureLabel::ThumbsUp
    } else if is_open_palm(&s) {
        GestureLabel::OpenPalm
    } else {
        GestureLabel::None
    }
}

pub fn classify_hand(hand: &HandLandmarks) -> GestureLabel {
    classify(finger_states(hand))
}

/// First non-`None` label among the detected hands, in detector order.
pub fn classify_hands(hands: &[HandLandmarks]) -> GestureLabel {
    hands.iter()
        .map(classify_hand)
        .find(|l| !l.is_none())
        .unwrap_or(GestureLabel::None)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pose_signal::landmarks::hand;
    use pose_signal::Landmark;

    fn fs(t: bool, i: bool, m: bool, r: bool, p: bool) -> FingerStates {
        FingerStates::new(t, i, m, r, p)
    }

    #[test]
    fn canonical_shapes() {
        assert_eq!(classify(fs(false, true,  true,  false, false)), GestureLabel::Victory);
        assert_eq!(classify(fs(true,  false, false, false, false)), GestureLabel::ThumbsUp);
        assert_eq!(classify(fs(true,  true,  true,  true,  true )), GestureLabel::OpenPalm);
        assert_eq!(classify(fs(false, false, false, false, false)), GestureLabel::None);
        assert_eq!(classify(fs(false, true,  false, false, false)), GestureLabel::None);
    }

    #[test]
    fn victory_wins_over_loose_open_palm() {
        // Thumb, index and middle up: a majority-of-fingers reading would call
        // this an open palm, but Victory is checked first.
        let s = fs(true, true, true, false, false);
        assert!(s.extended_count() >= 3);
        assert_eq!(classify(s), GestureLabel::Victory);
    }

    #[test]
    fn every_combination_yields_exactly_one_label() {
        for bits in 0u8..32 {
            let s = fs(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0, bits & 16 != 0);
            let label = classify(s);
            let expected = if is_victory(&s) {
                GestureLabel::Victory
            } else if is_thumbs_up(&s) {
                GestureLabel::ThumbsUp
            } else if is_open_palm(&s) {
                GestureLabel::OpenPalm
            } else {
                GestureLabel::None
            };
            assert_eq!(label, expected, "bits {:05b}", bits);
        }
    }

    #[test]
    fn commands_match_control_surface_vocabulary() {
        assert_eq!(GestureLabel::Victory.command(),  Some("VICTORY"));
        assert_eq!(GestureLabel::ThumbsUp.command(), Some("APPROVE"));
        assert_eq!(GestureLabel::OpenPalm.command(), Some("CANCEL"));
        assert_eq!(GestureLabel::None.command(), None);
    }

    fn victory_hand() -> HandLandmarks {
        let mut h = HandLandmarks::uniform(Landmark::new(0.5, 0.5, 0.0));
        for tip in [hand::INDEX_TIP, hand::MIDDLE_TIP] {
            h = h.with_point(tip, Landmark::new(0.5, 0.3, 0.0));
        }
        for tip in [hand::RING_TIP, hand::PINKY_TIP, hand::THUMB_TIP] {
            h = h.with_point(tip, Landmark::new(0.5, 0.7, 0.0));
        }
        h
    }

    #[test]
    fn classify_hand_reads_landmarks() {
        assert_eq!(classify_hand(&victory_hand()), GestureLabel::Victory);
    }

    #[test]
    fn classify_hands_takes_first_recognised_hand() {
        let idle = HandLandmarks::uniform(Landmark::new(0.5, 0.5, 0.0));
        assert_eq!(classify_hands(&[idle.clone(), victory_hand()]), GestureLabel::Victory);
        assert_eq!(classify_hands(&[idle]), GestureLabel::None);
        assert_eq!(classify_hands(&[]), GestureLabel::None);
    }
}

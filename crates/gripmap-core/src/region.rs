//! Anatomical region taxonomy for the tactile hand.
//!
//! Every sensor channel belongs to exactly one region. The enum's
//! discriminant order is the presentation order used everywhere a
//! region table is rendered: palm first, then each finger from index
//! to pinky in tip/pad/mid/prox order, then the thumb.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Anatomical grouping of tactile channels (21 regions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Region {
    Palm = 0,
    IndexTip = 1,
    IndexPad = 2,
    IndexMid = 3,
    IndexProx = 4,
    MiddleTip = 5,
    MiddlePad = 6,
    MiddleMid = 7,
    MiddleProx = 8,
    RingTip = 9,
    RingPad = 10,
    RingMid = 11,
    RingProx = 12,
    PinkyTip = 13,
    PinkyPad = 14,
    PinkyMid = 15,
    PinkyProx = 16,
    ThumbTip = 17,
    ThumbPad = 18,
    ThumbMiddle = 19,
    ThumbBase = 20,
}

impl Region {
    pub const COUNT: usize = 21;

    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::Palm),
            1 => Some(Self::IndexTip),
            2 => Some(Self::IndexPad),
            3 => Some(Self::IndexMid),
            4 => Some(Self::IndexProx),
            5 => Some(Self::MiddleTip),
            6 => Some(Self::MiddlePad),
            7 => Some(Self::MiddleMid),
            8 => Some(Self::MiddleProx),
            9 => Some(Self::RingTip),
            10 => Some(Self::RingPad),
            11 => Some(Self::RingMid),
            12 => Some(Self::RingProx),
            13 => Some(Self::PinkyTip),
            14 => Some(Self::PinkyPad),
            15 => Some(Self::PinkyMid),
            16 => Some(Self::PinkyProx),
            17 => Some(Self::ThumbTip),
            18 => Some(Self::ThumbPad),
            19 => Some(Self::ThumbMiddle),
            20 => Some(Self::ThumbBase),
            _ => None,
        }
    }

    /// Iterate all regions in presentation order
    pub fn all() -> impl Iterator<Item = Region> {
        (0..Self::COUNT as u8).filter_map(Self::from_index)
    }

    /// Operator-facing label, e.g. "Index Tip"
    pub fn label(&self) -> &'static str {
        match self {
            Self::Palm => "Palm",
            Self::IndexTip => "Index Tip",
            Self::IndexPad => "Index Pad",
            Self::IndexMid => "Index Mid",
            Self::IndexProx => "Index Prox",
            Self::MiddleTip => "Middle Tip",
            Self::MiddlePad => "Middle Pad",
            Self::MiddleMid => "Middle Mid",
            Self::MiddleProx => "Middle Prox",
            Self::RingTip => "Ring Tip",
            Self::RingPad => "Ring Pad",
            Self::RingMid => "Ring Mid",
            Self::RingProx => "Ring Prox",
            Self::PinkyTip => "Pinky Tip",
            Self::PinkyPad => "Pinky Pad",
            Self::PinkyMid => "Pinky Mid",
            Self::PinkyProx => "Pinky Prox",
            Self::ThumbTip => "Thumb Tip",
            Self::ThumbPad => "Thumb Pad",
            Self::ThumbMiddle => "Thumb Middle",
            Self::ThumbBase => "Thumb Base",
        }
    }

    /// Resolve a sensor channel id to its region.
    ///
    /// The rules mirror the hand's channel naming convention. Only the
    /// exact id `palm_touch` is the palm; finger channels named
    /// `*_palm_touch` are the proximal pads facing the palm side, not
    /// the palm itself. `fingerfive` is the thumb, which has its own
    /// zone set. Zone substrings are checked most specific first
    /// (`tip` before `top`).
    pub fn resolve(id: &str) -> Option<Region> {
        if id == "palm_touch" {
            return Some(Region::Palm);
        }

        if id.contains("fingerfive") {
            return if id.contains("tip") {
                Some(Region::ThumbTip)
            } else if id.contains("top") {
                Some(Region::ThumbPad)
            } else if id.contains("mid") {
                Some(Region::ThumbMiddle)
            } else if id.contains("palm") {
                Some(Region::ThumbBase)
            } else {
                None
            };
        }

        let finger = if id.contains("fingerone") {
            FingerZones::PINKY
        } else if id.contains("fingertwo") {
            FingerZones::RING
        } else if id.contains("fingerthree") {
            FingerZones::MIDDLE
        } else if id.contains("fingerfour") {
            FingerZones::INDEX
        } else {
            return None;
        };

        if id.contains("tip") {
            Some(finger.tip)
        } else if id.contains("top") {
            Some(finger.pad)
        } else if id.contains("mid") {
            Some(finger.mid)
        } else if id.contains("palm") {
            Some(finger.prox)
        } else {
            None
        }
    }

    /// True for any of the four thumb regions
    pub fn is_thumb(&self) -> bool {
        matches!(
            self,
            Self::ThumbTip | Self::ThumbPad | Self::ThumbMiddle | Self::ThumbBase
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Zone set of one non-thumb finger, used by `Region::resolve`
struct FingerZones {
    tip: Region,
    pad: Region,
    mid: Region,
    prox: Region,
}

impl FingerZones {
    const INDEX: Self = Self {
        tip: Region::IndexTip,
        pad: Region::IndexPad,
        mid: Region::IndexMid,
        prox: Region::IndexProx,
    };
    const MIDDLE: Self = Self {
        tip: Region::MiddleTip,
        pad: Region::MiddlePad,
        mid: Region::MiddleMid,
        prox: Region::MiddleProx,
    };
    const RING: Self = Self {
        tip: Region::RingTip,
        pad: Region::RingPad,
        mid: Region::RingMid,
        prox: Region::RingProx,
    };
    const PINKY: Self = Self {
        tip: Region::PinkyTip,
        pad: Region::PinkyPad,
        mid: Region::PinkyMid,
        prox: Region::PinkyProx,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palm_is_exact_match_only() {
        assert_eq!(Region::resolve("palm_touch"), Some(Region::Palm));
        // A finger's palm-side pad must never classify as Palm
        assert_eq!(
            Region::resolve("fingerthree_palm_touch"),
            Some(Region::MiddleProx)
        );
        assert_eq!(Region::resolve("some_palm_touch"), None);
    }

    #[test]
    fn test_thumb_zones() {
        assert_eq!(Region::resolve("fingerfive_tip_touch"), Some(Region::ThumbTip));
        assert_eq!(Region::resolve("fingerfive_top_touch"), Some(Region::ThumbPad));
        assert_eq!(
            Region::resolve("fingerfive_middle_touch"),
            Some(Region::ThumbMiddle)
        );
        assert_eq!(
            Region::resolve("fingerfive_palm_touch"),
            Some(Region::ThumbBase)
        );
    }

    #[test]
    fn test_finger_families() {
        assert_eq!(Region::resolve("fingerone_tip_touch"), Some(Region::PinkyTip));
        assert_eq!(Region::resolve("fingertwo_top_touch"), Some(Region::RingPad));
        assert_eq!(
            Region::resolve("fingerfour_palm_touch"),
            Some(Region::IndexProx)
        );
        assert_eq!(Region::resolve("force_act"), None);
        assert_eq!(Region::resolve(""), None);
    }

    #[test]
    fn test_presentation_order() {
        assert!(Region::Palm < Region::IndexTip);
        assert!(Region::IndexTip < Region::IndexPad);
        assert!(Region::IndexProx < Region::MiddleTip);
        assert!(Region::PinkyProx < Region::ThumbTip);
        assert!(Region::ThumbMiddle < Region::ThumbBase);

        let all: Vec<Region> = Region::all().collect();
        assert_eq!(all.len(), Region::COUNT);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_index_roundtrip() {
        for i in 0..Region::COUNT as u8 {
            let region = Region::from_index(i).unwrap();
            assert_eq!(region as u8, i);
        }
        assert!(Region::from_index(21).is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Region::Palm.label(), "Palm");
        assert_eq!(Region::IndexTip.to_string(), "Index Tip");
        assert_eq!(Region::ThumbBase.to_string(), "Thumb Base");
        // Display honors padding for table rendering
        assert_eq!(format!("{:<14}", Region::Palm), "Palm          ");
    }
}

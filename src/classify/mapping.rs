//! Static lane-to-pitch remap tables.
//!
//! Each table lists, per difficulty tier, the source lane codes a chart uses
//! and the interchange pitch they become. Lanes missing from a table resolve
//! to `None` and the note is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Instrument a remap table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    /// Six-button guitar (three black, three white frets plus open).
    Guitar3x2,
    /// Four-lane touch guitar.
    GuitarTouch,
    Drums,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Guitar3x2 => write!(f, "guitar_3x2"),
            Instrument::GuitarTouch => write!(f, "touchguitar"),
            Instrument::Drums => write!(f, "touchdrums"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// A lane resolved through a remap table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedNote {
    pub instrument: Instrument,
    pub difficulty: Difficulty,
    pub pitch: u8,
}

/// Star power / overdrive phrase pitch shared by every table.
pub const STAR_POWER_PITCH: u8 = 116;

/// Immutable lane-to-pitch table for one instrument.
#[derive(Debug, Clone)]
pub struct MidiMapping {
    instrument: Instrument,
    lanes: HashMap<u8, (Difficulty, u8)>,
}

/// One difficulty tier: first source lane and first target pitch.
struct Tier {
    difficulty: Difficulty,
    source: u8,
    target: u8,
}

impl Tier {
    const fn new(difficulty: Difficulty, source: u8, target: u8) -> Self {
        Self {
            difficulty,
            source,
            target,
        }
    }
}

const GUITAR_3X2_TIERS: [Tier; 4] = [
    Tier::new(Difficulty::Expert, 59, 94),
    Tier::new(Difficulty::Hard, 41, 82),
    Tier::new(Difficulty::Medium, 23, 70),
    Tier::new(Difficulty::Easy, 5, 58),
];

/// Source lane offset to target pitch offset: B1 W1 B2 W2 B3 W3, open at +10.
const GUITAR_3X2_LANES: [(u8, u8); 7] = [(0, 4), (1, 1), (2, 5), (3, 2), (4, 6), (5, 3), (10, 0)];

const FOUR_LANE_TIERS: [Tier; 4] = [
    Tier::new(Difficulty::Expert, 50, 96),
    Tier::new(Difficulty::Hard, 38, 84),
    Tier::new(Difficulty::Medium, 26, 72),
    Tier::new(Difficulty::Easy, 14, 60),
];

impl MidiMapping {
    fn build(
        instrument: Instrument,
        tiers: &[Tier],
        lanes_for: impl Fn(&Tier) -> Vec<(u8, u8)>,
    ) -> Self {
        let mut lanes = HashMap::new();
        for tier in tiers {
            for (source, target) in lanes_for(tier) {
                lanes.insert(tier.source + source, (tier.difficulty, tier.target + target));
            }
        }
        Self { instrument, lanes }
    }

    /// Six-button guitar table. Star power sits at expert + 15.
    pub fn guitar_3x2() -> &'static MidiMapping {
        static TABLE: OnceLock<MidiMapping> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut map = Self::build(Instrument::Guitar3x2, &GUITAR_3X2_TIERS, |_| {
                GUITAR_3X2_LANES.to_vec()
            });
            map.lanes.insert(59 + 15, (Difficulty::Expert, STAR_POWER_PITCH));
            map
        })
    }

    /// Four-lane touch guitar table. Star power sits at expert + 5.
    pub fn guitar_touch() -> &'static MidiMapping {
        static TABLE: OnceLock<MidiMapping> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut map = Self::build(Instrument::GuitarTouch, &FOUR_LANE_TIERS, |_| {
                (0..4).map(|lane| (lane, lane)).collect()
            });
            map.lanes.insert(50 + 5, (Difficulty::Expert, STAR_POWER_PITCH));
            map
        })
    }

    /// Drums table: four expert lanes plus star power, five lanes below expert.
    pub fn drums() -> &'static MidiMapping {
        static TABLE: OnceLock<MidiMapping> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut map = Self::build(Instrument::Drums, &FOUR_LANE_TIERS, |tier| {
                let count = match tier.difficulty {
                    Difficulty::Expert => 4,
                    _ => 5,
                };
                (0..count).map(|lane| (lane, lane)).collect()
            });
            map.lanes.insert(50 + 5, (Difficulty::Expert, STAR_POWER_PITCH));
            map
        })
    }

    pub fn for_instrument(instrument: Instrument) -> &'static MidiMapping {
        match instrument {
            Instrument::Guitar3x2 => Self::guitar_3x2(),
            Instrument::GuitarTouch => Self::guitar_touch(),
            Instrument::Drums => Self::drums(),
        }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Target pitch for a source lane.
    pub fn get(&self, lane: u8) -> Option<u8> {
        self.lanes.get(&lane).map(|&(_, pitch)| pitch)
    }

    pub fn resolve(&self, lane: u8) -> Option<MappedNote> {
        self.lanes.get(&lane).map(|&(difficulty, pitch)| MappedNote {
            instrument: self.instrument,
            difficulty,
            pitch,
        })
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Forced-HOPO marker pitch for a six-button guitar note.
///
/// The marker sits two pitches above the tier's highest fret; the forced-on
/// variant (HOPO bit `0x80` of `kind`) is one below that. Pitches outside a
/// playable tier, star power included, have no marker.
pub fn hopo_marker_pitch(target: u8, kind: u8) -> Option<u8> {
    let marker = match target {
        94..=100 => 102,
        82..=88 => 90,
        70..=76 => 78,
        58..=64 => 66,
        _ => return None,
    };
    Some(marker - ((kind & 0x80) >> 7))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guitar_3x2_expert() {
        let map = MidiMapping::guitar_3x2();
        assert_eq!(map.get(59), Some(98));
        assert_eq!(map.get(60), Some(95));
        assert_eq!(map.get(64), Some(97));
        assert_eq!(map.get(69), Some(94));
        assert_eq!(map.get(74), Some(116));
        assert_eq!(map.get(66), None);
        assert_eq!(map.len(), 4 * 7 + 1);
    }

    #[test]
    fn test_guitar_3x2_easy() {
        let map = MidiMapping::guitar_3x2();
        let note = map.resolve(5).unwrap();
        assert_eq!(note.difficulty, Difficulty::Easy);
        assert_eq!(note.pitch, 62);
        assert_eq!(map.get(15), Some(58));
    }

    #[test]
    fn test_guitar_touch() {
        let map = MidiMapping::guitar_touch();
        assert_eq!(map.get(50), Some(96));
        assert_eq!(map.get(53), Some(99));
        assert_eq!(map.get(55), Some(116));
        assert_eq!(map.get(54), None);
        assert_eq!(map.get(14), Some(60));
        assert_eq!(map.get(18), None);
    }

    #[test]
    fn test_drums() {
        let map = MidiMapping::drums();
        assert_eq!(map.get(54), None);
        assert_eq!(map.get(55), Some(116));
        assert_eq!(map.get(42), Some(88));
        assert_eq!(map.resolve(30).unwrap().difficulty, Difficulty::Medium);
        assert_eq!(map.len(), 4 + 1 + 3 * 5);
    }

    #[test]
    fn test_unmapped_lane_is_none() {
        for map in [
            MidiMapping::guitar_3x2(),
            MidiMapping::guitar_touch(),
            MidiMapping::drums(),
        ] {
            assert_eq!(map.get(0), None);
            assert_eq!(map.get(255), None);
        }
    }

    #[test]
    fn test_hopo_marker() {
        assert_eq!(hopo_marker_pitch(98, 0), Some(102));
        assert_eq!(hopo_marker_pitch(98, 0x80), Some(101));
        assert_eq!(hopo_marker_pitch(58, 0x81), Some(65));
        assert_eq!(hopo_marker_pitch(116, 0), None);
        assert_eq!(hopo_marker_pitch(101, 0), None);
    }
}

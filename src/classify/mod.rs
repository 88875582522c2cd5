//! Semantic classification of raw chart records.
//!
//! Both chart formats pack the meaning of a record into a few code bits.
//! These functions decode them into [`EventClass`]; codes that fit no rule
//! come back as [`EventClass::Unknown`] so they can be carried through as
//! opaque markers instead of failing the conversion.

pub mod mapping;

pub use mapping::{hopo_marker_pitch, Difficulty, Instrument, MappedNote, MidiMapping};

use crate::chart::{ChartEntry, ChartEvent};

/// Entry-table chart BPM declaration (`data` holds the `f32` bits).
pub const TEMPO_DECLARATION: i32 = 0x0B00_0002;
/// Entry-table tempo change (`data` holds microseconds per quarter).
pub const TEMPO_CHANGE: i32 = 0x0B00_0001;
/// Entry-table section marker.
pub const SECTION_MARKER: i32 = 0x09FF_FFFF;
/// Entry-table author marker.
pub const AUTHOR_MARKER: i32 = 0x0AFF_FFFF;
/// Entry-table all-flags marker placed at position zero.
pub const SENTINEL: i32 = -1;
/// Entry-table filter effect without its own effect lane.
pub const FILTER_EFFECT: i32 = 0x05FF_FFFF;
/// High byte of entry-table effect notes.
pub const EFFECT_CATEGORY: u8 = 0x06;
/// Base modifier of entry-table lyric notes.
pub const LYRIC_BASE: i32 = 0x1000;
/// Base modifier of entry-table lyric markers.
pub const LYRIC_MARKER_BASE: i32 = 0x1100;

/// Tick-table `kind` of lyric events.
pub const KIND_LYRIC: u8 = 57;
/// Tick-table `kind` of vocal phrase markers.
pub const KIND_PHRASE: u8 = 1;
/// Tick-table `kind` of practice sections.
pub const KIND_PRACTICE: u8 = 3;
/// Tick-table `kind` bit forcing a hammer-on.
pub const KIND_HOPO: u8 = 0x80;
/// Tick-table pitch of vocal phrase markers.
pub const PHRASE_PITCH: u8 = 129;

/// Closed set of record meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Playable note on a lane (interchange key for entry tables, source lane
    /// for tick tables).
    Note { lane: u8 },
    TempoDeclaration,
    TempoChange,
    SectionMarker,
    AuthorMarker,
    LyricText,
    LyricPageMarker,
    LyricColorMarker,
    /// Lyric marker with an unrecognized sub-code.
    LyricMarker(u8),
    EffectNote { lane: u8 },
    PracticeSection,
    PhraseMarker,
    /// Free text not covered by a more specific rule.
    TextEvent,
    /// All-flags marker with no text.
    Sentinel,
    Unknown(i32),
}

impl EventClass {
    /// Marker text used for lyric markers in interchange output.
    pub fn lyric_marker_name(&self) -> Option<String> {
        match self {
            EventClass::LyricPageMarker => Some("LYRIC_PAGE".to_string()),
            EventClass::LyricColorMarker => Some("LYRIC_COLOR".to_string()),
            EventClass::LyricMarker(code) => Some(format!("LYRIC_UNK_{code}")),
            _ => None,
        }
    }
}

/// Classifies an entry-table entry by its modifier.
///
/// High byte is the category, low byte the lane. Text only matters for the
/// `..FFFFFF` marker family.
pub fn classify_entry(entry: &ChartEntry) -> EventClass {
    let code = entry.modifier;
    let category = entry.category();

    if category == EFFECT_CATEGORY || code == FILTER_EFFECT {
        return EventClass::EffectNote {
            lane: (code & 0x7F) as u8,
        };
    }

    if category == 0x0B {
        return match code {
            TEMPO_DECLARATION => EventClass::TempoDeclaration,
            TEMPO_CHANGE => EventClass::TempoChange,
            _ => EventClass::Unknown(code),
        };
    }

    if code & 0x00FF_FFFF == 0x00FF_FFFF {
        return match (entry.text.is_empty(), category) {
            (false, 0x0A) => EventClass::AuthorMarker,
            (false, 0x09) => EventClass::SectionMarker,
            (true, 0xFF) => EventClass::Sentinel,
            _ => EventClass::Unknown(code),
        };
    }

    match code & !0xFF {
        LYRIC_MARKER_BASE => match entry.lane() {
            1 => EventClass::LyricPageMarker,
            3 | 4 => EventClass::LyricColorMarker,
            other => EventClass::LyricMarker(other),
        },
        LYRIC_BASE => EventClass::LyricText,
        _ => EventClass::Note { lane: entry.lane() },
    }
}

/// Classifies a tick-table event by its text, pitch and kind.
pub fn classify_event(event: &ChartEvent) -> EventClass {
    let has_text = event.text().is_some();

    match (has_text, event.kind, event.pitch) {
        (true, KIND_LYRIC, _) => EventClass::LyricText,
        (_, KIND_PHRASE, PHRASE_PITCH) => EventClass::PhraseMarker,
        (true, KIND_PRACTICE, _) => EventClass::PracticeSection,
        (true, _, _) => EventClass::TextEvent,
        (false, _, pitch) if pitch > 127 => EventClass::Unknown(i32::from(pitch)),
        (false, _, pitch) => EventClass::Note { lane: pitch },
    }
}

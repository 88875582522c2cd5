//! In-memory interchange model for Standard MIDI Files.
//!
//! A [`Sequence`] is a list of [`Track`]s of absolutely-timed events at a
//! fixed resolution. Charts are assembled into this model and disassembled
//! from it; [`read_smf`] and [`write_smf`] move it to and from SMF bytes.

mod midi_export;
mod midi_import;

pub use midi_export::write_smf;
pub use midi_import::read_smf;

pub use crate::clock::TICKS_PER_QUARTER;

use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Kind of a timed interchange event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TrackName(String),
    Text(String),
    Lyric(String),
    Marker(String),
    CuePoint(String),
    Copyright(String),
    /// Microseconds per quarter note.
    Tempo(u32),
    TimeSignature {
        numerator: u8,
        /// Denominator as a power of two.
        denominator_power: u8,
    },
    NoteOn {
        channel: u8,
        key: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        key: u8,
        velocity: u8,
    },
}

impl EventKind {
    /// Ordering rank among events at the same tick: track name first, then
    /// note-offs, then everything else in insertion order.
    fn rank(&self) -> u8 {
        match self {
            EventKind::TrackName(_) => 0,
            EventKind::NoteOff { .. } => 1,
            _ => 2,
        }
    }

    /// Text payload of text-like meta events.
    pub fn text(&self) -> Option<&str> {
        match self {
            EventKind::TrackName(text)
            | EventKind::Text(text)
            | EventKind::Lyric(text)
            | EventKind::Marker(text)
            | EventKind::CuePoint(text)
            | EventKind::Copyright(text) => Some(text),
            _ => None,
        }
    }
}

/// An event at an absolute tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u64,
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn new(tick: u64, kind: EventKind) -> Self {
        Self { tick, kind }
    }
}

/// A note reconstructed from a note-on/note-off pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub start: u64,
    pub end: u64,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
}

/// One interchange track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub events: Vec<TimedEvent>,
}

impl Track {
    /// Creates a track whose first event is its name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            events: vec![TimedEvent::new(0, EventKind::TrackName(name.into()))],
        }
    }

    /// First track-name event, if any.
    pub fn name(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match &event.kind {
            EventKind::TrackName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn push(&mut self, tick: u64, kind: EventKind) {
        self.events.push(TimedEvent::new(tick, kind));
    }

    /// Adds a note-on/note-off pair on channel 0.
    pub fn push_note(&mut self, start: u64, end: u64, key: u8, velocity: u8) {
        self.push(
            start,
            EventKind::NoteOn {
                channel: 0,
                key,
                velocity,
            },
        );
        self.push(
            end,
            EventKind::NoteOff {
                channel: 0,
                key,
                velocity,
            },
        );
    }

    /// Stable sort by tick; see [`EventKind`] for same-tick ordering.
    pub fn sort(&mut self) {
        self.events
            .sort_by(|a, b| a.tick.cmp(&b.tick).then(a.kind.rank().cmp(&b.kind.rank())));
    }

    /// Tick of the latest event, zero for an empty track.
    pub fn end_tick(&self) -> u64 {
        self.events.iter().map(|event| event.tick).max().unwrap_or(0)
    }

    /// Ticks of every note-on, in event order.
    pub fn note_on_ticks(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter(|event| matches!(event.kind, EventKind::NoteOn { .. }))
            .map(|event| event.tick)
            .collect()
    }

    /// Pairs note-ons with note-offs.
    ///
    /// Pairing is first-in first-out per channel and key. Notes left open at
    /// the end of the track get one quarter note of length.
    pub fn notes(&self) -> Vec<Note> {
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();
        let mut notes = Vec::new();

        for event in &self.events {
            match event.kind {
                EventKind::NoteOn {
                    channel,
                    key,
                    velocity,
                } => open
                    .entry((channel, key))
                    .or_default()
                    .push_back((event.tick, velocity)),
                EventKind::NoteOff { channel, key, .. } => {
                    if let Some((start, velocity)) =
                        open.get_mut(&(channel, key)).and_then(VecDeque::pop_front)
                    {
                        notes.push(Note {
                            start,
                            end: event.tick,
                            channel,
                            key,
                            velocity,
                        });
                    }
                }
                _ => {}
            }
        }

        for ((channel, key), starts) in open {
            for (start, velocity) in starts {
                warn!(key, start, "note without note-off, closing after one quarter");
                notes.push(Note {
                    start,
                    end: start + TICKS_PER_QUARTER,
                    channel,
                    key,
                    velocity,
                });
            }
        }

        notes.sort_by_key(|note| (note.start, note.key));
        notes
    }
}

/// A multi-track interchange sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub ticks_per_quarter: u16,
    pub tracks: Vec<Track>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            ticks_per_quarter: TICKS_PER_QUARTER as u16,
            tracks: Vec::new(),
        }
    }

    /// First track with the given name.
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.name() == Some(name))
    }

    /// Tick of the latest event across all tracks.
    pub fn end_tick(&self) -> u64 {
        self.tracks.iter().map(Track::end_tick).max().unwrap_or(0)
    }

    /// Every event of every track, in track order.
    pub fn events(&self) -> impl Iterator<Item = &TimedEvent> {
        self.tracks.iter().flat_map(|track| track.events.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(channel: u8, key: u8, velocity: u8) -> EventKind {
        EventKind::NoteOn {
            channel,
            key,
            velocity,
        }
    }

    fn note_off(channel: u8, key: u8, velocity: u8) -> EventKind {
        EventKind::NoteOff {
            channel,
            key,
            velocity,
        }
    }

    #[test]
    fn test_sort_places_name_and_offs_first() {
        let mut track = Track::default();
        track.push_note(0, 480, 60, 100);
        track.push_note(480, 960, 60, 100);
        track.push(480, EventKind::Text("[idle]".into()));
        track.push(0, EventKind::TrackName("NOTES".into()));
        track.sort();

        let kinds: Vec<&EventKind> = track.events.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], EventKind::TrackName(_)));
        assert!(matches!(kinds[1], EventKind::NoteOn { .. }));
        assert!(matches!(kinds[2], EventKind::NoteOff { .. }));
        assert_eq!(track.events[2].tick, 480);
        assert!(matches!(kinds[3], EventKind::NoteOn { .. }));
        assert!(matches!(kinds[4], EventKind::Text(_)));
    }

    #[test]
    fn test_fifo_note_pairing() {
        let mut track = Track::named("x");
        // Overlapping notes on the same key pair in order.
        track.push(0, note_on(0, 60, 90));
        track.push(100, note_on(0, 60, 80));
        track.push(200, note_off(0, 60, 0));
        track.push(300, note_off(0, 60, 0));

        let notes = track.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].start, notes[0].end, notes[0].velocity), (0, 200, 90));
        assert_eq!((notes[1].start, notes[1].end, notes[1].velocity), (100, 300, 80));
    }

    #[test]
    fn test_unclosed_note() {
        let mut track = Track::default();
        track.push(960, note_on(1, 40, 1));
        let notes = track.notes();
        assert_eq!(notes[0].end, 960 + TICKS_PER_QUARTER);
    }

    #[test]
    fn test_track_lookup() {
        let mut seq = Sequence::new();
        seq.tracks.push(Track::named("xmkTempo"));
        let mut notes = Track::named("NOTES");
        notes.push_note(0, 1920, 60, 100);
        seq.tracks.push(notes);

        assert!(seq.track("NOTES").is_some());
        assert!(seq.track("EVENTS").is_none());
        assert_eq!(seq.end_tick(), 1920);
    }
}

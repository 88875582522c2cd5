//! Standard MIDI File (SMF) reader.
//!
//! Parses SMF bytes with `midly` into a [`Sequence`] at 480 ticks per quarter.
//!
//! # Limitations
//!
//! - SMPTE timecode timing and Format 2 (sequential) files are rejected
//! - Only text-like meta events, tempo, time signature and note on/off are
//!   kept; controllers, pitch bend and SysEx are dropped
//! - Note-on with velocity 0 is read as note-off

use super::{EventKind, Sequence, TimedEvent, Track, TICKS_PER_QUARTER};
use crate::error::{ChartError, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

/// Parses SMF bytes into a sequence.
///
/// # Errors
///
/// Returns [`ChartError::Midi`] if the bytes are not a valid SMF or use an
/// unsupported format or timing.
pub fn read_smf(data: &[u8]) -> Result<Sequence> {
    let smf = Smf::parse(data).map_err(|e| ChartError::Midi(e.to_string()))?;

    let source_tpq = match smf.header.timing {
        Timing::Metrical(tpq) => u64::from(tpq.as_int()),
        Timing::Timecode(_, _) => {
            return Err(ChartError::Midi(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if source_tpq == 0 {
        return Err(ChartError::Midi("zero ticks per quarter".to_string()));
    }
    if smf.header.format == Format::Sequential {
        return Err(ChartError::Midi(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let tracks: Vec<Track> = smf
        .tracks
        .iter()
        .map(|track| parse_track(track, source_tpq))
        .collect();

    debug!(tracks = tracks.len(), source_tpq, "parsed MIDI file");
    Ok(Sequence {
        ticks_per_quarter: TICKS_PER_QUARTER as u16,
        tracks,
    })
}

fn parse_track(track: &[midly::TrackEvent], source_tpq: u64) -> Track {
    let mut events = Vec::new();
    let mut source_tick = 0u64;

    for event in track {
        source_tick += u64::from(event.delta.as_int());
        let tick = scale_ticks(source_tick, source_tpq);

        let kind = match event.kind {
            TrackEventKind::Meta(meta) => match meta {
                MetaMessage::TrackName(bytes) => EventKind::TrackName(text(bytes)),
                MetaMessage::Text(bytes) => EventKind::Text(text(bytes)),
                MetaMessage::Lyric(bytes) => EventKind::Lyric(text(bytes)),
                MetaMessage::Marker(bytes) => EventKind::Marker(text(bytes)),
                MetaMessage::CuePoint(bytes) => EventKind::CuePoint(text(bytes)),
                MetaMessage::Copyright(bytes) => EventKind::Copyright(text(bytes)),
                MetaMessage::Tempo(us) => EventKind::Tempo(us.as_int()),
                MetaMessage::TimeSignature(numerator, denominator_power, _, _) => {
                    EventKind::TimeSignature {
                        numerator,
                        denominator_power,
                    }
                }
                _ => continue,
            },
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => EventKind::NoteOn {
                        channel,
                        key: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOn { key, vel } | MidiMessage::NoteOff { key, vel } => {
                        EventKind::NoteOff {
                            channel,
                            key: key.as_int(),
                            velocity: vel.as_int(),
                        }
                    }
                    _ => continue,
                }
            }
            _ => continue,
        };
        events.push(TimedEvent::new(tick, kind));
    }

    Track { events }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Scales an absolute tick from the source resolution to 480 per quarter.
fn scale_ticks(source_ticks: u64, source_tpq: u64) -> u64 {
    if source_tpq == TICKS_PER_QUARTER {
        source_ticks
    } else {
        source_ticks * TICKS_PER_QUARTER / source_tpq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::write_smf;

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
    fn test_scale_ticks() {
        assert_eq!(scale_ticks(480, 480), 480);
        assert_eq!(scale_ticks(960, 960), 480);
        assert_eq!(scale_ticks(240, 240), 480);
        assert_eq!(scale_ticks(120, 120), 480);
        assert_eq!(scale_ticks(1, 960), 0);
    }

    #[test]
    fn test_reads_written_sequence() {
        let mut seq = Sequence::new();
        let mut tempo = Track::named("");
        tempo.push(
            0,
            EventKind::TimeSignature {
                numerator: 4,
                denominator_power: 2,
            },
        );
        tempo.push(0, EventKind::Tempo(500_000));
        seq.tracks.push(tempo);

        let mut notes = Track::named("NOTES");
        notes.push(0, EventKind::CuePoint("120".into()));
        notes.push(0, EventKind::Copyright("someone".into()));
        notes.push(480, EventKind::Lyric("la".into()));
        notes.push(480, EventKind::Marker("LYRIC_PAGE".into()));
        notes.push_note(480, 720, 64, 99);
        seq.tracks.push(notes);

        let parsed = read_smf(&write_smf(&seq)).unwrap();
        assert_eq!(parsed, seq);
    }

    #[test]
    fn test_zero_velocity_note_on_is_off() {
        let mut seq = Sequence::new();
        let mut track = Track::default();
        track.push(0, note_on(2, 60, 10));
        track.push(100, note_on(2, 60, 0));
        seq.tracks.push(track);

        let parsed = read_smf(&write_smf(&seq)).unwrap();
        assert_eq!(parsed.tracks[0].events[1].kind, note_off(2, 60, 0));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(read_smf(b"not a midi file"), Err(ChartError::Midi(_))));
    }
}

//! Entry-table chart to interchange sequence.
//!
//! Output tracks:
//! - an unnamed tempo track with a 4/4 signature and the tempo map
//! - `NOTES`: the chart BPM as a cue point, author, sections, markers,
//!   lyrics and notes
//! - `EFFECTS`: effect notes, only when the chart has any

use super::{EFFECTS_TRACK, NOTES_TRACK};
use crate::chart::EntryChart;
use crate::classify::{classify_entry, EventClass};
use crate::clock::{bpm_to_us, MeasureClock, DEFAULT_US_PER_QUARTER, TICKS_PER_MEASURE};
use crate::error::{ChartError, Result};
use crate::midi::{EventKind, Sequence, Track};
use tracing::{debug, warn};

/// Chart tempo declared by an entry-table chart.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChartTempo {
    bpm: f32,
    us_per_quarter: u32,
}

/// Finds the single chart BPM declaration.
///
/// Declarations with a non-positive BPM are ignored like a missing one.
fn chart_tempo(chart: &EntryChart) -> Result<Option<ChartTempo>> {
    let mut declarations = chart
        .entries
        .iter()
        .filter(|entry| classify_entry(entry) == EventClass::TempoDeclaration);

    let Some(first) = declarations.next() else {
        return Ok(None);
    };
    if declarations.next().is_some() {
        return Err(ChartError::AmbiguousTempoDeclaration(
            "chart declares more than one chart BPM".to_string(),
        ));
    }

    let bpm = f32::from_bits(first.data as u32);
    match bpm_to_us(bpm) {
        Some(us_per_quarter) => Ok(Some(ChartTempo {
            bpm,
            us_per_quarter,
        })),
        None => {
            warn!(bpm, "ignoring invalid chart BPM");
            Ok(None)
        }
    }
}

/// Builds the tempo track and the clock used for every other track.
fn tempo_map(chart: &EntryChart, tempo: Option<ChartTempo>) -> (Track, MeasureClock) {
    let mut track = Track::default();
    track.push(
        0,
        EventKind::TimeSignature {
            numerator: 4,
            denominator_power: 2,
        },
    );

    // Without a chart BPM the change entries can't be placed, so only the
    // default tempo is written.
    let Some(tempo) = tempo else {
        track.push(0, EventKind::Tempo(DEFAULT_US_PER_QUARTER));
        return (track, MeasureClock::fixed(DEFAULT_US_PER_QUARTER));
    };

    let mut changes: Vec<(f64, u32)> = chart
        .entries
        .iter()
        .filter(|entry| classify_entry(entry) == EventClass::TempoChange)
        .map(|entry| (f64::from(entry.start), entry.data as u32))
        .collect();
    changes.sort_by(|a, b| a.0.total_cmp(&b.0));

    if changes.first().map_or(true, |&(start, _)| start != 0.0) {
        track.push(0, EventKind::Tempo(tempo.us_per_quarter));
    }
    for &(start, us) in &changes {
        let tick = (start * TICKS_PER_MEASURE as f64).round_ties_even().max(0.0) as u64;
        track.push(tick, EventKind::Tempo(us));
    }
    track.sort();

    (track, MeasureClock::new(tempo.us_per_quarter, &changes))
}

fn velocity(data: i32) -> u8 {
    data.saturating_add(1).clamp(1, 127) as u8
}

/// Converts an entry-table chart to an interchange sequence.
///
/// # Errors
///
/// - [`ChartError::AmbiguousTempoDeclaration`] if more than one chart BPM is declared
/// - [`ChartError::InternalClockInconsistency`] if a position can't be mapped
pub fn entry_chart_to_sequence(chart: &EntryChart) -> Result<Sequence> {
    let tempo = chart_tempo(chart)?;
    let (tempo_track, clock) = tempo_map(chart, tempo);

    let mut notes = Track::named(NOTES_TRACK);
    let mut effects = Track::named(EFFECTS_TRACK);
    let mut effect_count = 0usize;

    for entry in &chart.entries {
        let class = classify_entry(entry);
        let start = clock.to_ticks(f64::from(entry.start))?;
        let end = clock.to_ticks(f64::from(entry.start) + f64::from(entry.length))?;
        // Lengths under one tick round away; those entries stay markers only.
        let sounding = entry.length > 0.0 && end > start;

        let lane = match class {
            EventClass::EffectNote { lane } => {
                if end > start {
                    effects.push_note(start, end, lane, velocity(entry.data));
                    effect_count += 1;
                }
                continue;
            }
            EventClass::TempoDeclaration => {
                if let Some(tempo) = tempo {
                    notes.push(0, EventKind::CuePoint(tempo.bpm.to_string()));
                }
                continue;
            }
            EventClass::TempoChange | EventClass::Sentinel => continue,
            EventClass::AuthorMarker => {
                notes.push(0, EventKind::Copyright(entry.text.clone()));
                continue;
            }
            EventClass::SectionMarker => {
                notes.push(start, EventKind::Text(entry.text.clone()));
                continue;
            }
            EventClass::Unknown(code) => {
                let marker = if entry.text.is_empty() {
                    format!("UNK_{code:X}")
                } else {
                    format!("UNK_{code:X}_{}", entry.text)
                };
                notes.push(start, EventKind::Marker(marker));
                continue;
            }
            EventClass::LyricPageMarker
            | EventClass::LyricColorMarker
            | EventClass::LyricMarker(_) => {
                if let Some(name) = class.lyric_marker_name() {
                    notes.push(start, EventKind::Marker(name));
                }
                entry.lane()
            }
            EventClass::LyricText => {
                if sounding && !entry.text.is_empty() {
                    notes.push(start, EventKind::Lyric(entry.text.clone()));
                }
                entry.lane()
            }
            EventClass::Note { lane } => lane,
            EventClass::PracticeSection | EventClass::PhraseMarker | EventClass::TextEvent => {
                continue
            }
        };

        if !sounding {
            continue;
        }
        if lane > 127 {
            warn!(modifier = entry.modifier, "note key out of range, skipping");
            continue;
        }
        notes.push_note(start, end, lane, velocity(entry.data));
    }

    notes.sort();
    let mut sequence = Sequence::new();
    sequence.tracks.push(tempo_track);
    sequence.tracks.push(notes);
    if effect_count > 0 {
        effects.sort();
        sequence.tracks.push(effects);
    }

    debug!(
        entries = chart.entries.len(),
        tracks = sequence.tracks.len(),
        chart_us = clock.chart_us(),
        "assembled entry-table chart"
    );
    Ok(sequence)
}

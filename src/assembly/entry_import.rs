//! Interchange sequence to entry-table chart.

use super::{align_markers, EFFECTS_TRACK, NOTES_TRACK};
use crate::chart::{ChartEntry, EntryChart};
use crate::classify::{
    AUTHOR_MARKER, EFFECT_CATEGORY, FILTER_EFFECT, LYRIC_BASE, LYRIC_MARKER_BASE, SECTION_MARKER,
    SENTINEL, TEMPO_CHANGE, TEMPO_DECLARATION,
};
use crate::clock::{bpm_to_us, us_to_bpm, MeasureClock, DEFAULT_US_PER_QUARTER, TICKS_PER_MEASURE};
use crate::error::{ChartError, Result};
use crate::midi::{EventKind, Note, Sequence};
use tracing::{debug, warn};

/// Version written for charts rebuilt from interchange data.
const OUTPUT_VERSION: i32 = 2;

/// Decodes an interchange marker back to the entry modifier it came from.
///
/// Returns the modifier and the text the entry should carry.
fn marker_code(marker: &str) -> (i32, String) {
    match marker {
        "LYRIC_PAGE" => return (LYRIC_MARKER_BASE | 0x01, String::new()),
        "LYRIC_COLOR" => return (LYRIC_MARKER_BASE | 0x03, String::new()),
        _ => {}
    }

    if let Some(code) = marker
        .strip_prefix("LYRIC_UNK_")
        .and_then(|n| n.parse::<u8>().ok())
    {
        return (LYRIC_MARKER_BASE | i32::from(code), String::new());
    }

    if let Some(rest) = marker.strip_prefix("UNK_") {
        let (hex, text) = rest.split_once('_').unwrap_or((rest, ""));
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            return (code as i32, text.to_string());
        }
    }

    (SECTION_MARKER, marker.to_string())
}

/// Resolves the chart BPM and microseconds per quarter.
///
/// A cue point holding a number declares the chart BPM. Without one, the
/// sequence must use a single tempo value throughout.
fn chart_tempo(sequence: &Sequence, tempos: &[(u64, u32)]) -> Result<(f32, u32, bool)> {
    let cues: Vec<f32> = sequence
        .events()
        .filter_map(|event| match &event.kind {
            EventKind::CuePoint(text) => text.trim().parse::<f32>().ok(),
            _ => None,
        })
        .collect();

    match cues.as_slice() {
        [] => {}
        [bpm] => match bpm_to_us(*bpm) {
            Some(us) => return Ok((*bpm, us, true)),
            None => warn!(bpm, "ignoring cue point with invalid BPM"),
        },
        _ => {
            return Err(ChartError::AmbiguousTempoDeclaration(format!(
                "{} cue points declare a chart BPM",
                cues.len()
            )))
        }
    }

    let mut values: Vec<u32> = tempos.iter().map(|&(_, us)| us).collect();
    values.sort_unstable();
    values.dedup();
    if values.len() > 1 {
        return Err(ChartError::AmbiguousTempoDeclaration(format!(
            "no cue point and {} distinct tempos",
            values.len()
        )));
    }

    let us = values.first().copied().unwrap_or(DEFAULT_US_PER_QUARTER);
    Ok((us_to_bpm(us), us, false))
}

fn note_entry(clock: &MeasureClock, note: &Note, modifier: i32) -> Result<ChartEntry> {
    let start = clock.to_chart(note.start)?;
    let end = clock.to_chart(note.end)?;
    Ok(ChartEntry::new(start as f32, modifier, (end - start) as f32)
        .with_data(i32::from(note.velocity.saturating_sub(1))))
}

/// Rebuilds an entry-table chart from an interchange sequence.
///
/// The `NOTES` track carries notes, lyrics, sections, the author and the
/// chart BPM cue point; tempo events may sit on any track. An `EFFECTS`
/// track is optional. The result is version 2, sorted, with a sentinel entry
/// at position zero.
///
/// # Errors
///
/// - [`ChartError::MissingTrack`] if there is no `NOTES` track
/// - [`ChartError::AmbiguousTempoDeclaration`] if the chart BPM can't be told apart
/// - [`ChartError::OrphanedMarker`] if a lyric has no note at its tick
pub fn sequence_to_entry_chart(sequence: &Sequence) -> Result<EntryChart> {
    let notes_track = sequence
        .track(NOTES_TRACK)
        .ok_or_else(|| ChartError::MissingTrack(NOTES_TRACK.to_string()))?;

    let mut tempos: Vec<(u64, u32)> = sequence
        .events()
        .filter_map(|event| match event.kind {
            EventKind::Tempo(us) => Some((event.tick, us)),
            _ => None,
        })
        .collect();
    tempos.sort_by_key(|&(tick, _)| tick);

    let (bpm, chart_us, declared) = chart_tempo(sequence, &tempos)?;

    let mut chart = EntryChart::new(OUTPUT_VERSION);
    chart.entries.push(ChartEntry::new(0.0, SENTINEL, 0.0));
    chart
        .entries
        .push(ChartEntry::new(0.0, TEMPO_DECLARATION, 0.0).with_data(bpm.to_bits() as i32));

    let mut changes = Vec::new();
    if declared {
        for &(tick, us) in &tempos {
            if tick == 0 && us == chart_us {
                continue;
            }
            let measure = tick as f64 / TICKS_PER_MEASURE as f64;
            changes.push((measure, us));
            chart
                .entries
                .push(ChartEntry::new(measure as f32, TEMPO_CHANGE, 0.0).with_data(us as i32));
        }
    }
    let clock = MeasureClock::new(chart_us, &changes);

    let notes = notes_track.notes();
    let mut modifiers: Vec<i32> = notes.iter().map(|note| i32::from(note.key)).collect();
    let mut texts: Vec<String> = vec![String::new(); notes.len()];
    let mut consumed = vec![false; notes.len()];

    let mut lyrics: Vec<(u64, String)> = Vec::new();
    for event in &notes_track.events {
        let position = clock.to_chart(event.tick)? as f32;
        match &event.kind {
            EventKind::Lyric(text) => lyrics.push((event.tick, text.clone())),
            EventKind::Text(text) => chart
                .entries
                .push(ChartEntry::new(position, SECTION_MARKER, 0.0).with_text(text.clone())),
            EventKind::Copyright(text) => chart
                .entries
                .push(ChartEntry::new(0.0, AUTHOR_MARKER, 0.0).with_text(text.clone())),
            EventKind::Marker(marker) => {
                let (modifier, text) = marker_code(marker);
                // A lyric marker with length was written as a marker plus a
                // note keyed by its lane.
                let lane = (modifier & 0xFF) as u8;
                let held = (modifier & !0xFF == LYRIC_MARKER_BASE)
                    .then(|| {
                        notes.iter().enumerate().position(|(i, note)| {
                            !consumed[i] && note.start == event.tick && note.key == lane
                        })
                    })
                    .flatten();
                match held {
                    Some(index) => {
                        consumed[index] = true;
                        chart.entries.push(note_entry(&clock, &notes[index], modifier)?);
                    }
                    None => chart
                        .entries
                        .push(ChartEntry::new(position, modifier, 0.0).with_text(text)),
                }
            }
            _ => {}
        }
    }

    // Notes folded into lyric markers are not available to lyrics.
    let free: Vec<usize> = (0..notes.len()).filter(|&i| !consumed[i]).collect();
    let starts: Vec<u64> = free.iter().map(|&i| notes[i].start).collect();
    lyrics.sort_by_key(|&(tick, _)| tick);
    for (pair, (_, text)) in align_markers(&lyrics, &starts)?.into_iter().zip(lyrics) {
        let index = free[pair];
        modifiers[index] = LYRIC_BASE | modifiers[index];
        texts[index] = text;
    }

    for index in free {
        let text = std::mem::take(&mut texts[index]);
        let mut entry = note_entry(&clock, &notes[index], modifiers[index])?;
        if entry.has_text_payload() {
            // Lyric records store the text pointer where notes keep `data`.
            entry.data = 0;
        }
        chart.entries.push(entry.with_text(text));
    }

    if let Some(effects) = sequence.track(EFFECTS_TRACK) {
        for note in effects.notes() {
            let modifier = if note.key == 0x7F {
                FILTER_EFFECT
            } else {
                (i32::from(EFFECT_CATEGORY) << 24) | i32::from(note.key)
            };
            chart.entries.push(note_entry(&clock, &note, modifier)?);
        }
    }

    chart.sort_entries();
    debug!(
        entries = chart.entries.len(),
        bpm,
        tempo_changes = changes.len(),
        "rebuilt entry-table chart"
    );
    Ok(chart)
}

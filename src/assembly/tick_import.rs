//! Interchange track to tick-table chart.

use super::align_markers;
use crate::chart::{ChartEvent, TempoRecord, TickChart, TimeSigRecord};
use crate::classify::KIND_LYRIC;
use crate::clock::{Quantizer, RealtimeClock, DEFAULT_US_PER_QUARTER, TICKS_PER_QUARTER};
use crate::error::{ChartError, Result};
use crate::midi::{EventKind, Sequence};
use tracing::debug;

/// Velocity written for notes whose `flags` were zero.
const DEFAULT_VELOCITY: u8 = 100;

/// Tempo changes from every track, one per tick, starting at tick zero.
fn tempo_map(sequence: &Sequence) -> Vec<(u64, u32)> {
    let mut tempos: Vec<(u64, u32)> = sequence
        .events()
        .filter_map(|event| match event.kind {
            EventKind::Tempo(us) => Some((event.tick, us)),
            _ => None,
        })
        .collect();
    tempos.sort_by_key(|&(tick, _)| tick);

    // Last change at a tick wins.
    let mut map: Vec<(u64, u32)> = Vec::with_capacity(tempos.len() + 1);
    for (tick, us) in tempos {
        match map.last_mut() {
            Some(last) if last.0 == tick => last.1 = us,
            _ => map.push((tick, us)),
        }
    }
    if map.first().map_or(true, |&(tick, _)| tick != 0) {
        map.insert(0, (0, DEFAULT_US_PER_QUARTER));
    }
    map
}

/// Tick-table records count ticks at twice the interchange resolution.
fn record_ticks(tick: u64) -> Result<u32> {
    tick.checked_mul(2)
        .and_then(|doubled| u32::try_from(doubled).ok())
        .ok_or_else(|| {
            ChartError::malformed(0, format!("tick {tick} does not fit a tick-table record"))
        })
}

/// Tempo records with real-time positions integrated from tick zero.
fn tempo_records(map: &[(u64, u32)]) -> Result<Vec<TempoRecord>> {
    let mut seconds = 0.0f64;
    let mut previous: Option<(u64, u32)> = None;

    map.iter()
        .map(|&(tick, us)| -> Result<TempoRecord> {
            if let Some((prev_tick, prev_us)) = previous {
                seconds += (tick - prev_tick) as f64 * f64::from(prev_us)
                    / TICKS_PER_QUARTER as f64
                    / 1_000_000.0;
            }
            previous = Some((tick, us));
            Ok(TempoRecord::new(seconds as f32, us, record_ticks(tick)?))
        })
        .collect()
}

fn time_signatures(sequence: &Sequence) -> Result<Vec<TimeSigRecord>> {
    let mut sigs: Vec<(u64, u8, u8)> = sequence
        .events()
        .filter_map(|event| match event.kind {
            EventKind::TimeSignature {
                numerator,
                denominator_power,
            } => Some((event.tick, numerator, denominator_power)),
            _ => None,
        })
        .collect();
    sigs.sort_by_key(|&(tick, _, _)| tick);

    let mut measure = 0i32;
    let mut previous: Option<(u64, u64)> = None;
    sigs.into_iter()
        .map(|(tick, numerator, power)| -> Result<TimeSigRecord> {
            let denominator = 1i32 << power.min(30);
            if let Some((prev_tick, ticks_per_measure)) = previous {
                if ticks_per_measure > 0 {
                    measure += ((tick - prev_tick) / ticks_per_measure) as i32;
                }
            }
            let ticks_per_measure =
                TICKS_PER_QUARTER * 4 * u64::from(numerator) / denominator as u64;
            previous = Some((tick, ticks_per_measure));

            Ok(TimeSigRecord {
                ticks: record_ticks(tick)?,
                measure,
                numerator: i32::from(numerator),
                denominator,
            })
        })
        .collect()
}

/// Rebuilds a version 8 tick-table chart from one named track.
///
/// Tempo and time-signature events are gathered from every track. Notes keep
/// their velocity in `flags`, with the default velocity written back as
/// zero. Lyrics attach to the note starting at the same tick; text and
/// markers become zero-length events.
///
/// # Errors
///
/// - [`ChartError::MissingTrack`] if no track has the given name
/// - [`ChartError::MalformedChart`] if a tempo or signature tick is out of range
/// - [`ChartError::OrphanedMarker`] if a lyric has no note at its tick
pub fn sequence_to_tick_chart(sequence: &Sequence, name: &str) -> Result<TickChart> {
    let track = sequence
        .track(name)
        .ok_or_else(|| ChartError::MissingTrack(name.to_string()))?;

    let mut chart = TickChart::new(name);
    chart.tempos = tempo_records(&tempo_map(sequence))?;
    chart.time_signatures = time_signatures(sequence)?;
    let clock = RealtimeClock::new(&chart.tempos, Quantizer::disabled());

    let notes = track.notes();
    let mut events = Vec::with_capacity(notes.len());
    for note in &notes {
        let flags = if note.velocity == DEFAULT_VELOCITY {
            0
        } else {
            u16::from(note.velocity)
        };
        events.push(
            ChartEvent::new(
                note.key,
                clock.to_seconds(note.start)? as f32,
                clock.to_seconds(note.end)? as f32,
            )
            .with_flags(flags),
        );
    }

    let mut lyrics: Vec<(u64, String)> = Vec::new();
    let mut markers = Vec::new();
    for event in &track.events {
        match &event.kind {
            EventKind::Lyric(text) => lyrics.push((event.tick, text.clone())),
            EventKind::Text(text) | EventKind::Marker(text) => {
                let at = clock.to_seconds(event.tick)? as f32;
                markers.push(ChartEvent::new(0, at, at).with_text(text.clone()));
            }
            _ => {}
        }
    }

    lyrics.sort_by_key(|&(tick, _)| tick);
    let starts: Vec<u64> = notes.iter().map(|note| note.start).collect();
    for (index, (_, text)) in align_markers(&lyrics, &starts)?.into_iter().zip(lyrics) {
        let event = &mut events[index];
        event.text = Some(text);
        event.kind = KIND_LYRIC;
    }

    events.extend(markers);
    events.sort_by(|a, b| a.start.total_cmp(&b.start));
    chart.events = events;

    debug!(
        name,
        events = chart.events.len(),
        tempos = chart.tempos.len(),
        "rebuilt tick-table chart"
    );
    Ok(chart)
}

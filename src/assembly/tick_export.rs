//! Tick-table charts to interchange sequence.
//!
//! Charts from one song share the first chart's tempo map. Without remapping
//! each chart becomes a track of raw pitches. With remapping the known chart
//! names become rhythm-game authoring tracks:
//!
//! | chart         | track             |
//! |---------------|-------------------|
//! | `control`     | `EVENTS`          |
//! | `guitar_3x2`  | `PART GUITAR GHL` |
//! | `touchguitar` | `PART GUITAR`     |
//! | `touchdrums`  | `PART DRUMS`      |
//! | `vocals`      | `PART VOCALS`     |
//!
//! plus a generated `BEAT` track.

use super::TICK_TEMPO_TRACK;
use crate::chart::{ChartEvent, TickChart, TimeSigRecord};
use crate::classify::{classify_event, hopo_marker_pitch, EventClass, MidiMapping};
use crate::clock::{RealtimeClock, DEFAULT_US_PER_QUARTER, TICKS_PER_MEASURE, TICKS_PER_QUARTER};
use crate::config::ExportOptions;
use crate::error::{ChartError, Result};
use crate::midi::{EventKind, Sequence, TimedEvent, Track};
use std::collections::BTreeMap;
use tracing::{debug, info};

const REMAPPED_VELOCITY: u8 = 100;
const VOCAL_PHRASE_PITCH: u8 = 105;
const VOCAL_MIN_PITCH: u8 = 36;
/// Pitch of unpitched lyrics.
const VOCAL_FALLBACK_PITCH: u8 = 60;
/// 1/128 note.
const VOCAL_PADDING: u64 = TICKS_PER_QUARTER / 32;
const BEAT_DOWN_PITCH: u8 = 12;
const BEAT_UP_PITCH: u8 = 13;

fn chart_rank(name: &str) -> u32 {
    match name {
        "touchdrums" => 1,
        "touchguitar" => 2,
        "guitar_3x2" => 3,
        "vocals" => 4,
        "control" => 5,
        _ => 100,
    }
}

/// Start and end tick of an event.
fn span(clock: &RealtimeClock, event: &ChartEvent) -> Result<(u64, u64)> {
    Ok((clock.to_ticks(event.start)?, clock.to_ticks(event.end)?))
}

fn time_signature(record: &TimeSigRecord) -> EventKind {
    let denominator = u32::try_from(record.denominator).unwrap_or(1).max(1);
    EventKind::TimeSignature {
        numerator: record.numerator.clamp(1, 255) as u8,
        denominator_power: denominator.ilog2() as u8,
    }
}

fn tempo_track(chart: &TickChart) -> Track {
    let mut track = Track::named(TICK_TEMPO_TRACK);

    let prepended = chart.tempos.first().map_or(true, |first| first.start > 0.0);
    if prepended {
        track.push(0, EventKind::Tempo(DEFAULT_US_PER_QUARTER));
    }
    for (i, tempo) in chart.tempos.iter().enumerate() {
        let tick = if i == 0 && !prepended {
            0
        } else {
            u64::from(tempo.ticks / 2)
        };
        track.push(tick, EventKind::Tempo(tempo.us_per_quarter));
    }

    if chart.time_signatures.is_empty() {
        track.push(
            0,
            EventKind::TimeSignature {
                numerator: 4,
                denominator_power: 2,
            },
        );
    }
    for record in &chart.time_signatures {
        track.push(u64::from(record.ticks / 2), time_signature(record));
    }

    track.sort();
    track
}

/// Raw pitches, text events and velocity from `flags`.
fn generic_track(chart: &TickChart, name: &str, clock: &RealtimeClock) -> Result<Track> {
    let mut track = Track::named(name);

    for event in &chart.events {
        let (start, end) = span(clock, event)?;
        if let Some(text) = event.text() {
            track.push(start, EventKind::Text(text.to_string()));
        }
        if end <= start || event.pitch > 127 {
            continue;
        }
        let velocity = if event.flags == 0 {
            REMAPPED_VELOCITY
        } else {
            ((event.flags % 128) as u8).max(1)
        };
        track.push_note(start, end, event.pitch, velocity);
    }

    track.sort();
    Ok(track)
}

fn practice_name(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        trimmed.to_string()
    } else {
        format!("[section {text}]")
    }
}

fn events_track(chart: &TickChart, clock: &RealtimeClock) -> Result<Track> {
    let mut track = Track::named("EVENTS");
    for event in &chart.events {
        if classify_event(event) != EventClass::PracticeSection {
            continue;
        }
        if let Some(text) = event.text() {
            track.push(clock.to_ticks(event.start)?, EventKind::Text(practice_name(text)));
        }
    }
    track.sort();
    Ok(track)
}

/// Notes through a lane table. Text events are dropped.
fn lane_track(
    chart: &TickChart,
    name: &str,
    map: &MidiMapping,
    clock: &RealtimeClock,
) -> Result<Track> {
    let mut track = Track::named(name);
    for event in &chart.events {
        if event.text().is_some() {
            continue;
        }
        let (start, end) = span(clock, event)?;
        if end <= start || event.pitch > 127 {
            continue;
        }
        if let Some(pitch) = map.get(event.pitch) {
            track.push_note(start, end, pitch, REMAPPED_VELOCITY);
        }
    }
    Ok(track)
}

fn drums_track(chart: &TickChart, clock: &RealtimeClock) -> Result<Track> {
    let notes = lane_track(chart, "PART DRUMS", MidiMapping::drums(), clock)?;
    let mut track = Track::named("PART DRUMS");
    for mix in 0..4 {
        track.push(0, EventKind::Text(format!("[mix {mix} drums0]")));
    }
    track.events.extend(notes.events.into_iter().skip(1));
    Ok(track)
}

/// Six-button guitar with barre chords and forced-HOPO markers.
fn guitar_3x2_track(chart: &TickChart, clock: &RealtimeClock) -> Result<Track> {
    let map = MidiMapping::guitar_3x2();
    let mut track = Track::named("PART GUITAR GHL");
    let mut hopo: BTreeMap<u8, Vec<(u64, u64)>> = BTreeMap::new();

    for event in &chart.events {
        if event.text().is_some() {
            continue;
        }
        let (start, end) = span(clock, event)?;
        if end <= start || event.pitch > 127 {
            continue;
        }

        if event.flags & 2 != 0 {
            // Barre: odd lanes pair upward, even lanes downward.
            let neighbour = if event.pitch % 2 == 1 {
                event.pitch.checked_add(1)
            } else {
                event.pitch.checked_sub(1)
            };
            if let Some(pitch) = neighbour.and_then(|lane| map.get(lane)) {
                track.push_note(start, end, pitch, REMAPPED_VELOCITY);
            }
        }

        let Some(pitch) = map.get(event.pitch) else {
            continue;
        };
        track.push_note(start, end, pitch, REMAPPED_VELOCITY);
        if let Some(marker) = hopo_marker_pitch(pitch, event.kind) {
            hopo.entry(marker).or_default().push((start, end));
        }
    }

    for (marker, candidates) in hopo {
        // Longest candidate per start tick.
        let mut longest: BTreeMap<u64, u64> = BTreeMap::new();
        for (start, end) in candidates {
            let slot = longest.entry(start).or_insert(end);
            *slot = (*slot).max(end);
        }

        // Each marker ends no later than the next one starts.
        let markers: Vec<(u64, u64)> = longest.into_iter().collect();
        for (i, &(start, end)) in markers.iter().enumerate() {
            let off = markers
                .get(i + 1)
                .map_or(end, |&(next_start, _)| end.min(next_start));
            track.push_note(start, off, marker, REMAPPED_VELOCITY);
        }
    }

    Ok(track)
}

fn clean_lyric(text: &str) -> String {
    text.replace('=', "").replace('@', "+")
}

fn vocals_track(chart: &TickChart, clock: &RealtimeClock) -> Result<Track> {
    let mut track = Track::named("PART VOCALS");
    let mut phrases: Vec<(u64, u64)> = Vec::new();
    let mut lyric_notes: Vec<(u64, u64)> = Vec::new();

    for event in &chart.events {
        match classify_event(event) {
            EventClass::LyricText => {
                let (start, mut end) = span(clock, event)?;
                if end <= start {
                    end = start + VOCAL_PADDING;
                }
                let mut text = clean_lyric(event.text().unwrap_or_default());
                let pitch = if (VOCAL_MIN_PITCH..=127).contains(&event.pitch) {
                    event.pitch
                } else {
                    text.push('#');
                    VOCAL_FALLBACK_PITCH
                };
                // The lyric and its note come from one event, so they always
                // share a tick.
                track.push(start, EventKind::Lyric(text));
                track.push_note(start, end, pitch, REMAPPED_VELOCITY);
                lyric_notes.push((start, end));
            }
            EventClass::PhraseMarker => {
                let (start, mut end) = span(clock, event)?;
                if end <= start {
                    end = start + TICKS_PER_QUARTER / 4;
                }
                phrases.push((start, end));
            }
            _ => {}
        }
    }

    // Phrases cover the whole song, then shrink to the notes they hold.
    let content_end = track.end_tick();
    if phrases.is_empty() {
        phrases.push((0, content_end + TICKS_PER_QUARTER / 8));
    } else {
        for i in 1..phrases.len() {
            phrases[i - 1].1 = phrases[i].0;
        }
        phrases[0].0 = 0;
        if let Some(last) = phrases.last_mut() {
            last.1 = last.1.max(content_end) + TICKS_PER_QUARTER / 8;
        }
    }

    for (start, end) in phrases {
        let within = |tick: &u64| (start..=end).contains(tick);
        let first_on = lyric_notes.iter().map(|&(on, _)| on).filter(within).min();
        let last_off = lyric_notes.iter().map(|&(_, off)| off).filter(within).max();
        if let (Some(on), Some(off)) = (first_on, last_off) {
            if on <= off {
                track.push_note(
                    on.saturating_sub(VOCAL_PADDING),
                    off + VOCAL_PADDING,
                    VOCAL_PHRASE_PITCH,
                    REMAPPED_VELOCITY,
                );
            }
        }
    }

    Ok(track)
}

/// Inserts `[play]` before the earliest note event and `[idle]` before the
/// latest one, then sorts the track.
fn mark_play_range(track: &mut Track) {
    let is_note =
        |kind: &EventKind| matches!(kind, EventKind::NoteOn { .. } | EventKind::NoteOff { .. });

    let first = track
        .events
        .iter()
        .enumerate()
        .filter(|(_, event)| is_note(&event.kind))
        .min_by_key(|(_, event)| event.tick)
        .map(|(index, event)| (index, event.tick));
    if let Some((index, tick)) = first {
        track
            .events
            .insert(index, TimedEvent::new(tick, EventKind::Text("[play]".into())));
    }

    let last = track
        .events
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, event)| is_note(&event.kind))
        .max_by_key(|(_, event)| event.tick)
        .map(|(index, event)| (index, event.tick));
    if let Some((index, tick)) = last {
        track
            .events
            .insert(index, TimedEvent::new(tick, EventKind::Text("[idle]".into())));
    }

    track.sort();
}

fn text_ticks<'a>(sequence: &'a Sequence, text: &'a str) -> impl Iterator<Item = u64> + 'a {
    sequence
        .events()
        .filter(move |event| matches!(&event.kind, EventKind::Text(t) if t == text))
        .map(|event| event.tick)
}

/// Alternating downbeat and upbeat notes following the time signatures.
fn beat_track(time_signatures: &[TimeSigRecord], last_tick: u64) -> Track {
    let mut track = Track::named("BEAT");
    let default_sig = [TimeSigRecord {
        ticks: 0,
        measure: 0,
        numerator: 4,
        denominator: 4,
    }];
    let sigs = if time_signatures.is_empty() {
        &default_sig[..]
    } else {
        time_signatures
    };

    let mut offset = 0u64;
    let mut index = 0usize;
    let mut beat = 1i32;
    while offset < last_tick {
        while index + 1 < sigs.len() && offset >= u64::from(sigs[index + 1].ticks / 2) {
            index += 1;
            offset = u64::from(sigs[index].ticks / 2);
            beat = 1;
        }

        let sig = &sigs[index];
        let beat_size = u64::try_from(sig.denominator)
            .ok()
            .filter(|&den| den > 0)
            .map_or(0, |den| TICKS_PER_MEASURE / den);
        if beat_size == 0 {
            break;
        }
        if beat > sig.numerator {
            beat = 1;
        }

        let pitch = if beat == 1 { BEAT_DOWN_PITCH } else { BEAT_UP_PITCH };
        track.push_note(offset, offset + beat_size / 4, pitch, 1);

        beat += 1;
        offset += beat_size;
    }

    track.sort();
    track
}

/// Assembles tick-table charts of one song into an interchange sequence.
///
/// # Arguments
///
/// * `charts` - Charts of one song in any order; the first after ordering
///   provides the tempo and time-signature map
/// * `options` - Quantization grid and remap mode
///
/// # Errors
///
/// - [`ChartError::NoCharts`] if `charts` is empty
/// - [`ChartError::InternalClockInconsistency`] if a position can't be mapped
pub fn tick_charts_to_sequence(charts: &[TickChart], options: &ExportOptions) -> Result<Sequence> {
    let mut ordered: Vec<&TickChart> = charts.iter().collect();
    ordered.sort_by_key(|chart| chart_rank(&chart.name));
    let first = ordered.first().ok_or(ChartError::NoCharts)?;

    let clock = RealtimeClock::new(&first.tempos, options.quantizer);
    let mut sequence = Sequence::new();
    sequence.tracks.push(tempo_track(first));

    let mut events_index = None;
    for (i, chart) in ordered.iter().enumerate() {
        let name = if chart.name.is_empty() {
            format!("NOTES {i}")
        } else {
            chart.name.clone()
        };

        if !options.remap {
            sequence.tracks.push(generic_track(chart, &name, &clock)?);
            continue;
        }

        let mut track = match name.to_lowercase().as_str() {
            "control" => {
                events_index = Some(sequence.tracks.len());
                sequence.tracks.push(events_track(chart, &clock)?);
                continue;
            }
            "guitar_3x2" => guitar_3x2_track(chart, &clock)?,
            "touchguitar" => lane_track(chart, "PART GUITAR", MidiMapping::guitar_touch(), &clock)?,
            "touchdrums" => drums_track(chart, &clock)?,
            "vocals" => vocals_track(chart, &clock)?,
            _ => {
                sequence.tracks.push(generic_track(chart, &name, &clock)?);
                continue;
            }
        };
        mark_play_range(&mut track);
        sequence.tracks.push(track);
    }

    if options.remap {
        let first_play = text_ticks(&sequence, "[play]").min();
        let last_idle = text_ticks(&sequence, "[idle]").max();
        if let Some(events) = events_index.and_then(|index| sequence.tracks.get_mut(index)) {
            if let Some(tick) = first_play {
                events.push(tick, EventKind::Text("[music_start]".into()));
            }
            if let Some(tick) = last_idle {
                events.push(tick, EventKind::Text("[music_end]".into()));
                events.push(tick, EventKind::Text("[end]".into()));
            }
            events.sort();
        }

        let beat = beat_track(&first.time_signatures, sequence.end_tick());
        sequence.tracks.push(beat);
    }

    info!(
        charts = charts.len(),
        tracks = sequence.tracks.len(),
        remap = options.remap,
        quantization = %options.quantizer,
        "assembled tick-table charts"
    );
    debug!(end_tick = sequence.end_tick(), "sequence extent");
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::TempoRecord;
    use crate::midi::Note;

    fn chart(name: &str, events: Vec<ChartEvent>) -> TickChart {
        let mut chart = TickChart::new(name);
        chart.tempos = vec![TempoRecord::new(0.0, 500_000, 0)];
        chart.events = events;
        chart
    }

    fn remap() -> ExportOptions {
        ExportOptions {
            remap: true,
            ..ExportOptions::default()
        }
    }

    fn texts(track: &Track) -> Vec<(u64, &str)> {
        track
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Text(text) => Some((e.tick, text.as_str())),
                _ => None,
            })
            .collect()
    }

    fn notes_on(track: &Track, key: u8) -> Vec<(u64, u64)> {
        track
            .notes()
            .into_iter()
            .filter(|n: &Note| n.key == key)
            .map(|n| (n.start, n.end))
            .collect()
    }

    #[test]
    fn test_no_charts() {
        assert!(matches!(
            tick_charts_to_sequence(&[], &ExportOptions::default()),
            Err(ChartError::NoCharts)
        ));
    }

    #[test]
    fn test_generic_track() {
        let charts = [chart(
            "lead",
            vec![
                ChartEvent::new(60, 0.0, 0.5),
                ChartEvent::new(61, 0.5, 1.0).with_flags(200),
                ChartEvent::new(0, 1.0, 1.0).with_text("hello"),
                ChartEvent::new(200, 1.0, 2.0),
            ],
        )];
        let seq = tick_charts_to_sequence(&charts, &ExportOptions::default()).unwrap();

        assert_eq!(seq.tracks.len(), 2);
        assert_eq!(seq.tracks[0].name(), Some("xmkTempo"));
        let track = seq.track("lead").unwrap();
        let notes = track.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].start, notes[0].end, notes[0].velocity), (0, 480, 100));
        assert_eq!((notes[1].start, notes[1].end, notes[1].velocity), (480, 960, 72));
        assert_eq!(texts(track), vec![(960, "hello")]);
    }

    #[test]
    fn test_chart_order_and_fallback_name() {
        let charts = [
            chart("vocals", vec![]),
            chart("", vec![]),
            chart("control", vec![]),
            chart("touchdrums", vec![]),
        ];
        let seq = tick_charts_to_sequence(&charts, &ExportOptions::default()).unwrap();
        let names: Vec<Option<&str>> = seq.tracks.iter().map(Track::name).collect();
        assert_eq!(
            names,
            vec![
                Some("xmkTempo"),
                Some("touchdrums"),
                Some("vocals"),
                Some("control"),
                Some("NOTES 3"),
            ]
        );
    }

    #[test]
    fn test_tempo_track_defaults() {
        let mut late = chart("x", vec![]);
        late.tempos = vec![TempoRecord::new(1.0, 400_000, 1920)];
        let track = tempo_track(&late);
        let kinds: Vec<(u64, &EventKind)> =
            track.events.iter().map(|e| (e.tick, &e.kind)).collect();
        assert!(kinds.contains(&(0, &EventKind::Tempo(500_000))));
        assert!(kinds.contains(&(960, &EventKind::Tempo(400_000))));
        assert!(kinds.contains(&(
            0,
            &EventKind::TimeSignature {
                numerator: 4,
                denominator_power: 2
            }
        )));
    }

    #[test]
    fn test_guitar_barre_and_hopo() {
        let charts = [chart(
            "guitar_3x2",
            vec![
                ChartEvent::new(60, 0.0, 1.0).with_flags(2),
                ChartEvent::new(62, 0.5, 1.0),
                ChartEvent::new(59, 1.5, 2.0).with_text("ignored"),
            ],
        )];
        let seq = tick_charts_to_sequence(&charts, &remap()).unwrap();
        let track = seq.track("PART GUITAR GHL").unwrap();

        // Lane 60 is W1 (95), its barre neighbour 59 is B1 (98).
        assert_eq!(notes_on(track, 95), vec![(0, 960)]);
        assert_eq!(notes_on(track, 98), vec![(0, 960)]);
        assert_eq!(notes_on(track, 96), vec![(480, 960)]);
        // Overlapping HOPO markers are re-nested.
        assert_eq!(notes_on(track, 102), vec![(0, 480), (480, 960)]);

        assert_eq!(texts(track), vec![(0, "[play]"), (960, "[idle]")]);
        assert_eq!(seq.tracks.last().and_then(Track::name), Some("BEAT"));
    }

    #[test]
    fn test_drums_mix_events() {
        let charts = [chart("touchdrums", vec![ChartEvent::new(50, 0.0, 0.5)])];
        let seq = tick_charts_to_sequence(&charts, &remap()).unwrap();
        let track = seq.track("PART DRUMS").unwrap();
        let mix_events = track
            .events
            .iter()
            .filter(|e| e.kind.text().map_or(false, |t| t.starts_with("[mix")))
            .count();
        assert_eq!(mix_events, 4);
        assert_eq!(notes_on(track, 96), vec![(0, 480)]);
    }

    #[test]
    fn test_vocals() {
        let charts = [chart(
            "vocals",
            vec![
                ChartEvent::new(60, 0.5, 1.0).with_text("he=").with_kind(57),
                ChartEvent::new(20, 1.0, 1.5).with_text("@lo").with_kind(57),
                ChartEvent::new(129, 0.5, 0.5).with_kind(1),
            ],
        )];
        let seq = tick_charts_to_sequence(&charts, &remap()).unwrap();
        let track = seq.track("PART VOCALS").unwrap();

        let lyrics: Vec<(u64, &str)> = track
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Lyric(text) => Some((e.tick, text.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(lyrics, vec![(480, "he"), (960, "+lo#")]);
        assert_eq!(notes_on(track, 60), vec![(480, 960), (960, 1440)]);
        assert_eq!(notes_on(track, 105), vec![(465, 1455)]);
    }

    #[test]
    fn test_events_track() {
        let charts = [
            chart(
                "control",
                vec![
                    ChartEvent::new(0, 0.0, 0.0).with_text("intro").with_kind(3),
                    ChartEvent::new(0, 1.0, 1.0).with_text("[coda]").with_kind(3),
                    ChartEvent::new(0, 1.0, 1.0).with_text("other"),
                ],
            ),
            chart("touchguitar", vec![ChartEvent::new(50, 0.5, 1.0)]),
        ];
        let seq = tick_charts_to_sequence(&charts, &remap()).unwrap();
        let events = seq.track("EVENTS").unwrap();
        assert_eq!(
            texts(events),
            vec![
                (0, "[section intro]"),
                (480, "[music_start]"),
                (960, "[coda]"),
                (960, "[music_end]"),
                (960, "[end]"),
            ]
        );
    }

    #[test]
    fn test_beat_track() {
        let sigs = [TimeSigRecord {
            ticks: 0,
            measure: 0,
            numerator: 3,
            denominator: 4,
        }];
        let track = beat_track(&sigs, 1920);
        let beats: Vec<(u64, u8)> = track.notes().iter().map(|n| (n.start, n.key)).collect();
        assert_eq!(beats, vec![(0, 12), (480, 13), (960, 13), (1440, 12)]);

        let sigs = [
            TimeSigRecord {
                ticks: 0,
                measure: 0,
                numerator: 4,
                denominator: 4,
            },
            TimeSigRecord {
                ticks: 1920,
                measure: 0,
                numerator: 6,
                denominator: 8,
            },
        ];
        let track = beat_track(&sigs, 1920);
        let beats: Vec<(u64, u8)> = track.notes().iter().map(|n| (n.start, n.key)).collect();
        assert_eq!(
            beats,
            vec![(0, 12), (480, 13), (960, 12), (1200, 13), (1440, 13), (1680, 13)]
        );
        assert_eq!(track.notes()[0].end, 120);
    }
}

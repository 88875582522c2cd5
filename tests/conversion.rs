//! End-to-end conversions through the public API.

use chartconv::chart::{ChartEntry, ChartEvent, TempoRecord, TimeSigRecord};
use chartconv::midi::EventKind;
use chartconv::{
    convert_tick_source, entry_chart_to_midi, midi_to_entry_chart, read_smf, ChartError,
    ConvertConfig, DecodeOptions, DirectorySource, EncodeOptions, EntryChart, ChartFormat,
    Sequence, TickChart,
};
use std::collections::HashMap;
use std::fs;

/// Every note-on is closed by exactly one later note-off on the same track,
/// and no note-off arrives before its note-on.
fn assert_pairs_complete(sequence: &Sequence) {
    for track in &sequence.tracks {
        let mut open: HashMap<(u8, u8), u32> = HashMap::new();
        for event in &track.events {
            match event.kind {
                EventKind::NoteOn { channel, key, .. } => {
                    *open.entry((channel, key)).or_default() += 1;
                }
                EventKind::NoteOff { channel, key, .. } => {
                    let count = open.entry((channel, key)).or_default();
                    assert!(
                        *count > 0,
                        "note-off for key {key} at tick {} has no note-on on track {:?}",
                        event.tick,
                        track.name()
                    );
                    *count -= 1;
                }
                _ => {}
            }
        }
        assert!(
            open.values().all(|&count| count == 0),
            "unpaired notes on track {:?}",
            track.name()
        );
    }
}

fn tick_chart(events: Vec<ChartEvent>) -> TickChart {
    let mut chart = TickChart::new("");
    chart.tempos = vec![TempoRecord::new(0.0, 500_000, 0)];
    chart.time_signatures = vec![TimeSigRecord {
        ticks: 0,
        measure: 0,
        numerator: 4,
        denominator: 4,
    }];
    chart.events = events;
    chart
}

#[test]
fn test_entry_chart_to_midi_and_back() {
    let mut chart = EntryChart::new(2);
    chart.entries = vec![
        ChartEntry::new(0.0, -1, 0.0),
        ChartEntry::new(0.0, 0x0B00_0002, 0.0).with_data(120.0f32.to_bits() as i32),
        ChartEntry::new(0.0, 0x0AFF_FFFF, 0.0).with_text("charter"),
        ChartEntry::new(0.0, 0x3C, 0.125).with_data(99),
        ChartEntry::new(0.25, 0x3E, 0.125).with_data(99),
        ChartEntry::new(0.5, 0x40, 0.125).with_data(99),
        ChartEntry::new(0.5, 0x09FF_FFFF, 0.0).with_text("verse"),
    ];
    chart.sort_entries();
    let bytes = chart.encode(&EncodeOptions::default()).unwrap();

    let midi = entry_chart_to_midi(&bytes, &DecodeOptions::default()).unwrap();
    let sequence = read_smf(&midi).unwrap();
    assert_pairs_complete(&sequence);

    let notes = sequence.track("NOTES").unwrap().notes();
    let ticks: Vec<(u64, u64)> = notes.iter().map(|n| (n.start, n.end)).collect();
    assert_eq!(ticks, vec![(0, 240), (480, 720), (960, 1200)]);

    let back = midi_to_entry_chart(&midi, &EncodeOptions::default()).unwrap();
    let rebuilt = EntryChart::decode(&back, &DecodeOptions::default()).unwrap();
    assert_eq!(rebuilt.entries, chart.entries);
}

#[test]
fn test_sub_tick_note_not_emitted() {
    let mut chart = EntryChart::new(2);
    chart.entries = vec![
        ChartEntry::new(0.0, 0x0B00_0002, 0.0).with_data(120.0f32.to_bits() as i32),
        ChartEntry::new(0.0, 0x3C, 0.0001),
        ChartEntry::new(1.0, 0x3E, 0.25),
    ];
    chart.sort_entries();
    let bytes = chart.encode(&EncodeOptions::default()).unwrap();

    let midi = entry_chart_to_midi(&bytes, &DecodeOptions::default()).unwrap();
    let sequence = read_smf(&midi).unwrap();
    assert_pairs_complete(&sequence);

    let notes = sequence.track("NOTES").unwrap().notes();
    let ticks: Vec<(u64, u64, u8)> = notes.iter().map(|n| (n.start, n.end, n.key)).collect();
    assert_eq!(ticks, vec![(1920, 2400, 0x3E)]);
}

#[test]
fn test_lyric_sharing_tick_with_lyric_marker() {
    let mut chart = EntryChart::new(2);
    chart.entries = vec![
        ChartEntry::new(0.0, -1, 0.0),
        ChartEntry::new(0.0, 0x0B00_0002, 0.0).with_data(120.0f32.to_bits() as i32),
        ChartEntry::new(2.0, 0x1101, 0.5),
        ChartEntry::new(2.0, 0x1040, 0.25).with_text("la"),
    ];
    chart.sort_entries();
    let bytes = chart.encode(&EncodeOptions::default()).unwrap();

    let midi = entry_chart_to_midi(&bytes, &DecodeOptions::default()).unwrap();
    assert_pairs_complete(&read_smf(&midi).unwrap());

    let back = midi_to_entry_chart(&midi, &EncodeOptions::default()).unwrap();
    let rebuilt = EntryChart::decode(&back, &DecodeOptions::default()).unwrap();
    assert_eq!(rebuilt.entries, chart.entries);
}

#[test]
fn test_tick_archive_directory() {
    let root = std::env::temp_dir().join(format!("chartconv-archive-{}", std::process::id()));
    let songs = root.join("songs").join("demo");
    fs::create_dir_all(&songs).unwrap();

    let guitar = tick_chart(vec![
        ChartEvent::new(59, 1.0, 1.5),
        ChartEvent::new(60, 1.5, 2.0).with_flags(2),
        ChartEvent::new(61, 2.0, 2.0),
    ]);
    let control = tick_chart(vec![ChartEvent::new(0, 1.0, 1.0)
        .with_text("intro")
        .with_kind(3)]);
    let vocals = tick_chart(vec![
        ChartEvent::new(60, 1.0, 1.5).with_text("hel").with_kind(57),
        ChartEvent::new(62, 1.5, 2.0).with_text("lo").with_kind(57),
        ChartEvent::new(129, 1.0, 2.0).with_kind(1),
    ]);

    let encode = EncodeOptions::default();
    fs::write(songs.join("guitar_3x2.xmk"), guitar.encode(&encode).unwrap()).unwrap();
    fs::write(songs.join("control.xmk"), control.encode(&encode).unwrap()).unwrap();
    fs::write(songs.join("vocals.xmk"), vocals.encode(&encode).unwrap()).unwrap();
    fs::write(songs.join("broken.xmk"), [0u8, 0, 0, 8]).unwrap();

    let config = ConvertConfig::from_json(r#"{ "remap": true }"#).unwrap();
    let result = convert_tick_source(
        &DirectorySource::new(&root),
        &config.decode_options(ChartFormat::TickTable),
        &config.export_options().unwrap(),
    )
    .unwrap();
    fs::remove_dir_all(&root).unwrap();

    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.converted.len(), 3);

    let sequence = read_smf(&result.midi).unwrap();
    assert_pairs_complete(&sequence);
    let names: Vec<&str> = sequence.tracks.iter().filter_map(|t| t.name()).collect();
    assert_eq!(
        names,
        vec!["xmkTempo", "PART GUITAR GHL", "PART VOCALS", "EVENTS", "BEAT"]
    );

    let events: Vec<(u64, &str)> = sequence
        .track("EVENTS")
        .unwrap()
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Text(text) => Some((e.tick, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        events,
        vec![
            // Vocal phrases are padded around their notes.
            (945, "[music_start]"),
            (960, "[section intro]"),
            (1935, "[music_end]"),
            (1935, "[end]"),
        ]
    );
}

#[test]
fn test_unknown_version_rejected() {
    let mut chart = TickChart::new("x");
    chart.version = 3;
    assert!(matches!(
        chart.encode(&EncodeOptions::default()),
        Err(ChartError::UnsupportedFormatVersion { .. })
    ));
}

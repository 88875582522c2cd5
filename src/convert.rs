//! Byte-level conversions between chart binaries and Standard MIDI Files.
//!
//! Each function decodes its input, runs the matching assembly step and
//! encodes the result. Nothing here touches the filesystem except through a
//! [`ChartSource`].

use crate::assembly::{
    entry_chart_to_sequence, sequence_to_entry_chart, sequence_to_tick_chart,
    tick_charts_to_sequence,
};
use crate::chart::{DecodeOptions, EncodeOptions, EntryChart, TickChart};
use crate::config::ExportOptions;
use crate::error::{ChartError, Result};
use crate::midi::{read_smf, write_smf};
use crate::source::{load_tick_charts, ChartSource};
use std::path::PathBuf;
use tracing::info;

/// Entry-table chart bytes to SMF bytes.
pub fn entry_chart_to_midi(bytes: &[u8], options: &DecodeOptions) -> Result<Vec<u8>> {
    let chart = EntryChart::decode(bytes, options)?;
    Ok(write_smf(&entry_chart_to_sequence(&chart)?))
}

/// SMF bytes to entry-table chart bytes.
pub fn midi_to_entry_chart(midi: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
    let chart = sequence_to_entry_chart(&read_smf(midi)?)?;
    chart.encode(options)
}

/// Decoded tick-table charts of one song to SMF bytes.
pub fn tick_charts_to_midi(charts: &[TickChart], options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(write_smf(&tick_charts_to_sequence(charts, options)?))
}

/// One named SMF track to tick-table chart bytes.
pub fn midi_to_tick_chart(midi: &[u8], track: &str, options: &EncodeOptions) -> Result<Vec<u8>> {
    let chart = sequence_to_tick_chart(&read_smf(midi)?, track)?;
    chart.encode(options)
}

/// Result of converting every tick-table chart of a source.
#[derive(Debug)]
pub struct TickConversion {
    pub midi: Vec<u8>,
    /// Names of the charts that made it into the output.
    pub converted: Vec<String>,
    /// Charts that failed to load, with their error.
    pub failed: Vec<(PathBuf, ChartError)>,
}

/// Loads every tick-table chart of a source and assembles the ones that
/// decode into one SMF file.
///
/// # Errors
///
/// - [`ChartError::NoCharts`] if no chart loads
/// - any assembly error for the charts that did load
pub fn convert_tick_source(
    source: &dyn ChartSource,
    decode: &DecodeOptions,
    export: &ExportOptions,
) -> Result<TickConversion> {
    let mut charts = Vec::new();
    let mut failed = Vec::new();
    for (path, result) in load_tick_charts(source, decode)? {
        match result {
            Ok(chart) => charts.push(chart),
            Err(e) => failed.push((path, e)),
        }
    }
    if charts.is_empty() {
        return Err(ChartError::NoCharts);
    }

    let midi = tick_charts_to_midi(&charts, export)?;
    let converted: Vec<String> = charts.into_iter().map(|chart| chart.name).collect();
    info!(
        converted = converted.len(),
        failed = failed.len(),
        bytes = midi.len(),
        "converted tick-table source"
    );
    Ok(TickConversion {
        midi,
        converted,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartEntry, ChartEvent, TempoRecord};
    use crate::classify::TEMPO_DECLARATION;
    use crate::source::FileListSource;

    #[test]
    fn test_entry_chart_round_trip() {
        let mut chart = EntryChart::new(2);
        chart.entries = vec![
            ChartEntry::new(0.0, -1, 0.0),
            ChartEntry::new(0.0, TEMPO_DECLARATION, 0.0).with_data(150.0f32.to_bits() as i32),
            ChartEntry::new(0.5, 0x30, 0.25).with_data(63),
        ];
        chart.sort_entries();
        let bytes = chart.encode(&EncodeOptions::default()).unwrap();

        let midi = entry_chart_to_midi(&bytes, &DecodeOptions::default()).unwrap();
        let back = midi_to_entry_chart(&midi, &EncodeOptions::default()).unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_tick_chart_round_trip() {
        let mut chart = TickChart::new("lead");
        chart.tempos = vec![TempoRecord::new(0.0, 500_000, 0)];
        chart.events = vec![ChartEvent::new(60, 0.0, 0.5)];

        let midi = tick_charts_to_midi(std::slice::from_ref(&chart), &ExportOptions::default())
            .unwrap();
        let bytes = midi_to_tick_chart(&midi, "lead", &EncodeOptions::default()).unwrap();
        let back = TickChart::decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(back.events, chart.events);
    }

    #[test]
    fn test_source_with_no_charts() {
        let source = FileListSource::new([PathBuf::from("song.mid")]);
        assert!(matches!(
            convert_tick_source(&source, &DecodeOptions::default(), &ExportOptions::default()),
            Err(ChartError::NoCharts)
        ));
    }
}

//! Version table mapping a declared format version to its record layout.
//!
//! Decoders look the version up before touching any record and reject
//! versions that are not listed here instead of guessing a layout.

use super::ChartFormat;
use crate::error::{ChartError, Result};

/// Field order of a tick-table tempo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoOrder {
    /// `start:f32, us_per_quarter:u32, ticks:u32, reserved:u32`
    StartFirst,
    /// `ticks:u32, start:f32, us_per_quarter:u32`
    TicksFirst,
}

/// Byte layout of one format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub format: ChartFormat,
    pub version: i32,
    /// Fixed header size in bytes.
    pub header_size: usize,
    /// Size of one entry/event record.
    pub record_size: usize,
    /// Size of one tempo record (tick-table only).
    pub tempo_size: usize,
    /// Size of one time-signature record (tick-table only).
    pub time_sig_size: usize,
    /// Trailing reserved `u32` in the header (older tick-table versions).
    pub header_tail: bool,
    /// Event records carry the two reserved words (tick-table only).
    pub wide_events: bool,
    pub tempo_order: TempoOrder,
}

const ENTRY_TABLE_LAYOUTS: [RecordLayout; 2] = [
    RecordLayout {
        format: ChartFormat::EntryTable,
        version: 1,
        header_size: 16,
        record_size: 16,
        tempo_size: 0,
        time_sig_size: 0,
        header_tail: false,
        wide_events: false,
        tempo_order: TempoOrder::StartFirst,
    },
    RecordLayout {
        format: ChartFormat::EntryTable,
        version: 2,
        header_size: 16,
        record_size: 16,
        tempo_size: 0,
        time_sig_size: 0,
        header_tail: false,
        wide_events: false,
        tempo_order: TempoOrder::StartFirst,
    },
];

const TICK_TABLE_LAYOUTS: [RecordLayout; 2] = [
    RecordLayout {
        format: ChartFormat::TickTable,
        version: 5,
        header_size: 32,
        record_size: 16,
        tempo_size: 16,
        time_sig_size: 16,
        header_tail: true,
        wide_events: false,
        tempo_order: TempoOrder::StartFirst,
    },
    RecordLayout {
        format: ChartFormat::TickTable,
        version: 8,
        header_size: 28,
        record_size: 24,
        tempo_size: 12,
        time_sig_size: 16,
        header_tail: false,
        wide_events: true,
        tempo_order: TempoOrder::TicksFirst,
    },
];

impl RecordLayout {
    /// Looks up the layout for a declared version.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnsupportedFormatVersion`] for unlisted versions.
    pub fn lookup(format: ChartFormat, version: i32) -> Result<&'static RecordLayout> {
        let table: &'static [RecordLayout] = match format {
            ChartFormat::EntryTable => &ENTRY_TABLE_LAYOUTS,
            ChartFormat::TickTable => &TICK_TABLE_LAYOUTS,
        };
        table
            .iter()
            .find(|layout| layout.version == version)
            .ok_or(ChartError::UnsupportedFormatVersion { format, version })
    }

    /// Versions known for a format, oldest first.
    pub fn versions(format: ChartFormat) -> Vec<i32> {
        let table: &[RecordLayout] = match format {
            ChartFormat::EntryTable => &ENTRY_TABLE_LAYOUTS,
            ChartFormat::TickTable => &TICK_TABLE_LAYOUTS,
        };
        table.iter().map(|layout| layout.version).collect()
    }
}

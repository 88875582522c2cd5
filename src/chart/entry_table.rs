//! Entry-table chart (`.fsgmub`) model and codec.
//!
//! # Layout
//! ```text
//! 0x00: version     i32
//! 0x04: hash        i32   (stored, never recomputed)
//! 0x08: entry_count i32
//! 0x0C: blob_size   i32
//! 0x10: entries     entry_count * record_size
//!       string pool blob_size bytes, null-terminated UTF-8
//! ```
//!
//! Records are 16 bytes in both versions: `start f32, modifier i32,
//! length f32, payload i32`. The payload is a text pointer for modifiers that
//! carry text (the `..FFFFFF` marker family and lyric text) and the `data`
//! word for everything else. Text pointers count from the start of the entry
//! table.

use super::layout::RecordLayout;
use super::{ensure_fits, header_count, ChartFormat, DecodeOptions, EncodeOptions};
use crate::codec::{ByteReader, ByteWriter, PoolIndex, StringPoolBuilder};
use crate::error::{ChartError, Result};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, warn};

/// A single timed entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartEntry {
    /// Position in measures, 0-indexed.
    pub start: f32,
    /// Packed code: high byte is the category, low byte the lane.
    pub modifier: i32,
    /// Duration in measures.
    pub length: f32,
    /// Auxiliary value: BPM bit pattern, microseconds per quarter, or velocity - 1.
    pub data: i32,
    /// Attached text, empty when the entry has none.
    pub text: String,
}

impl ChartEntry {
    pub fn new(start: f32, modifier: i32, length: f32) -> Self {
        Self {
            start,
            modifier,
            length,
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: i32) -> Self {
        self.data = data;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// High byte of the modifier.
    pub const fn category(&self) -> u8 {
        ((self.modifier as u32) >> 24) as u8
    }

    /// Low byte of the modifier.
    pub const fn lane(&self) -> u8 {
        (self.modifier & 0xFF) as u8
    }

    /// Whether the record payload is a text pointer rather than `data`.
    pub const fn has_text_payload(&self) -> bool {
        payload_is_text(self.modifier)
    }
}

/// Modifiers whose payload word points into the string pool: the
/// `..FFFFFF` marker family and lyric text (`0x000010xx`).
pub const fn payload_is_text(modifier: i32) -> bool {
    modifier & 0x00FF_FFFF == 0x00FF_FFFF || modifier & !0xFF == 0x1000
}

impl fmt::Display for ChartEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}, 0x{:08X}, {:.3}, 0x{:08X}, \"{}\"",
            self.start, self.modifier, self.length, self.data, self.text
        )
    }
}

/// Canonical entry order: start ascending, then category descending, then lane ascending.
///
/// Markers and tempo entries therefore precede notes at the same position.
pub fn canonical_order(a: &ChartEntry, b: &ChartEntry) -> Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| b.category().cmp(&a.category()))
        .then_with(|| a.lane().cmp(&b.lane()))
}

/// Decoded entry-table chart.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryChart {
    pub version: i32,
    pub hash: i32,
    /// Entries in canonical order.
    pub entries: Vec<ChartEntry>,
}

impl Default for EntryChart {
    fn default() -> Self {
        Self::new(1)
    }
}

impl EntryChart {
    /// Creates an empty chart of the given version.
    pub fn new(version: i32) -> Self {
        Self {
            version,
            hash: 0,
            entries: Vec::new(),
        }
    }

    /// Sorts entries into canonical order (stable).
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(canonical_order);
    }

    /// Decodes a chart from bytes.
    ///
    /// The string pool is read first so text pointers resolve during a single
    /// forward pass over the entries.
    ///
    /// # Errors
    ///
    /// - [`ChartError::UnsupportedFormatVersion`] for unknown versions
    /// - [`ChartError::MalformedChart`] if the counts do not fit the buffer
    /// - [`ChartError::UnresolvedStringOffset`] for dangling text in strict mode
    pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, options.endian_for(ChartFormat::EntryTable));

        let version = reader.read_i32()?;
        let layout = RecordLayout::lookup(ChartFormat::EntryTable, version)?;
        let hash = reader.read_i32()?;

        let count_offset = reader.position();
        let entry_count = header_count(reader.read_i32()?, count_offset, "entry count")?;
        let blob_size = header_count(reader.read_i32()?, count_offset + 4, "string pool size")?;

        let table_start = reader.position();
        let table_bytes = entry_count
            .checked_mul(layout.record_size)
            .ok_or_else(|| ChartError::malformed(count_offset, "entry table size overflows"))?;
        ensure_fits(
            table_bytes.saturating_add(blob_size),
            reader.remaining(),
            table_start,
        )?;

        // Pool first, then back to the entries.
        reader.seek(table_start + table_bytes as u64)?;
        let pool = PoolIndex::parse(reader.read_exact(blob_size)?);
        reader.seek(table_start)?;

        let mut entries = Vec::with_capacity(entry_count);
        for index in 0..entry_count {
            let start = reader.read_f32()?;
            let modifier = reader.read_i32()?;
            let length = reader.read_f32()?;
            let payload = reader.read_i32()?;

            let (data, text) = if payload_is_text(modifier) {
                let text = pool
                    .resolve(payload, table_bytes as u32, index, options.mode)?
                    .unwrap_or_default();
                (0, text)
            } else {
                (payload, String::new())
            };

            entries.push(ChartEntry {
                start,
                modifier,
                length,
                data,
                text,
            });
        }

        debug!(version, entries = entries.len(), strings = pool.len(), "decoded entry-table chart");

        let mut chart = Self {
            version,
            hash,
            entries,
        };
        chart.sort_entries();
        Ok(chart)
    }

    /// Encodes the chart to bytes.
    ///
    /// Counts and sizes are recomputed from the entries. The stored hash is
    /// written back unchanged. Output is zero-padded to a 4-byte boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnsupportedFormatVersion`] if `version` is unknown.
    pub fn encode(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let layout = RecordLayout::lookup(ChartFormat::EntryTable, self.version)?;
        let endian = options.endian_for(ChartFormat::EntryTable);

        let mut ordered: Vec<&ChartEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| canonical_order(a, b));

        let entry_count = i32::try_from(ordered.len())
            .map_err(|_| ChartError::malformed(8, "too many entries to encode"))?;
        let table_bytes = (ordered.len() * layout.record_size) as u32;

        let mut pool = StringPoolBuilder::new();
        let mut table = ByteWriter::new(endian);
        for entry in ordered {
            table.write_f32(entry.start);
            table.write_i32(entry.modifier);
            table.write_f32(entry.length);
            if entry.has_text_payload() {
                table.write_i32(pool.pointer(&entry.text, table_bytes));
            } else {
                if !entry.text.is_empty() {
                    warn!(
                        modifier = entry.modifier,
                        text = %entry.text,
                        "entry has no text field, dropping text"
                    );
                }
                table.write_i32(entry.data);
            }
        }
        let blob = pool.finish();

        let mut out = ByteWriter::new(endian);
        out.write_i32(self.version);
        out.write_i32(self.hash);
        out.write_i32(entry_count);
        out.write_i32(blob.len() as i32);
        out.append(&table);
        out.write_bytes(&blob);
        out.pad_to(4);

        debug!(version = self.version, bytes = out.len(), "encoded entry-table chart");
        Ok(out.into_bytes())
    }
}

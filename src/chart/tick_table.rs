//! Tick-table chart (`.xmk`) model and codec.
//!
//! # Layout (version 8)
//! ```text
//! 0x00: version      i32
//! 0x04: hash         i32   (stored, never recomputed)
//! 0x08: event_count  i32
//! 0x0C: blob_size    i32
//! 0x10: reserved     u32
//! 0x14: tempo_count  i32
//! 0x18: ts_count     i32
//! 0x1C: tempos       tempo_count * 12   (ticks u32, start f32, us u32)
//!       time sigs    ts_count * 16      (ticks u32, measure i32, num i32, den i32)
//!       events       event_count * 24
//!       string pool  blob_size bytes
//! ```
//!
//! Version 5 carries a trailing reserved word in the header, 16-byte tempo
//! records in `start, us, ticks, reserved` order and 16-byte events without
//! the reserved words. Text pointers count from the start of the event table.
//! All tick fields are stored at double resolution (960 per quarter).

use super::layout::{RecordLayout, TempoOrder};
use super::{ensure_fits, header_count, ChartFormat, DecodeOptions, EncodeOptions};
use crate::codec::{ByteReader, ByteWriter, DecodeMode, PoolIndex, StringPoolBuilder};
use crate::error::{ChartError, Result};
use std::fmt;
use tracing::{debug, warn};

/// One tempo-map record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TempoRecord {
    /// Position in seconds.
    pub start: f32,
    pub us_per_quarter: u32,
    /// Position in double-resolution ticks.
    pub ticks: u32,
    /// Trailing word of legacy records.
    pub reserved: u32,
}

impl TempoRecord {
    pub fn new(start: f32, us_per_quarter: u32, ticks: u32) -> Self {
        Self {
            start,
            us_per_quarter,
            ticks,
            reserved: 0,
        }
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.us_per_quarter.max(1))
    }
}

/// One time-signature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSigRecord {
    /// Position in double-resolution ticks.
    pub ticks: u32,
    pub measure: i32,
    pub numerator: i32,
    pub denominator: i32,
}

/// One timed event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartEvent {
    pub pitch: u8,
    /// Start in seconds.
    pub start: f32,
    /// End in seconds. Equal to `start` for markers.
    pub end: f32,
    pub text: Option<String>,
    /// Velocity and chord-shape bits.
    pub flags: u16,
    /// Event kind: HOPO bit 0x80, phrase 1, practice section 3, lyric 57.
    pub kind: u8,
    /// Reserved words of wide records.
    pub reserved: [u32; 2],
}

impl ChartEvent {
    pub fn new(pitch: u8, start: f32, end: f32) -> Self {
        Self {
            pitch,
            start,
            end,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_kind(mut self, kind: u8) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Text if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

impl fmt::Display for ChartEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}s, {:.3}s, {}, \"{}\", [{} {}]",
            self.start,
            self.end,
            self.pitch,
            self.text.as_deref().unwrap_or_default(),
            self.flags,
            self.kind
        )
    }
}

/// Decoded tick-table chart.
#[derive(Debug, Clone, PartialEq)]
pub struct TickChart {
    /// Chart name, taken from the file stem. Not stored in the binary.
    pub name: String,
    pub version: i32,
    pub hash: i32,
    pub header_reserved: u32,
    /// Trailing header word of legacy versions.
    pub header_tail: u32,
    pub tempos: Vec<TempoRecord>,
    pub time_signatures: Vec<TimeSigRecord>,
    pub events: Vec<ChartEvent>,
}

impl Default for TickChart {
    fn default() -> Self {
        Self::new("")
    }
}

impl TickChart {
    /// Creates an empty version 8 chart.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 8,
            hash: 0,
            header_reserved: 0,
            header_tail: 0,
            tempos: Vec::new(),
            time_signatures: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Decodes a chart from bytes.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Complete file contents
    /// * `options` - Strictness and byte order
    ///
    /// # Returns
    ///
    /// The chart with an empty name; see [`TickChart::with_name`].
    ///
    /// # Errors
    ///
    /// - [`ChartError::UnsupportedFormatVersion`] for unknown versions
    /// - [`ChartError::MalformedChart`] if counts do not fit the buffer, or in
    ///   strict mode if an event ends before it starts or tempo positions do
    ///   not strictly increase
    /// - [`ChartError::UnresolvedStringOffset`] for dangling text in strict mode
    pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, options.endian_for(ChartFormat::TickTable));

        let version = reader.read_i32()?;
        let layout = RecordLayout::lookup(ChartFormat::TickTable, version)?;
        let hash = reader.read_i32()?;
        let event_count = header_count(reader.read_i32()?, 8, "event count")?;
        let blob_size = header_count(reader.read_i32()?, 12, "string pool size")?;
        let header_reserved = reader.read_u32()?;
        let tempo_count = header_count(reader.read_i32()?, 20, "tempo count")?;
        let ts_count = header_count(reader.read_i32()?, 24, "time signature count")?;
        let header_tail = if layout.header_tail {
            reader.read_u32()?
        } else {
            0
        };

        let table_start = reader.position();
        let tempo_bytes = table_size(tempo_count, layout.tempo_size, 20)?;
        let ts_bytes = table_size(ts_count, layout.time_sig_size, 24)?;
        let event_bytes = table_size(event_count, layout.record_size, 8)?;
        let total = tempo_bytes
            .checked_add(ts_bytes)
            .and_then(|n| n.checked_add(event_bytes))
            .and_then(|n| n.checked_add(blob_size))
            .ok_or_else(|| ChartError::malformed(8, "table sizes overflow"))?;
        ensure_fits(total, reader.remaining(), table_start)?;

        reader.seek(table_start + (tempo_bytes + ts_bytes + event_bytes) as u64)?;
        let pool = PoolIndex::parse(reader.read_exact(blob_size)?);
        reader.seek(table_start)?;

        let mut tempos = Vec::with_capacity(tempo_count);
        for _ in 0..tempo_count {
            let offset = reader.position();
            let tempo = read_tempo(&mut reader, layout)?;
            if let Some(prev) = tempos.last() {
                check_tempo_order(prev, &tempo, offset, options.mode)?;
            }
            tempos.push(tempo);
        }

        let mut time_signatures = Vec::with_capacity(ts_count);
        for _ in 0..ts_count {
            time_signatures.push(TimeSigRecord {
                ticks: reader.read_u32()?,
                measure: reader.read_i32()?,
                numerator: reader.read_i32()?,
                denominator: reader.read_i32()?,
            });
        }

        let mut events = Vec::with_capacity(event_count);
        for index in 0..event_count {
            let offset = reader.position();
            let mut event = ChartEvent::default();
            if layout.wide_events {
                event.reserved[0] = reader.read_u32()?;
            }
            event.flags = reader.read_u16()?;
            event.kind = reader.read_u8()?;
            event.pitch = reader.read_u8()?;
            event.start = reader.read_f32()?;
            event.end = reader.read_f32()?;
            if layout.wide_events {
                event.reserved[1] = reader.read_u32()?;
            }
            let pointer = reader.read_i32()?;
            event.text = pool.resolve(pointer, event_bytes as u32, index, options.mode)?;

            if event.end < event.start {
                match options.mode {
                    DecodeMode::Strict => {
                        return Err(ChartError::malformed(
                            offset,
                            format!(
                                "event {index} ends at {} before it starts at {}",
                                event.end, event.start
                            ),
                        ))
                    }
                    DecodeMode::Lenient => {
                        warn!(
                            index,
                            start = event.start,
                            end = event.end,
                            "event ends before it starts"
                        );
                    }
                }
            }
            events.push(event);
        }

        debug!(
            version,
            tempos = tempos.len(),
            time_signatures = time_signatures.len(),
            events = events.len(),
            "decoded tick-table chart"
        );

        Ok(Self {
            name: String::new(),
            version,
            hash,
            header_reserved,
            header_tail,
            tempos,
            time_signatures,
            events,
        })
    }

    /// Encodes the chart to bytes.
    ///
    /// Counts and sizes are recomputed; the hash and reserved words are
    /// written back as stored. Events keep their model order.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnsupportedFormatVersion`] if `version` is unknown.
    pub fn encode(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let layout = RecordLayout::lookup(ChartFormat::TickTable, self.version)?;
        let endian = options.endian_for(ChartFormat::TickTable);

        let event_bytes = (self.events.len() * layout.record_size) as u32;

        let mut tempo_section = ByteWriter::new(endian);
        for tempo in &self.tempos {
            match layout.tempo_order {
                TempoOrder::StartFirst => {
                    tempo_section.write_f32(tempo.start);
                    tempo_section.write_u32(tempo.us_per_quarter);
                    tempo_section.write_u32(tempo.ticks);
                    tempo_section.write_u32(tempo.reserved);
                }
                TempoOrder::TicksFirst => {
                    tempo_section.write_u32(tempo.ticks);
                    tempo_section.write_f32(tempo.start);
                    tempo_section.write_u32(tempo.us_per_quarter);
                }
            }
        }

        let mut ts_section = ByteWriter::new(endian);
        for ts in &self.time_signatures {
            ts_section.write_u32(ts.ticks);
            ts_section.write_i32(ts.measure);
            ts_section.write_i32(ts.numerator);
            ts_section.write_i32(ts.denominator);
        }

        let mut pool = StringPoolBuilder::new();
        let mut event_section = ByteWriter::new(endian);
        for event in &self.events {
            if layout.wide_events {
                event_section.write_u32(event.reserved[0]);
            }
            event_section.write_u16(event.flags);
            event_section.write_u8(event.kind);
            event_section.write_u8(event.pitch);
            event_section.write_f32(event.start);
            event_section.write_f32(event.end);
            if layout.wide_events {
                event_section.write_u32(event.reserved[1]);
            }
            let text = event.text.as_deref().unwrap_or_default();
            event_section.write_i32(pool.pointer(text, event_bytes));
        }
        let blob = pool.finish();

        let mut out = ByteWriter::new(endian);
        out.write_i32(self.version);
        out.write_i32(self.hash);
        out.write_i32(encode_count(self.events.len(), "events")?);
        out.write_i32(blob.len() as i32);
        out.write_u32(self.header_reserved);
        out.write_i32(encode_count(self.tempos.len(), "tempos")?);
        out.write_i32(encode_count(self.time_signatures.len(), "time signatures")?);
        if layout.header_tail {
            out.write_u32(self.header_tail);
        }
        out.append(&tempo_section);
        out.append(&ts_section);
        out.append(&event_section);
        out.write_bytes(&blob);
        out.pad_to(4);

        debug!(
            name = %self.name,
            version = self.version,
            bytes = out.len(),
            "encoded tick-table chart"
        );
        Ok(out.into_bytes())
    }
}

fn table_size(count: usize, record_size: usize, offset: u64) -> Result<usize> {
    count
        .checked_mul(record_size)
        .ok_or_else(|| ChartError::malformed(offset, "table size overflows"))
}

fn encode_count(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| ChartError::malformed(0, format!("too many {what} to encode")))
}

fn read_tempo(reader: &mut ByteReader<'_>, layout: &RecordLayout) -> Result<TempoRecord> {
    Ok(match layout.tempo_order {
        TempoOrder::StartFirst => TempoRecord {
            start: reader.read_f32()?,
            us_per_quarter: reader.read_u32()?,
            ticks: reader.read_u32()?,
            reserved: reader.read_u32()?,
        },
        TempoOrder::TicksFirst => {
            let ticks = reader.read_u32()?;
            let start = reader.read_f32()?;
            let us_per_quarter = reader.read_u32()?;
            TempoRecord {
                start,
                us_per_quarter,
                ticks,
                reserved: 0,
            }
        }
    })
}

fn check_tempo_order(
    prev: &TempoRecord,
    next: &TempoRecord,
    offset: u64,
    mode: DecodeMode,
) -> Result<()> {
    if next.start > prev.start {
        return Ok(());
    }
    match mode {
        DecodeMode::Strict => Err(ChartError::malformed(
            offset,
            format!(
                "tempo at {}s does not follow previous tempo at {}s",
                next.start, prev.start
            ),
        )),
        DecodeMode::Lenient => {
            warn!(prev = prev.start, next = next.start, "tempo positions not increasing");
            Ok(())
        }
    }
}

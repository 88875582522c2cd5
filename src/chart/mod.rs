//! In-memory models of the two chart binaries.
//!
//! - [`EntryChart`]: one flat table of timed entries positioned in measures
//!   at a single declared tempo, plus a string pool.
//! - [`TickChart`]: explicit tempo and time-signature tables plus events
//!   positioned in seconds, plus a string pool.

pub mod entry_table;
pub mod layout;
pub mod tick_table;

pub use entry_table::{ChartEntry, EntryChart};
pub use layout::RecordLayout;
pub use tick_table::{ChartEvent, TempoRecord, TickChart, TimeSigRecord};

use crate::codec::{DecodeMode, Endian};
use crate::error::{ChartError, Result};
use std::fmt;

/// The two supported chart binary layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartFormat {
    /// Measure-positioned entries with a single declared tempo (`.fsgmub`).
    EntryTable,
    /// Second-positioned events with tempo and time-signature tables (`.xmk`).
    TickTable,
}

impl ChartFormat {
    /// Byte order used when the caller does not override it.
    pub const fn default_endian(self) -> Endian {
        match self {
            ChartFormat::EntryTable => Endian::Little,
            ChartFormat::TickTable => Endian::Big,
        }
    }

    /// Conventional file extension, without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            ChartFormat::EntryTable => "fsgmub",
            ChartFormat::TickTable => "xmk",
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartFormat::EntryTable => write!(f, "entry-table"),
            ChartFormat::TickTable => write!(f, "tick-table"),
        }
    }
}

/// Options controlling chart decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub mode: DecodeMode,
    /// Overrides [`ChartFormat::default_endian`].
    pub endian: Option<Endian>,
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self {
            mode: DecodeMode::Lenient,
            endian: None,
        }
    }

    fn endian_for(&self, format: ChartFormat) -> Endian {
        self.endian.unwrap_or(format.default_endian())
    }
}

/// Options controlling chart encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Overrides [`ChartFormat::default_endian`].
    pub endian: Option<Endian>,
}

impl EncodeOptions {
    fn endian_for(&self, format: ChartFormat) -> Endian {
        self.endian.unwrap_or(format.default_endian())
    }
}

/// Converts a header count to `usize`, rejecting negative values.
fn header_count(value: i32, offset: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| ChartError::malformed(offset, format!("negative {what} ({value})")))
}

/// Fails when `needed` bytes do not fit in what is left of the stream.
fn ensure_fits(needed: usize, remaining: usize, offset: u64) -> Result<()> {
    if needed > remaining {
        return Err(ChartError::malformed(
            offset,
            format!("header declares {needed} bytes of tables but only {remaining} remain"),
        ));
    }
    Ok(())
}

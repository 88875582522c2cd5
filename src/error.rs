//! Error types for chart decoding, encoding and conversion.
//!
//! Every failure carries enough context (byte offset, entry index, marker text)
//! to diagnose a bad file without re-running with tracing enabled.

use crate::chart::ChartFormat;

/// Library error type for chart conversion operations.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// A read asked for more bytes than remain in the stream.
    #[error("unexpected end of stream at byte {offset}: wanted {wanted} bytes, {available} available")]
    UnexpectedEndOfStream {
        offset: u64,
        wanted: usize,
        available: usize,
    },

    /// Structurally invalid header, counts or records.
    #[error("malformed chart at byte {offset}: {reason}")]
    MalformedChart { offset: u64, reason: String },

    /// A text pointer does not land on a string in the pool (strict mode only).
    #[error("entry {index} references string offset {offset}, which is not in the string pool")]
    UnresolvedStringOffset { index: usize, offset: i32 },

    /// More than one source claims to be the chart's global tempo.
    #[error("ambiguous tempo declaration: {0}")]
    AmbiguousTempoDeclaration(String),

    /// A lyric or phrase marker with no note starting at its timestamp.
    #[error("orphaned marker \"{text}\" at tick {tick}")]
    OrphanedMarker { tick: u64, text: String },

    /// The header declares a version with no known record layout.
    #[error("unsupported {format} version {version}")]
    UnsupportedFormatVersion { format: ChartFormat, version: i32 },

    /// Breakpoint lookup failed. Indicates a logic defect, never bad input.
    #[error("internal clock inconsistency: {0}")]
    InternalClockInconsistency(String),

    /// Quantization value outside [0, 1] or not a ratio/decimal.
    #[error("quantization of \"{0}\" is invalid, expected a ratio or decimal between 0 and 1")]
    InvalidQuantization(String),

    /// A required interchange track is absent.
    #[error("can't find \"{0}\" track")]
    MissingTrack(String),

    /// Nothing to convert.
    #[error("no charts were given")]
    NoCharts,

    /// SMF parsing or writing failed.
    #[error("MIDI error: {0}")]
    Midi(String),

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChartError {
    /// Shorthand for [`ChartError::MalformedChart`].
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedChart {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChartError>;

//! Conversion between chart clocks and the 480 TPQ interchange tick clock.
//!
//! - [`MeasureClock`]: entry-table positions in measures at one declared
//!   chart tempo, bent by tempo-change breakpoints.
//! - [`RealtimeClock`]: tick-table positions in seconds, anchored by the
//!   chart's tempo records.
//! - [`Quantizer`]: optional snapping of the resulting ticks to a grid.
//!
//! A 4/4 meter is assumed whenever a measure length is needed.

pub mod measure;
pub mod quantize;
pub mod realtime;

pub use measure::MeasureClock;
pub use quantize::Quantizer;
pub use realtime::RealtimeClock;

/// Interchange resolution in ticks per quarter note.
pub const TICKS_PER_QUARTER: u64 = 480;

/// Ticks per 4/4 measure.
pub const TICKS_PER_MEASURE: u64 = TICKS_PER_QUARTER * 4;

/// 120 BPM.
pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

/// Converts a BPM value to microseconds per quarter note.
///
/// Returns `None` for non-positive or non-finite BPM.
pub fn bpm_to_us(bpm: f32) -> Option<u32> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    let us = (60_000_000f32 / bpm).round_ties_even();
    if us < 1.0 || us > u32::MAX as f32 {
        return None;
    }
    Some(us as u32)
}

/// Converts microseconds per quarter note to BPM.
pub fn us_to_bpm(us_per_quarter: u32) -> f32 {
    (60_000_000f64 / f64::from(us_per_quarter.max(1))) as f32
}

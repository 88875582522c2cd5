//! Real-time clock for tick-table charts.
//!
//! Event positions are seconds. The chart's tempo records provide anchors
//! pairing a real-time position with an interchange tick; ticks between
//! anchors advance at the anchor's tempo.

use super::{Quantizer, DEFAULT_US_PER_QUARTER, TICKS_PER_QUARTER};
use crate::chart::TempoRecord;
use crate::error::{ChartError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    tick: u64,
    real_ms: f64,
    us_per_quarter: u32,
}

/// Maps real-time positions to quantized interchange ticks and back.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeClock {
    anchors: Vec<Anchor>,
    quantizer: Quantizer,
}

impl RealtimeClock {
    /// Builds the clock from a chart's tempo records.
    ///
    /// A 120 BPM anchor at zero is prepended when there are no records or the
    /// first one starts after zero; the first record then keeps its own tick
    /// position, otherwise it is pinned to tick zero.
    pub fn new(tempos: &[TempoRecord], quantizer: Quantizer) -> Self {
        let mut anchors = Vec::with_capacity(tempos.len() + 1);
        let needs_default = tempos.first().map_or(true, |first| first.start > 0.0);
        if needs_default {
            anchors.push(Anchor {
                tick: 0,
                real_ms: 0.0,
                us_per_quarter: DEFAULT_US_PER_QUARTER,
            });
        }

        for (i, tempo) in tempos.iter().enumerate() {
            let tick = if i == 0 && !needs_default {
                0
            } else {
                u64::from(tempo.ticks / 2)
            };
            anchors.push(Anchor {
                tick,
                real_ms: f64::from(tempo.start * 1000.0),
                us_per_quarter: tempo.us_per_quarter,
            });
        }

        Self { anchors, quantizer }
    }

    pub fn quantizer(&self) -> Quantizer {
        self.quantizer
    }

    /// Interchange tick of a position in seconds.
    ///
    /// Elapsed milliseconds since the anchor are truncated before scaling, the
    /// result is snapped to the quantization grid and clamped at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InternalClockInconsistency`] if there is no usable
    /// anchor or the position is not finite or too far out to fit a tick.
    pub fn to_ticks(&self, seconds: f32) -> Result<u64> {
        let real_ms = f64::from(seconds * 1000.0);
        let anchor = self.anchor_by_time(real_ms)?;
        let elapsed = real_ms - anchor.real_ms;
        if !elapsed.is_finite() {
            return Err(ChartError::InternalClockInconsistency(format!(
                "position {seconds}s is not finite"
            )));
        }

        let elapsed_ms = elapsed as i64;
        let ticks = elapsed_ms
            .checked_mul(1000 * TICKS_PER_QUARTER as i64)
            .map(|scaled| scaled / i64::from(anchor.us_per_quarter))
            .and_then(|delta| delta.checked_add(anchor.tick as i64))
            .ok_or_else(|| {
                ChartError::InternalClockInconsistency(format!(
                    "position {seconds}s is out of tick range"
                ))
            })?;
        Ok(self.quantizer.snap(ticks).max(0) as u64)
    }

    /// Position in seconds of an interchange tick.
    pub fn to_seconds(&self, ticks: u64) -> Result<f64> {
        let anchor = self
            .anchors
            .iter()
            .rev()
            .find(|a| a.tick <= ticks)
            .or_else(|| self.anchors.first())
            .ok_or_else(|| ChartError::InternalClockInconsistency("no tempo anchors".into()))?;

        let delta = ticks as f64 - anchor.tick as f64;
        let ms = anchor.real_ms
            + delta * f64::from(anchor.us_per_quarter) / TICKS_PER_QUARTER as f64 / 1000.0;
        Ok(ms / 1000.0)
    }

    fn anchor_by_time(&self, real_ms: f64) -> Result<&Anchor> {
        let anchor = self
            .anchors
            .iter()
            .rev()
            .find(|a| a.real_ms <= real_ms)
            .or_else(|| self.anchors.first())
            .ok_or_else(|| ChartError::InternalClockInconsistency("no tempo anchors".into()))?;
        if anchor.us_per_quarter == 0 {
            return Err(ChartError::InternalClockInconsistency(format!(
                "anchor at {}ms has a zero tempo",
                anchor.real_ms
            )));
        }
        Ok(anchor)
    }
}

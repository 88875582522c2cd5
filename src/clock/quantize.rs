//! Grid quantization of interchange ticks.

use super::TICKS_PER_MEASURE;
use crate::error::{ChartError, Result};
use std::fmt;
use std::str::FromStr;

/// Snaps tick positions to a grid expressed as a fraction of a measure.
///
/// A grid of zero ticks disables snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    grid: i64,
}

impl Default for Quantizer {
    /// 1/128 of a measure, 15 ticks.
    fn default() -> Self {
        Self {
            grid: (TICKS_PER_MEASURE / 128) as i64,
        }
    }
}

impl Quantizer {
    pub const fn disabled() -> Self {
        Self { grid: 0 }
    }

    /// Builds a quantizer from a measure fraction in `[0, 1]`.
    ///
    /// The grid size is truncated to whole ticks.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InvalidQuantization`] outside `[0, 1]`.
    pub fn from_ratio(ratio: f64) -> Result<Self> {
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(ChartError::InvalidQuantization(ratio.to_string()));
        }
        Ok(Self {
            grid: (TICKS_PER_MEASURE as f64 * ratio) as i64,
        })
    }

    /// Grid size in ticks, zero when disabled.
    pub fn grid(&self) -> u64 {
        self.grid as u64
    }

    pub fn is_enabled(&self) -> bool {
        self.grid > 0
    }

    /// Snaps `ticks` to the nearest grid line.
    ///
    /// Positions exactly halfway between two lines snap to the earlier one.
    pub fn snap(&self, ticks: i64) -> i64 {
        if self.grid <= 0 {
            return ticks;
        }
        let before = ticks.rem_euclid(self.grid);
        if before == 0 {
            return ticks;
        }
        let after = self.grid - before;
        if before <= after {
            ticks - before
        } else {
            ticks.saturating_add(after)
        }
    }
}

impl FromStr for Quantizer {
    type Err = ChartError;

    /// Parses `"n/d"` fractions (`"1/128"`) or decimals (`"0.0078125"`).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ChartError::InvalidQuantization(s.to_string());
        let trimmed = s.trim();

        let ratio = match trimmed.split_once('/') {
            Some((num, den)) => {
                let num: u32 = num.trim().parse().map_err(|_| invalid())?;
                let den: u32 = den.trim().parse().map_err(|_| invalid())?;
                if den == 0 {
                    return Err(invalid());
                }
                f64::from(num) / f64::from(den)
            }
            None => trimmed.parse::<f64>().map_err(|_| invalid())?,
        };

        Self::from_ratio(ratio).map_err(|_| invalid())
    }
}

impl fmt::Display for Quantizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.grid > 0 {
            write!(f, "{} ticks", self.grid)
        } else {
            write!(f, "off")
        }
    }
}

//! Measure-position clock for entry-table charts.
//!
//! Entry positions are measures played at the chart's declared tempo. Tempo
//! change entries sit at musical measure positions; each one bends the
//! mapping so that chart measures advance at `chart_us / us` musical measures.

use super::TICKS_PER_MEASURE;
use crate::error::{ChartError, Result};

/// One linear segment of the chart-to-musical mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Breakpoint {
    /// Position in chart measures.
    chart_pos: f64,
    /// Position in musical measures.
    measure_pos: f64,
    us_per_quarter: u32,
}

/// Piecewise-linear map between chart measures and interchange ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureClock {
    chart_us: u32,
    breakpoints: Vec<Breakpoint>,
}

impl MeasureClock {
    /// A clock with no tempo changes: one chart measure is one musical measure.
    pub fn fixed(chart_us: u32) -> Self {
        Self {
            chart_us,
            breakpoints: vec![Breakpoint {
                chart_pos: 0.0,
                measure_pos: 0.0,
                us_per_quarter: chart_us,
            }],
        }
    }

    /// Builds the clock from tempo changes.
    ///
    /// # Arguments
    ///
    /// * `chart_us` - Microseconds per quarter of the declared chart tempo
    /// * `changes` - `(measure position, microseconds per quarter)` pairs in any order
    pub fn new(chart_us: u32, changes: &[(f64, u32)]) -> Self {
        let mut changes = changes.to_vec();
        changes.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut breakpoints: Vec<Breakpoint> = Vec::with_capacity(changes.len() + 1);
        if changes.first().map_or(true, |&(measure, _)| measure != 0.0) {
            breakpoints.push(Breakpoint {
                chart_pos: 0.0,
                measure_pos: 0.0,
                us_per_quarter: chart_us,
            });
        }

        for (measure_pos, us_per_quarter) in changes {
            let chart_pos = match breakpoints.last() {
                Some(prev) => {
                    prev.chart_pos
                        + (measure_pos - prev.measure_pos) * f64::from(prev.us_per_quarter)
                            / f64::from(chart_us)
                }
                None => measure_pos,
            };
            breakpoints.push(Breakpoint {
                chart_pos,
                measure_pos,
                us_per_quarter,
            });
        }

        Self {
            chart_us,
            breakpoints,
        }
    }

    pub fn chart_us(&self) -> u32 {
        self.chart_us
    }

    /// Musical measure position of a chart position.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InternalClockInconsistency`] if the clock has no
    /// breakpoints or the result is not finite.
    pub fn measure_at(&self, chart_pos: f64) -> Result<f64> {
        let bp = self
            .breakpoints
            .iter()
            .rev()
            .find(|bp| bp.chart_pos <= chart_pos)
            .or_else(|| self.breakpoints.first())
            .ok_or_else(|| ChartError::InternalClockInconsistency("no tempo breakpoints".into()))?;

        let measure = bp.measure_pos
            + (chart_pos - bp.chart_pos) * f64::from(self.chart_us) / f64::from(bp.us_per_quarter);
        finite(measure, chart_pos)
    }

    /// Interchange tick of a chart position, rounded half to even.
    ///
    /// Positions before the start of the song clamp to tick 0.
    pub fn to_ticks(&self, chart_pos: f64) -> Result<u64> {
        let ticks = (self.measure_at(chart_pos)? * TICKS_PER_MEASURE as f64).round_ties_even();
        Ok(ticks.max(0.0) as u64)
    }

    /// Chart position of an interchange tick.
    pub fn to_chart(&self, ticks: u64) -> Result<f64> {
        let measure = ticks as f64 / TICKS_PER_MEASURE as f64;
        let bp = self
            .breakpoints
            .iter()
            .rev()
            .find(|bp| bp.measure_pos <= measure)
            .or_else(|| self.breakpoints.first())
            .ok_or_else(|| ChartError::InternalClockInconsistency("no tempo breakpoints".into()))?;

        let chart_pos = bp.chart_pos
            + (measure - bp.measure_pos) * f64::from(bp.us_per_quarter) / f64::from(self.chart_us);
        finite(chart_pos, measure)
    }
}

fn finite(value: f64, input: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ChartError::InternalClockInconsistency(format!(
            "position {input} maps to {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tempo() {
        let clock = MeasureClock::fixed(500_000);
        assert_eq!(clock.to_ticks(0.0).unwrap(), 0);
        assert_eq!(clock.to_ticks(0.25).unwrap(), 480);
        assert_eq!(clock.to_ticks(0.5).unwrap(), 960);
        assert_eq!(clock.to_ticks(0.625).unwrap(), 1200);
        assert_eq!(clock.to_chart(960).unwrap(), 0.5);
    }

    #[test]
    fn test_tempo_change_bends_mapping() {
        // Chart at 120 BPM, song slows to 60 BPM at measure 1.
        let clock = MeasureClock::new(500_000, &[(1.0, 1_000_000)]);
        assert_eq!(clock.to_ticks(1.0).unwrap(), 1920);
        // One chart measure at half speed covers half a musical measure.
        assert_eq!(clock.to_ticks(2.0).unwrap(), 1920 + 960);
        assert_eq!(clock.to_chart(1920 + 960).unwrap(), 2.0);
    }

    #[test]
    fn test_change_at_zero_replaces_default() {
        let clock = MeasureClock::new(500_000, &[(0.0, 250_000), (2.0, 500_000)]);
        // 250000 us is twice as fast: one chart measure covers two musical ones.
        assert_eq!(clock.to_ticks(1.0).unwrap(), 3840);
        // Second change sits at chart position 1.0.
        assert_eq!(clock.to_ticks(1.5).unwrap(), 3840 + 960);
    }

    #[test]
    fn test_monotonic() {
        let clock = MeasureClock::new(500_000, &[(1.0, 600_000), (3.0, 400_000), (4.5, 500_000)]);
        let mut prev = 0;
        for step in 0..400 {
            let ticks = clock.to_ticks(f64::from(step) * 0.0173).unwrap();
            assert!(ticks >= prev);
            prev = ticks;
        }
    }

    #[test]
    fn test_inverse() {
        let clock = MeasureClock::new(500_000, &[(1.0, 600_000), (3.0, 400_000)]);
        for ticks in [0u64, 480, 1920, 2400, 5760, 7000] {
            let chart = clock.to_chart(ticks).unwrap();
            assert_eq!(clock.to_ticks(chart).unwrap(), ticks);
        }
    }

    #[test]
    fn test_zero_tempo_is_inconsistent() {
        let clock = MeasureClock::new(500_000, &[(0.0, 0)]);
        assert!(matches!(
            clock.to_ticks(1.0),
            Err(ChartError::InternalClockInconsistency(_))
        ));
    }
}

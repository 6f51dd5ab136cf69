//! PiCycle ratio: 111-day SMA against twice the 350-day SMA.

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::TimeSeries;
use tracing::debug;

use crate::core::{ensure_finite, ensure_period, IndicatorError, IndicatorResult};
use crate::window::growing_mean;

/// One point of the PiCycle ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiCyclePoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Short moving average.
    pub short_ma: f64,
    /// Long moving average multiplied by two.
    pub long_ma_x2: f64,
    /// `short_ma / long_ma_x2`.
    pub ratio: f64,
}

derived_point!(PiCyclePoint {
    value => "value",
    short_ma => "shortMa",
    long_ma_x2 => "longMaX2",
    ratio => "ratio",
});

/// PiCycle ratio calculator. Values near 1 have historically marked cycle tops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiCycle {
    short: usize,
    long: usize,
    floor: f64,
}

impl PiCycle {
    /// Short moving-average window.
    pub const DEFAULT_SHORT: usize = 111;
    /// Long moving-average window.
    pub const DEFAULT_LONG: usize = 350;
    /// Long averages at or below this produce a zero ratio.
    pub const DEFAULT_FLOOR: f64 = 0.001;

    /// Build a calculator with custom windows and denominator floor.
    pub fn new(short: usize, long: usize, floor: f64) -> IndicatorResult<Self> {
        let short = ensure_period("PiCycle", short)?;
        let long = ensure_period("PiCycle", long)?;
        if short > long {
            return Err(IndicatorError::invalid_parameter("PiCycle", "short", short));
        }
        Ok(Self {
            short,
            long,
            floor: ensure_finite("PiCycle", "floor", floor)?,
        })
    }

    /// Compute the ratio for every finite point; empty with fewer than `long` points.
    pub fn compute(&self, history: &TimeSeries) -> Vec<PiCyclePoint> {
        let finite = history.finite();
        if finite.len() < self.long {
            debug!(
                points = finite.len(),
                required = self.long,
                "not enough data for pi cycle"
            );
            return Vec::new();
        }
        let values = finite.values();
        let short = growing_mean(&values, self.short);
        let long = growing_mean(&values, self.long);
        finite
            .iter()
            .zip(short.into_iter().zip(long))
            .map(|(point, (short_ma, long_ma))| PiCyclePoint {
                timestamp: point.timestamp,
                value: point.value,
                short_ma,
                long_ma_x2: long_ma * 2.0,
                ratio: if long_ma > self.floor {
                    short_ma / (long_ma * 2.0)
                } else {
                    0.0
                },
            })
            .collect()
    }
}

impl Default for PiCycle {
    fn default() -> Self {
        Self {
            short: Self::DEFAULT_SHORT,
            long: Self::DEFAULT_LONG,
            floor: Self::DEFAULT_FLOOR,
        }
    }
}

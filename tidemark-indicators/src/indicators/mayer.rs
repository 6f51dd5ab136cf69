//! Mayer Multiple: price over its 200-day moving average.

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::TimeSeries;
use tracing::debug;

use crate::core::{ensure_period, IndicatorResult};
use crate::window::growing_mean;

/// Ratio of a value to a moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Moving average the value is compared against.
    #[serde(rename = "MA")]
    pub ma: f64,
    /// `value / ma`, `0` when the average is not positive.
    pub ratio: f64,
}

derived_point!(RatioPoint {
    value => "value",
    ma => "MA",
    ratio => "ratio",
});

/// Mayer Multiple calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MayerMultiple {
    window: usize,
}

impl MayerMultiple {
    /// Moving-average window of the classic Mayer Multiple.
    pub const DEFAULT_WINDOW: usize = 200;

    /// Build a calculator with a custom window.
    pub fn new(window: usize) -> IndicatorResult<Self> {
        Ok(Self {
            window: ensure_period("MayerMultiple", window)?,
        })
    }

    /// Compute the multiple for every finite point.
    ///
    /// Empty when fewer than `window` finite points exist. Early points use the
    /// growing window like every other moving average in the crate.
    pub fn compute(&self, history: &TimeSeries) -> Vec<RatioPoint> {
        let finite = history.finite();
        if finite.len() < self.window {
            debug!(
                points = finite.len(),
                required = self.window,
                "not enough data for mayer multiple"
            );
            return Vec::new();
        }
        let values = finite.values();
        let ma = growing_mean(&values, self.window);
        finite
            .iter()
            .zip(ma)
            .map(|(point, ma)| RatioPoint {
                timestamp: point.timestamp,
                value: point.value,
                ma,
                ratio: if ma > 0.0 { point.value / ma } else { 0.0 },
            })
            .collect()
    }
}

impl Default for MayerMultiple {
    fn default() -> Self {
        Self {
            window: Self::DEFAULT_WINDOW,
        }
    }
}

//! Risk Metric: log distance from a long moving average, normalized over the full history.

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::TimeSeries;
use tracing::debug;

use crate::core::{ensure_finite, ensure_period, IndicatorResult};
use crate::window::growing_mean;

/// One point of the Risk Metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Growing-window moving average.
    #[serde(rename = "MA")]
    pub ma: f64,
    /// Position-scaled log distance from the moving average.
    pub preavg: f64,
    /// `preavg` rescaled into `[0, 1]` over the whole series.
    pub risk: f64,
}

derived_point!(RiskPoint {
    value => "value",
    ma => "MA",
    preavg => "preavg",
    risk => "risk",
});

/// Risk Metric calculator.
///
/// The normalization uses the minimum and maximum of the entire history, so
/// the value assigned to an old date changes whenever new data extends either
/// bound. Always call [`RiskMetric::compute`] with the complete history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMetric {
    window: usize,
    exponent: f64,
}

impl RiskMetric {
    /// Moving-average window used historically.
    pub const DEFAULT_WINDOW: usize = 374;
    /// Exponent applied to the position index.
    pub const DEFAULT_EXPONENT: f64 = 0.395;

    /// Build a calculator with a custom window and exponent.
    pub fn new(window: usize, exponent: f64) -> IndicatorResult<Self> {
        Ok(Self {
            window: ensure_period("RiskMetric", window)?,
            exponent: ensure_finite("RiskMetric", "exponent", exponent)?,
        })
    }

    /// Moving-average window.
    pub fn window(&self) -> usize {
        self.window
    }

    /// `(ln(value) - ln(ma)) * position_index^exponent`.
    ///
    /// `position_index` is the point's position in the history, not the number
    /// of calendar days since the first observation. The first point always
    /// scores zero.
    pub fn preavg(&self, value: f64, ma: f64, position_index: usize) -> f64 {
        if position_index == 0 {
            return 0.0;
        }
        let scaled = (value.ln() - ma.ln()) * (position_index as f64).powf(self.exponent);
        if scaled.is_finite() {
            scaled
        } else {
            0.0
        }
    }

    /// Recompute the metric over the full history.
    ///
    /// Non-finite and non-positive values are dropped first, since the metric
    /// works in log space.
    pub fn compute(&self, history: &TimeSeries) -> Vec<RiskPoint> {
        let usable = history.filter(|p| p.value.is_finite() && p.value > 0.0);
        if usable.len() < history.len() {
            debug!(
                dropped = history.len() - usable.len(),
                "risk metric ignoring non-positive or missing values"
            );
        }
        if usable.is_empty() {
            return Vec::new();
        }

        let values = usable.values();
        let ma = growing_mean(&values, self.window);
        let preavg: Vec<f64> = values
            .iter()
            .zip(&ma)
            .enumerate()
            .map(|(i, (value, ma))| self.preavg(*value, *ma, i))
            .collect();

        let (min, max) = preavg
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let range = max - min;

        usable
            .iter()
            .zip(ma.iter().zip(&preavg))
            .map(|(point, (ma, preavg))| RiskPoint {
                timestamp: point.timestamp,
                value: point.value,
                ma: *ma,
                preavg: *preavg,
                risk: if range > 0.0 {
                    (preavg - min) / range
                } else {
                    0.0
                },
            })
            .collect()
    }
}

impl Default for RiskMetric {
    fn default() -> Self {
        Self {
            window: Self::DEFAULT_WINDOW,
            exponent: Self::DEFAULT_EXPONENT,
        }
    }
}

//! Puell Multiple: daily issuance value over its trailing yearly average.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tidemark_core::TimeSeries;

use crate::combinators::IndicatorExt;
use crate::core::{ensure_period, Indicator, IndicatorError, IndicatorResult};
use crate::window::RollingMean;

/// First day of the issuance schedule.
pub const GENESIS: (i32, u32, u32) = (2009, 1, 3);
/// Blocks mined per day under the target spacing.
pub const BLOCKS_PER_DAY: u64 = 144;
/// Blocks between reward halvings.
pub const HALVING_INTERVAL: u64 = 210_000;
/// Block reward before the first halving.
pub const INITIAL_REWARD: f64 = 50.0;

/// Coins issued on `date` according to the halving schedule.
///
/// Block height is approximated as `days_since_genesis * 144`, so halving
/// dates drift from the real chain by a few weeks.
pub fn daily_issuance(date: NaiveDate) -> f64 {
    let Some(genesis) = NaiveDate::from_ymd_opt(GENESIS.0, GENESIS.1, GENESIS.2) else {
        return 0.0;
    };
    let days = (date - genesis).num_days();
    if days < 0 {
        return 0.0;
    }
    let halvings = days as u64 * BLOCKS_PER_DAY / HALVING_INTERVAL;
    if halvings >= 64 {
        return 0.0;
    }
    let reward = INITIAL_REWARD / (1u64 << halvings) as f64;
    BLOCKS_PER_DAY as f64 * reward
}

/// Where daily issuance in USD comes from.
#[derive(Debug, Clone, Copy)]
pub enum IssuanceSource<'a> {
    /// On-chain "issuance in USD" series.
    Direct(&'a TimeSeries),
    /// Issuance derived from the halving schedule and a price series.
    HalvingSchedule {
        /// Daily price in USD.
        price: &'a TimeSeries,
    },
}

impl IssuanceSource<'_> {
    /// Daily issuance in USD for every usable day.
    pub fn issuance_usd(&self) -> TimeSeries {
        match self {
            IssuanceSource::Direct(series) => series.finite(),
            IssuanceSource::HalvingSchedule { price } => {
                let finite = price.finite();
                let points = finite
                    .iter()
                    .map(|p| (p.timestamp, daily_issuance(p.timestamp) * p.value));
                // Dates come from an ordered series, so this cannot fail.
                TimeSeries::from_pairs(points).unwrap_or_default()
            }
        }
    }
}

/// Second moving-average period applied to the ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PuellSmoothing {
    /// 7 days.
    Week,
    /// 28 days.
    Month,
    /// 90 days.
    Quarter,
    /// 180 days.
    HalfYear,
    /// 365 days.
    Year,
}

impl PuellSmoothing {
    /// Period in days.
    pub fn days(self) -> usize {
        match self {
            PuellSmoothing::Week => 7,
            PuellSmoothing::Month => 28,
            PuellSmoothing::Quarter => 90,
            PuellSmoothing::HalfYear => 180,
            PuellSmoothing::Year => 365,
        }
    }
}

impl TryFrom<u32> for PuellSmoothing {
    type Error = IndicatorError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(PuellSmoothing::Week),
            28 => Ok(PuellSmoothing::Month),
            90 => Ok(PuellSmoothing::Quarter),
            180 => Ok(PuellSmoothing::HalfYear),
            365 => Ok(PuellSmoothing::Year),
            other => Err(IndicatorError::invalid_parameter(
                "PuellMultiple",
                "smoothing",
                other,
            )),
        }
    }
}

impl From<PuellSmoothing> for u32 {
    fn from(value: PuellSmoothing) -> Self {
        value.days() as u32
    }
}

/// Which points the smoothing window covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingAlignment {
    /// Window ends at the current point.
    #[default]
    Trailing,
    /// Window ends at the previous point; the first point has no smoothed value.
    Lagged,
}

/// One point of the Puell Multiple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuellPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Daily issuance in USD.
    pub issuance_usd: f64,
    /// Trailing mean of issuance.
    pub issuance_ma: f64,
    /// `issuance_usd / issuance_ma`.
    pub ratio: f64,
    /// Smoothed ratio, the value normally charted.
    pub smoothed: f64,
}

derived_point!(PuellPoint {
    issuance_usd => "issuanceUsd",
    issuance_ma => "issuanceMa",
    ratio => "ratio",
    smoothed => "smoothed",
});

/// Issuance over its trailing average, `0` when the average is not positive.
#[derive(Debug, Clone)]
struct IssuanceRatio {
    mean: RollingMean<f64>,
}

impl Indicator for IssuanceRatio {
    type Input = f64;
    type Output = (f64, f64);

    fn next(&mut self, input: f64) -> Option<(f64, f64)> {
        let ma = self.mean.next(input)?;
        let ratio = if ma > 0.0 { input / ma } else { 0.0 };
        Some((ma, ratio))
    }

    fn reset(&mut self) {
        self.mean.reset();
    }
}

#[derive(Debug, Clone)]
struct Smoother {
    mean: RollingMean<f64>,
    alignment: SmoothingAlignment,
    previous: Option<f64>,
}

impl Indicator for Smoother {
    type Input = f64;
    type Output = f64;

    fn next(&mut self, input: f64) -> Option<f64> {
        let current = self.mean.next(input);
        match self.alignment {
            SmoothingAlignment::Trailing => current,
            SmoothingAlignment::Lagged => std::mem::replace(&mut self.previous, current),
        }
    }

    fn reset(&mut self) {
        self.mean.reset();
        self.previous = None;
    }
}

/// Puell Multiple calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuellMultiple {
    issuance_window: usize,
    smoothing: PuellSmoothing,
    alignment: SmoothingAlignment,
}

impl PuellMultiple {
    /// Trailing window of the issuance average.
    pub const DEFAULT_ISSUANCE_WINDOW: usize = 365;

    /// Build a calculator.
    pub fn new(
        issuance_window: usize,
        smoothing: PuellSmoothing,
        alignment: SmoothingAlignment,
    ) -> IndicatorResult<Self> {
        Ok(Self {
            issuance_window: ensure_period("PuellMultiple", issuance_window)?,
            smoothing,
            alignment,
        })
    }

    /// Calculator with the default issuance window.
    pub fn with_smoothing(smoothing: PuellSmoothing, alignment: SmoothingAlignment) -> Self {
        Self {
            issuance_window: Self::DEFAULT_ISSUANCE_WINDOW,
            smoothing,
            alignment,
        }
    }

    /// Compute the multiple over the full issuance history.
    pub fn compute(&self, source: IssuanceSource<'_>) -> Vec<PuellPoint> {
        let issuance = source.issuance_usd();
        let (Ok(issuance_mean), Ok(smoothing_mean)) = (
            RollingMean::new(self.issuance_window),
            RollingMean::new(self.smoothing.days()),
        ) else {
            return Vec::new();
        };

        let mut issuance_ratio = IssuanceRatio {
            mean: issuance_mean,
        };
        let mut smoother = Smoother {
            mean: smoothing_mean,
            alignment: self.alignment,
            previous: None,
        };

        let ratios = issuance_ratio.run(issuance.values());
        issuance
            .iter()
            .zip(ratios)
            .filter_map(|(point, ratio)| {
                let (issuance_ma, ratio) = ratio?;
                let smoothed = smoother.next(ratio)?;
                Some(PuellPoint {
                    timestamp: point.timestamp,
                    issuance_usd: point.value,
                    issuance_ma,
                    ratio,
                    smoothed,
                })
            })
            .collect()
    }
}

impl Default for PuellMultiple {
    fn default() -> Self {
        Self::with_smoothing(PuellSmoothing::Month, SmoothingAlignment::Trailing)
    }
}

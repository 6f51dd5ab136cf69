//! Running ROI, annualized volatility and month-of-year ROI averages.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tidemark_core::{TimePoint, TimeSeries};

use crate::core::{ensure_period, IndicatorResult};
use crate::window::{rolling_log_return_std_dev, Moments};

/// How the start of a trailing window is located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Latest earlier point at least `window` calendar days before.
    #[default]
    ElapsedDays,
    /// The point exactly `window` positions before.
    FixedOffset,
}

impl WindowAnchor {
    /// Start index of the window ending at each point, if the window has elapsed.
    fn starts(self, points: &[TimePoint], window: usize) -> Vec<Option<usize>> {
        match self {
            WindowAnchor::FixedOffset => (0..points.len())
                .map(|i| i.checked_sub(window))
                .collect(),
            WindowAnchor::ElapsedDays => {
                let window = window as i64;
                // Number of points whose date is at least `window` days before the current one.
                let mut eligible = 0usize;
                points
                    .iter()
                    .map(|current| {
                        while eligible < points.len()
                            && (current.timestamp - points[eligible].timestamp).num_days()
                                >= window
                        {
                            eligible += 1;
                        }
                        eligible.checked_sub(1)
                    })
                    .collect()
            }
        }
    }
}

/// ROI multiplier over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Date the window starts on.
    pub start: NaiveDate,
    /// `value / value_at_start`.
    pub roi: f64,
}

derived_point!(RoiPoint {
    value => "value",
    roi => "roi",
});

/// Running ROI calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningRoi {
    window: usize,
    anchor: WindowAnchor,
}

impl RunningRoi {
    /// Build a calculator for a window measured in days (or positions for `FixedOffset`).
    pub fn new(window: usize, anchor: WindowAnchor) -> IndicatorResult<Self> {
        Ok(Self {
            window: ensure_period("RunningRoi", window)?,
            anchor,
        })
    }

    /// ROI for every point whose window has elapsed.
    pub fn compute(&self, history: &TimeSeries) -> Vec<RoiPoint> {
        let finite = history.finite();
        let points = finite.points();
        self.anchor
            .starts(points, self.window)
            .into_iter()
            .zip(points)
            .filter_map(|(start, point)| {
                let start = points[start?];
                if start.value <= 0.0 {
                    return None;
                }
                Some(RoiPoint {
                    timestamp: point.timestamp,
                    value: point.value,
                    start: start.timestamp,
                    roi: point.value / start.value,
                })
            })
            .collect()
    }
}

/// Annualized volatility of a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Annualized volatility in percent.
    pub volatility: f64,
}

derived_point!(VolatilityPoint {
    value => "value",
    volatility => "volatility",
});

/// Historical volatility: population stddev of log returns, `* sqrt(365) * 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalVolatility {
    window: usize,
    anchor: WindowAnchor,
}

impl HistoricalVolatility {
    /// Days per year used for annualization.
    pub const ANNUALIZATION_DAYS: f64 = 365.0;

    /// Build a calculator for a window measured in days (or positions for `FixedOffset`).
    pub fn new(window: usize, anchor: WindowAnchor) -> IndicatorResult<Self> {
        Ok(Self {
            window: ensure_period("HistoricalVolatility", window)?,
            anchor,
        })
    }

    fn annualize(std_dev: f64) -> f64 {
        std_dev * Self::ANNUALIZATION_DAYS.sqrt() * 100.0
    }

    /// Volatility for every point whose window has elapsed. Non-positive prices are skipped.
    pub fn compute(&self, history: &TimeSeries) -> Vec<VolatilityPoint> {
        let usable = history.filter(|p| p.value.is_finite() && p.value > 0.0);
        let points = usable.points();
        match self.anchor {
            WindowAnchor::FixedOffset => self.fixed_offset(points),
            WindowAnchor::ElapsedDays => self.elapsed_days(points),
        }
    }

    fn fixed_offset(&self, points: &[TimePoint]) -> Vec<VolatilityPoint> {
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        // `window` returns need `window + 1` points.
        let Ok(std_devs) = rolling_log_return_std_dev(&values, self.window + 1) else {
            return Vec::new();
        };
        points
            .iter()
            .zip(std_devs)
            .skip(self.window)
            .filter_map(|(point, std_dev)| {
                Some(VolatilityPoint {
                    timestamp: point.timestamp,
                    value: point.value,
                    volatility: Self::annualize(std_dev?),
                })
            })
            .collect()
    }

    fn elapsed_days(&self, points: &[TimePoint]) -> Vec<VolatilityPoint> {
        let starts = WindowAnchor::ElapsedDays.starts(points, self.window);
        let returns: Vec<f64> = std::iter::once(f64::NAN)
            .chain(points.windows(2).map(|w| (w[1].value / w[0].value).ln()))
            .collect();

        let mut moments = Moments::new();
        // Returns at indices `first_return..=i` are currently in `moments`.
        let mut first_return = 1usize;
        let mut output = Vec::new();
        for (i, point) in points.iter().enumerate() {
            if i >= 1 {
                moments.push(returns[i]);
            }
            let Some(start) = starts[i] else {
                continue;
            };
            while first_return <= start && first_return <= i {
                moments.pop(returns[first_return]);
                first_return += 1;
            }
            if let Some(std_dev) = moments.std_dev() {
                output.push(VolatilityPoint {
                    timestamp: point.timestamp,
                    value: point.value,
                    volatility: Self::annualize(std_dev),
                });
            }
        }
        output
    }
}

/// Average ROI for one calendar month across all years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRoi {
    /// Calendar month, 1 through 12.
    pub month: u32,
    /// Mean ROI of every start in this month, `None` without samples.
    pub average_roi: Option<f64>,
    /// Number of (year, month) starts averaged.
    pub samples: usize,
}

/// ROI from each month's average price to the average `months_ahead` months later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyAverageRoi {
    months_ahead: usize,
}

impl MonthlyAverageRoi {
    /// Build a calculator looking `months_ahead` months forward.
    pub fn new(months_ahead: usize) -> IndicatorResult<Self> {
        Ok(Self {
            months_ahead: ensure_period("MonthlyAverageRoi", months_ahead)?,
        })
    }

    /// Average price per (year, month).
    pub fn monthly_averages(history: &TimeSeries) -> BTreeMap<(i32, u32), f64> {
        let mut buckets: BTreeMap<(i32, u32), Moments> = BTreeMap::new();
        for point in history.iter().filter(|p| p.value.is_finite()) {
            let key = (point.timestamp.year(), point.timestamp.month());
            buckets.entry(key).or_default().push(point.value);
        }
        buckets
            .into_iter()
            .filter_map(|(key, moments)| moments.mean().map(|mean| (key, mean)))
            .collect()
    }

    /// Twelve entries, January through December.
    pub fn compute(&self, history: &TimeSeries) -> Vec<MonthlyRoi> {
        let averages = Self::monthly_averages(history);
        let mut per_month: [Moments; 12] = [Moments::new(); 12];
        for (&(year, month), &start) in &averages {
            if start <= 0.0 {
                continue;
            }
            let target = shift_month(year, month, self.months_ahead);
            if let Some(end) = averages.get(&target) {
                per_month[(month - 1) as usize].push(end / start);
            }
        }
        per_month
            .iter()
            .enumerate()
            .map(|(idx, moments)| MonthlyRoi {
                month: idx as u32 + 1,
                average_roi: moments.mean(),
                samples: moments.count(),
            })
            .collect()
    }
}

fn shift_month(year: i32, month: u32, months: usize) -> (i32, u32) {
    let total = year as i64 * 12 + (month as i64 - 1) + months as i64;
    (total.div_euclid(12) as i32, total.rem_euclid(12) as u32 + 1)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(start: NaiveDate, values: &[f64]) -> TimeSeries {
        TimeSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
        .unwrap()
    }

    #[test]
    fn running_roi_over_five_days() {
        let values: Vec<f64> = (100..=110).map(f64::from).collect();
        let history = daily(ymd(2020, 1, 1), &values);
        let points = RunningRoi::new(5, WindowAnchor::ElapsedDays)
            .unwrap()
            .compute(&history);
        assert_eq!(points.len(), 6);
        let last = points.last().unwrap();
        assert_eq!(last.start, ymd(2020, 1, 6));
        assert!((last.roi - 110.0 / 105.0).abs() < 1e-12);
        assert!((last.roi - 1.0476).abs() < 1e-4);
    }

    #[test]
    fn elapsed_days_walk_handles_gaps() {
        let history = TimeSeries::from_pairs([
            (ymd(2020, 1, 1), 10.0),
            (ymd(2020, 1, 2), 11.0),
            (ymd(2020, 1, 9), 20.0),
            (ymd(2020, 1, 10), 22.0),
        ])
        .unwrap();
        let by_days = RunningRoi::new(7, WindowAnchor::ElapsedDays)
            .unwrap()
            .compute(&history);
        // 01-09 -> 01-02 (7 days), 01-10 -> 01-02 (8 days)
        assert_eq!(by_days.len(), 2);
        assert_eq!(by_days[0].start, ymd(2020, 1, 2));
        assert_eq!(by_days[1].start, ymd(2020, 1, 2));

        let by_offset = RunningRoi::new(2, WindowAnchor::FixedOffset)
            .unwrap()
            .compute(&history);
        assert_eq!(by_offset[0].start, ymd(2020, 1, 1));
        assert_eq!(by_offset[1].roi, 2.0);
    }

    #[test]
    fn volatility_anchors_agree_on_gapless_data() {
        let values: Vec<f64> = (0..120)
            .map(|i| 100.0 * (1.0 + 0.03 * ((i * 7 % 11) as f64 - 5.0) / 5.0))
            .collect();
        let history = daily(ymd(2021, 1, 1), &values);
        let by_days = HistoricalVolatility::new(30, WindowAnchor::ElapsedDays)
            .unwrap()
            .compute(&history);
        let by_offset = HistoricalVolatility::new(30, WindowAnchor::FixedOffset)
            .unwrap()
            .compute(&history);
        assert_eq!(by_days.len(), 90);
        assert_eq!(by_days.len(), by_offset.len());
        for (a, b) in by_days.iter().zip(&by_offset) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!((a.volatility - b.volatility).abs() < 1e-6);
        }
    }

    #[test]
    fn volatility_matches_direct_formula() {
        let values = [100.0, 110.0, 99.0, 105.0];
        let history = daily(ymd(2021, 1, 1), &values);
        let points = HistoricalVolatility::new(3, WindowAnchor::ElapsedDays)
            .unwrap()
            .compute(&history);
        assert_eq!(points.len(), 1);
        let returns: Vec<f64> = values.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let std = crate::window::population_std_dev(&returns).unwrap();
        assert!((points[0].volatility - std * 365f64.sqrt() * 100.0).abs() < 1e-9);
    }

    #[test]
    fn constant_prices_have_zero_volatility() {
        let history = daily(ymd(2021, 1, 1), &[50.0; 10]);
        let points = HistoricalVolatility::new(3, WindowAnchor::ElapsedDays)
            .unwrap()
            .compute(&history);
        assert!(points.iter().all(|p| p.volatility == 0.0));
    }

    #[test]
    fn monthly_average_roi_groups_by_calendar_month() {
        let mut pairs = Vec::new();
        // Jan 2020 avg 10, Feb 2020 avg 15, Jan 2021 avg 20, Feb 2021 avg 40.
        for (year, month, values) in [
            (2020, 1, [9.0, 11.0]),
            (2020, 2, [15.0, 15.0]),
            (2021, 1, [20.0, 20.0]),
            (2021, 2, [30.0, 50.0]),
        ] {
            for (day, value) in values.iter().enumerate() {
                pairs.push((ymd(year, month, day as u32 + 1), *value));
            }
        }
        let history = TimeSeries::from_pairs(pairs).unwrap();
        let result = MonthlyAverageRoi::new(1).unwrap().compute(&history);
        assert_eq!(result.len(), 12);
        // January starts: 15/10 and 40/20.
        assert_eq!(result[0].samples, 2);
        assert!((result[0].average_roi.unwrap() - 1.75).abs() < 1e-12);
        // February 2020 -> March 2020 has no data; Feb 2021 -> Mar 2021 neither.
        assert_eq!(result[1].samples, 0);
        assert_eq!(result[1].average_roi, None);

        let yearly = MonthlyAverageRoi::new(12).unwrap().compute(&history);
        assert!((yearly[0].average_roi.unwrap() - 2.0).abs() < 1e-12);
        assert!((yearly[1].average_roi.unwrap() - 40.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn monthly_roi_serializes_camel_case() {
        let month = MonthlyRoi {
            month: 3,
            average_roi: Some(1.5),
            samples: 4,
        };
        assert_eq!(
            serde_json::to_value(month).unwrap(),
            serde_json::json!({ "month": 3, "averageRoi": 1.5, "samples": 4 })
        );
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(shift_month(2020, 11, 3), (2021, 2));
        assert_eq!(shift_month(2020, 1, 12), (2021, 1));
        assert_eq!(shift_month(2020, 12, 1), (2021, 1));
    }
}

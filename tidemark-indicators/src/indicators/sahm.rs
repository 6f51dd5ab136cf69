//! Sahm Rule recession indicator over a monthly unemployment rate.

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::TimeSeries;
use tracing::debug;

use crate::window::{rolling_mean, rolling_min};

/// One month of the Sahm Rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SahmPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Unemployment rate.
    pub value: f64,
    /// Mean of the last three observations.
    pub three_month_avg: f64,
    /// Lowest single observation of the last twelve.
    pub min_trailing_12: f64,
    /// `three_month_avg - min_trailing_12`.
    pub sahm: f64,
}

derived_point!(SahmPoint {
    value => "value",
    three_month_avg => "threeMonthAvg",
    min_trailing_12 => "minTrailing12",
    sahm => "sahm",
});

/// Sahm Rule calculator. A reading of 0.5 or more has historically marked the onset of a recession.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SahmRule;

impl SahmRule {
    /// Observations averaged for the short-term rate.
    pub const SHORT_WINDOW: usize = 3;
    /// Observations the trailing minimum is taken over, current month included.
    pub const LOOKBACK: usize = 12;
    /// Signal threshold.
    pub const TRIGGER: f64 = 0.5;

    /// Earliest month considered.
    pub fn floor() -> NaiveDate {
        NaiveDate::from_ymd_opt(1948, 12, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Whether a reading triggers the rule.
    pub fn triggered(point: &SahmPoint) -> bool {
        point.sahm >= Self::TRIGGER
    }

    /// Compute the rule for every month with a full year of history.
    pub fn compute(&self, unemployment: &TimeSeries) -> Vec<SahmPoint> {
        let usable = unemployment
            .since(Self::floor())
            .filter(|p| p.value.is_finite());
        if usable.len() < Self::LOOKBACK {
            debug!(
                points = usable.len(),
                required = Self::LOOKBACK,
                "not enough data for sahm rule"
            );
            return Vec::new();
        }
        let values = usable.values();
        let (Ok(short), Ok(minima)) = (
            rolling_mean(&values, Self::SHORT_WINDOW),
            rolling_min(&values, Self::LOOKBACK),
        ) else {
            return Vec::new();
        };

        usable
            .iter()
            .zip(short.into_iter().zip(minima))
            .skip(Self::LOOKBACK - 1)
            .filter_map(|(point, (three_month_avg, min_trailing_12))| {
                let min_trailing_12 = min_trailing_12?;
                Some(SahmPoint {
                    timestamp: point.timestamp,
                    value: point.value,
                    three_month_avg,
                    min_trailing_12,
                    sahm: three_month_avg - min_trailing_12,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Months;

    use super::*;

    fn monthly(start: NaiveDate, values: &[f64]) -> TimeSeries {
        TimeSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Months::new(i as u32), *v)),
        )
        .unwrap()
    }

    #[test]
    fn rising_unemployment_after_flat_year() {
        let mut values = vec![4.0; 12];
        values.push(5.0);
        let points = SahmRule.compute(&monthly(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), &values));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].sahm, 0.0);
        let last = points[1];
        assert!((last.three_month_avg - 13.0 / 3.0).abs() < 1e-12);
        assert_eq!(last.min_trailing_12, 4.0);
        assert!((last.sahm - 1.0 / 3.0).abs() < 1e-9);
        assert!(!SahmRule::triggered(&last));
    }

    #[test]
    fn first_output_needs_twelve_observations() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert!(SahmRule.compute(&monthly(start, &[4.0; 11])).is_empty());
        let points = SahmRule.compute(&monthly(start, &[4.0; 12]));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, NaiveDate::from_ymd_opt(2000, 12, 1).unwrap());
    }

    #[test]
    fn months_before_floor_are_ignored() {
        let start = NaiveDate::from_ymd_opt(1948, 1, 1).unwrap();
        // 11 months before the floor, 12 from it.
        let mut values = vec![20.0; 11];
        values.extend([3.0; 12]);
        let points = SahmRule.compute(&monthly(start, &values));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].min_trailing_12, 3.0);
        assert_eq!(points[0].sahm, 0.0);
    }

    #[test]
    fn sharp_rise_triggers() {
        let start = NaiveDate::from_ymd_opt(2007, 1, 1).unwrap();
        let values = [
            4.4, 4.5, 4.4, 4.5, 4.4, 4.6, 4.7, 4.6, 4.7, 4.7, 4.7, 5.0, 5.0, 4.9, 5.1, 5.0,
            5.4, 5.6, 5.8, 6.1,
        ];
        let points = SahmRule.compute(&monthly(start, &values));
        let last = points.last().unwrap();
        assert!(SahmRule::triggered(last), "sahm = {}", last.sahm);
    }
}

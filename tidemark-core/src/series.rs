use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{SeriesError, SeriesResult};

/// Single daily observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp: NaiveDate, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered daily observations with strictly ascending timestamps.
///
/// Values may be NaN. Calculators that cannot tolerate missing values call
/// [`TimeSeries::finite`] before computing anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    points: Vec<TimePoint>,
}

impl TimeSeries {
    /// Build a series, rejecting points that are not strictly ascending.
    pub fn new(points: Vec<TimePoint>) -> SeriesResult<Self> {
        for (index, pair) in points.windows(2).enumerate() {
            let (previous, current) = (pair[0].timestamp, pair[1].timestamp);
            if current == previous {
                return Err(SeriesError::Duplicate {
                    index: index + 1,
                    date: current,
                });
            }
            if current < previous {
                return Err(SeriesError::Unordered {
                    index: index + 1,
                    previous,
                    current,
                });
            }
        }
        Ok(Self { points })
    }

    /// Build a series from `(date, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> SeriesResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(timestamp, value)| TimePoint { timestamp, value })
                .collect(),
        )
    }

    /// Only used by the aligner, which sorts and de-duplicates first.
    pub(crate) fn from_sorted(points: Vec<TimePoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { points }
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimePoint> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&TimePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// Copy of the raw values in order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Value recorded for `date`, if any.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.timestamp)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    /// New series restricted to finite values.
    pub fn finite(&self) -> TimeSeries {
        self.filter(|p| p.value.is_finite())
    }

    /// New series restricted to points matching `keep`. Order is preserved.
    pub fn filter<F>(&self, mut keep: F) -> TimeSeries
    where
        F: FnMut(&TimePoint) -> bool,
    {
        Self {
            points: self.points.iter().copied().filter(|p| keep(p)).collect(),
        }
    }

    /// Points on or after `date`.
    pub fn since(&self, date: NaiveDate) -> TimeSeries {
        let start = self.points.partition_point(|p| p.timestamp < date);
        Self {
            points: self.points[start..].to_vec(),
        }
    }

    /// Points up to and including index `end`.
    pub fn prefix(&self, end: usize) -> TimeSeries {
        let end = (end + 1).min(self.points.len());
        Self {
            points: self.points[..end].to_vec(),
        }
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a TimePoint;
    type IntoIter = std::slice::Iter<'a, TimePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<'de> Deserialize<'de> for TimeSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let points = Vec::<TimePoint>::deserialize(deserializer)?;
        TimeSeries::new(points).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn rejects_unordered_points() {
        let err = TimeSeries::from_pairs([(date(2), 1.0), (date(1), 2.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::Unordered { index: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_days() {
        let err = TimeSeries::from_pairs([(date(1), 1.0), (date(1), 2.0)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::Duplicate {
                index: 1,
                date: date(1)
            }
        );
    }

    #[test]
    fn finite_drops_nan_but_keeps_order() {
        let series =
            TimeSeries::from_pairs([(date(1), 1.0), (date(2), f64::NAN), (date(3), 3.0)]).unwrap();
        let finite = series.finite();
        assert_eq!(finite.dates(), vec![date(1), date(3)]);
        assert_eq!(series.value_at(date(3)), Some(3.0));
        assert_eq!(series.value_at(date(4)), None);
    }

    #[test]
    fn since_and_prefix_slice_by_date_and_index() {
        let series =
            TimeSeries::from_pairs((1..=5).map(|d| (date(d), d as f64))).unwrap();
        assert_eq!(series.since(date(4)).values(), vec![4.0, 5.0]);
        assert_eq!(series.prefix(1).values(), vec![1.0, 2.0]);
        assert_eq!(series.prefix(99).len(), 5);
    }

    #[test]
    fn deserializing_validates_order() {
        let json = r#"[{"time":"2024-01-02","value":1.0},{"time":"2024-01-01","value":2.0}]"#;
        assert!(serde_json::from_str::<TimeSeries>(json).is_err());
    }
}

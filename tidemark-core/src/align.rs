//! Normalization and date alignment of upstream series.
//!
//! Malformed entries never abort a computation: they are logged, counted in a
//! [`NormalizeReport`] and dropped before any calculator sees them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::raw::{MetricPoint, RawPoint, RawTime, RawValue};
use crate::series::{TimePoint, TimeSeries};

/// Counters describing what normalization removed from a raw series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub invalid_time: usize,
    pub invalid_value: usize,
    pub duplicates: usize,
}

impl NormalizeReport {
    pub fn dropped(&self) -> usize {
        self.invalid_time + self.invalid_value + self.duplicates
    }
}

/// Turn raw `{time, value}` records into a sorted, de-duplicated series.
///
/// Entries with unparseable dates or non-finite values are dropped. When a
/// calendar day appears more than once the last occurrence wins.
pub fn normalize(name: &str, raw: &[RawPoint]) -> (TimeSeries, NormalizeReport) {
    normalize_entries(name, raw.iter().map(|point| (&point.time, &point.value)))
}

fn normalize_entries<'a, I>(name: &str, entries: I) -> (TimeSeries, NormalizeReport)
where
    I: Iterator<Item = (&'a RawTime, &'a RawValue)>,
{
    let mut report = NormalizeReport::default();
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for (index, (time, value)) in entries.enumerate() {
        let Some(date) = time.to_date() else {
            debug!(series = name, index, time = ?time, "dropping point with unparseable time");
            report.invalid_time += 1;
            continue;
        };
        let Some(value) = value.to_finite() else {
            debug!(series = name, index, %date, "dropping point with non-finite value");
            report.invalid_value += 1;
            continue;
        };
        if by_day.insert(date, value).is_some() {
            report.duplicates += 1;
        }
    }

    report.accepted = by_day.len();
    if report.dropped() > 0 {
        debug!(
            series = name,
            accepted = report.accepted,
            invalid_time = report.invalid_time,
            invalid_value = report.invalid_value,
            duplicates = report.duplicates,
            "normalized series with dropped entries"
        );
    }
    if report.accepted == 0 && report.dropped() > 0 {
        warn!(series = name, "every entry of the series was rejected");
    }

    let points = by_day
        .into_iter()
        .map(|(timestamp, value)| TimePoint { timestamp, value })
        .collect();
    (TimeSeries::from_sorted(points), report)
}

/// Group `{time, metric, value}` rows into one normalized series per metric.
pub fn split_metrics(rows: &[MetricPoint]) -> BTreeMap<String, TimeSeries> {
    let mut grouped: BTreeMap<&str, Vec<&MetricPoint>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.metric.as_str()).or_default().push(row);
    }
    grouped
        .into_iter()
        .map(|(metric, rows)| {
            let (series, _) =
                normalize_entries(metric, rows.iter().map(|row| (&row.time, &row.value)));
            (metric.to_string(), series)
        })
        .collect()
}

/// Row of an [`AlignedFrame`]: one calendar day and one optional value per input series.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub timestamp: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Several series laid out on the union of their dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedFrame {
    rows: Vec<AlignedRow>,
    width: usize,
}

impl AlignedFrame {
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of aligned series.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|row| row.timestamp).collect()
    }

    /// Values of one input series on the shared axis.
    pub fn column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.values.get(index).copied().flatten())
            .collect()
    }

    /// Rows where every series has a value.
    pub fn complete_rows(&self) -> impl Iterator<Item = (NaiveDate, Vec<f64>)> + '_ {
        self.rows.iter().filter_map(|row| {
            let values: Option<Vec<f64>> = row.values.iter().copied().collect();
            values.map(|values| (row.timestamp, values))
        })
    }
}

/// Align series by exact calendar day over the union of their dates.
///
/// A day missing from one series yields `None` in that column.
pub fn align(series: &[&TimeSeries]) -> AlignedFrame {
    let dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.iter().map(|p| p.timestamp))
        .collect();

    let mut cursors = vec![0usize; series.len()];
    let mut rows = Vec::with_capacity(dates.len());
    for date in dates {
        let mut values = Vec::with_capacity(series.len());
        for (column, s) in series.iter().enumerate() {
            let points = s.points();
            let cursor = &mut cursors[column];
            let value = match points.get(*cursor) {
                Some(point) if point.timestamp == date => {
                    *cursor += 1;
                    Some(point.value)
                }
                _ => None,
            };
            values.push(value);
        }
        rows.push(AlignedRow {
            timestamp: date,
            values,
        });
    }

    AlignedFrame {
        rows,
        width: series.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalize_sorts_and_drops_invalid_entries() {
        let raw = vec![
            RawPoint::new("2023-01-03", 3.0),
            RawPoint::new("2023-01-01", 1.0),
            RawPoint::new("not a date", 9.0),
            RawPoint::new("2023-01-02", "abc"),
            RawPoint::new("2023-01-04", f64::NAN),
            RawPoint::new("2023-01-01", 1.5),
        ];
        let (series, report) = normalize("btc", &raw);
        assert_eq!(series.dates(), vec![ymd(2023, 1, 1), ymd(2023, 1, 3)]);
        assert_eq!(series.values(), vec![1.5, 3.0]);
        assert_eq!(
            report,
            NormalizeReport {
                accepted: 2,
                invalid_time: 1,
                invalid_value: 2,
                duplicates: 1,
            }
        );
        assert_eq!(report.dropped(), 4);
    }

    #[test]
    fn align_fills_missing_days_with_none() {
        let price = TimeSeries::from_pairs([
            (ymd(2023, 1, 1), 10.0),
            (ymd(2023, 1, 2), 11.0),
            (ymd(2023, 1, 3), 12.0),
        ])
        .unwrap();
        let sentiment =
            TimeSeries::from_pairs([(ymd(2023, 1, 2), 55.0), (ymd(2023, 1, 4), 60.0)]).unwrap();

        let frame = align(&[&price, &sentiment]);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.column(0), vec![Some(10.0), Some(11.0), Some(12.0), None]);
        assert_eq!(frame.column(1), vec![None, Some(55.0), None, Some(60.0)]);

        let complete: Vec<_> = frame.complete_rows().collect();
        assert_eq!(complete, vec![(ymd(2023, 1, 2), vec![11.0, 55.0])]);
    }

    #[test]
    fn split_metrics_groups_by_name() {
        let rows = vec![
            MetricPoint {
                time: "2023-01-02".into(),
                metric: "mvrv".into(),
                value: 1.2.into(),
            },
            MetricPoint {
                time: "2023-01-01".into(),
                metric: "mvrv".into(),
                value: 1.1.into(),
            },
            MetricPoint {
                time: "2023-01-01".into(),
                metric: "issuance_usd".into(),
                value: "900".into(),
            },
            MetricPoint {
                time: "bogus".into(),
                metric: "issuance_usd".into(),
                value: 1.0.into(),
            },
        ];
        let metrics = split_metrics(&rows);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["mvrv"].values(), vec![1.1, 1.2]);
        assert_eq!(metrics["issuance_usd"].values(), vec![900.0]);
    }
}

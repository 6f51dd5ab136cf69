//! Loosely typed payloads as delivered by upstream data feeds.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp as it arrives from a feed: an ISO string or epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Epoch(i64),
    EpochFloat(f64),
    Text(String),
}

impl RawTime {
    /// Calendar day in UTC, or `None` when the timestamp cannot be parsed.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            RawTime::Epoch(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.date_naive()),
            RawTime::EpochFloat(secs) => {
                if !secs.is_finite() {
                    return None;
                }
                DateTime::from_timestamp(secs.floor() as i64, 0).map(|dt| dt.date_naive())
            }
            RawTime::Text(text) => parse_date_text(text.trim()),
        }
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    // Some feeds encode epoch seconds as strings.
    text.parse::<i64>()
        .ok()
        .and_then(|secs| RawTime::Epoch(secs).to_date())
}

impl From<&str> for RawTime {
    fn from(value: &str) -> Self {
        RawTime::Text(value.to_string())
    }
}

impl From<String> for RawTime {
    fn from(value: String) -> Self {
        RawTime::Text(value)
    }
}

impl From<i64> for RawTime {
    fn from(value: i64) -> Self {
        RawTime::Epoch(value)
    }
}

impl From<NaiveDate> for RawTime {
    fn from(value: NaiveDate) -> Self {
        RawTime::Text(value.format("%Y-%m-%d").to_string())
    }
}

/// Observation value as it arrives from a feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl RawValue {
    /// Finite numeric value, or `None` for anything unusable.
    pub fn to_finite(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(value) => *value,
            RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
            RawValue::Missing => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RawValue::Missing, RawValue::Number)
    }
}

/// `{time, value}` record of a single upstream series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub time: RawTime,
    #[serde(default)]
    pub value: RawValue,
}

impl RawPoint {
    pub fn new(time: impl Into<RawTime>, value: impl Into<RawValue>) -> Self {
        Self {
            time: time.into(),
            value: value.into(),
        }
    }
}

/// `{time, metric, value}` record of an on-chain feed carrying several metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub time: RawTime,
    pub metric: String,
    #[serde(default)]
    pub value: RawValue,
}

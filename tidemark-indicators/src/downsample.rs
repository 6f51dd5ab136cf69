//! Bucketed averaging for display-sized output.

use std::collections::BTreeMap;

use tidemark_core::{DerivedPoint, DerivedSeries};
use tracing::debug;

use crate::core::{ensure_period, IndicatorResult};
use crate::window::Moments;

/// Averages consecutive points into buckets once a series gets long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downsampler {
    factor: usize,
    threshold: usize,
}

impl Downsampler {
    /// Points per bucket.
    pub const DEFAULT_FACTOR: usize = 5;
    /// Series with at most this many points are returned unchanged.
    pub const DEFAULT_THRESHOLD: usize = 200;

    /// Build a downsampler with a custom bucket size and threshold.
    pub fn new(factor: usize, threshold: usize) -> IndicatorResult<Self> {
        Ok(Self {
            factor: ensure_period("Downsampler", factor)?,
            threshold,
        })
    }

    /// Points per bucket.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Downsample `points`.
    ///
    /// Each bucket takes the timestamp of its first point and the mean of every
    /// field present in the bucket.
    pub fn apply(&self, points: &[DerivedPoint]) -> DerivedSeries {
        if points.len() <= self.threshold {
            return points.to_vec();
        }
        let mut output: DerivedSeries = points.chunks(self.factor).map(average_bucket).collect();
        append_last_point(&mut output, points);
        debug!(
            input = points.len(),
            output = output.len(),
            factor = self.factor,
            "downsampled series"
        );
        output
    }
}

impl Default for Downsampler {
    fn default() -> Self {
        Self {
            factor: Self::DEFAULT_FACTOR,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

/// Downsample with the default bucket size and threshold.
pub fn downsample(points: &[DerivedPoint]) -> DerivedSeries {
    Downsampler::default().apply(points)
}

fn average_bucket(bucket: &[DerivedPoint]) -> DerivedPoint {
    let mut fields: BTreeMap<&str, Moments> = BTreeMap::new();
    for point in bucket {
        for (name, value) in &point.fields {
            if value.is_finite() {
                fields.entry(name.as_str()).or_default().push(*value);
            }
        }
    }
    let mut averaged = DerivedPoint::new(bucket[0].timestamp);
    for (name, moments) in fields {
        if let Some(mean) = moments.mean() {
            averaged.insert(name, mean);
        }
    }
    averaged
}

/// Appends the original last point after the buckets.
///
/// The last point is already part of the final bucket, so it is counted twice.
/// Charts built on this output expect the latest raw observation as the final
/// entry.
fn append_last_point(output: &mut DerivedSeries, points: &[DerivedPoint]) {
    if let Some(last) = points.last() {
        output.push(last.clone());
    }
}

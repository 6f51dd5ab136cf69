//! Local-peak detection and next-peak extrapolation (MVRV style).

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::{DerivedPoint, TimeSeries};
use tracing::debug;

use crate::core::{ensure_finite, ensure_period, IndicatorResult};
use crate::window::rolling_max;

/// Detected local peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakRecord {
    /// Date of the peak.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Peak value.
    pub value: f64,
}

/// Result of projecting the next peak from the detected ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakProjection {
    /// Peaks in chronological order.
    pub peaks: Vec<PeakRecord>,
    /// Mean fractional decrease between consecutive peaks, `0` with a single peak.
    pub avg_decrease: f64,
    /// `last_peak * (1 - avg_decrease)`.
    pub projected_peak: f64,
}

/// Projection available on a given date using only data up to that date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPeakPoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value.
    pub value: f64,
    /// Projected next peak, if any peak was confirmed by this date.
    pub projected_peak: Option<f64>,
}

impl From<&ProjectedPeakPoint> for DerivedPoint {
    fn from(point: &ProjectedPeakPoint) -> Self {
        let derived = DerivedPoint::new(point.timestamp).with("value", point.value);
        match point.projected_peak {
            Some(peak) => derived.with("projectedPeak", peak),
            None => derived,
        }
    }
}

/// Detects peaks that dominate a symmetric window and extrapolates the next one.
///
/// The projection is a heuristic that must reproduce historical outputs, so the
/// window, the strict threshold and the tie rule (a point equal to its
/// neighbourhood maximum counts as a peak) are fixed semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakProjector {
    window: usize,
    threshold: f64,
}

impl PeakProjector {
    /// Half-width of the neighbourhood a peak must dominate.
    pub const DEFAULT_WINDOW: usize = 90;
    /// Peaks must be strictly above this value.
    pub const DEFAULT_THRESHOLD: f64 = 2.0;

    /// Build a projector with a custom half-window and threshold.
    pub fn new(window: usize, threshold: f64) -> IndicatorResult<Self> {
        Ok(Self {
            window: ensure_period("PeakProjector", window)?,
            threshold: ensure_finite("PeakProjector", "threshold", threshold)?,
        })
    }

    /// Minimum number of finite points required to detect anything.
    pub fn min_points(&self) -> usize {
        2 * self.window + 1
    }

    /// Indices (into `values`) of every peak.
    ///
    /// `i` is a peak when `values[i] >= max(values[i-w ..= i+w])` and
    /// `values[i] > threshold`. The neighbourhood maximum is read from a
    /// growing-window maximum of width `2w + 1` evaluated at `i + w`.
    fn peak_indices(&self, values: &[f64]) -> Vec<usize> {
        let n = values.len();
        if n < self.min_points() {
            return Vec::new();
        }
        let span = 2 * self.window + 1;
        let Ok(maxima) = rolling_max(values, span) else {
            return Vec::new();
        };
        (self.window..n - self.window)
            .filter(|&i| {
                let value = values[i];
                value > self.threshold
                    && maxima[i + self.window].map_or(false, |max| value >= max)
            })
            .collect()
    }

    /// All peaks of the finite part of `history`.
    pub fn detect(&self, history: &TimeSeries) -> Vec<PeakRecord> {
        let finite = history.finite();
        let values = finite.values();
        self.peak_indices(&values)
            .into_iter()
            .map(|i| {
                let point = finite.points()[i];
                PeakRecord {
                    timestamp: point.timestamp,
                    value: point.value,
                }
            })
            .collect()
    }

    /// Project the next peak over the full history.
    ///
    /// `None` when the history is shorter than [`Self::min_points`] or holds no peak.
    pub fn project(&self, history: &TimeSeries) -> Option<PeakProjection> {
        let peaks = self.detect(history);
        let Some(last) = peaks.last().copied() else {
            debug!(
                points = history.len(),
                required = self.min_points(),
                "no peak available for projection"
            );
            return None;
        };
        let avg_decrease = average_decrease(peaks.iter().map(|p| p.value));
        Some(PeakProjection {
            projected_peak: last.value * (1.0 - avg_decrease),
            avg_decrease,
            peaks,
        })
    }

    /// For every finite point, the projection computed from data up to and including it.
    ///
    /// A peak at `i` only depends on `[i-w, i+w]`, so it becomes known at index
    /// `i + w`. Walking the full peak list in that order gives the same answer
    /// as re-running [`Self::project`] on each prefix, in a single pass.
    pub fn project_to_date(&self, history: &TimeSeries) -> Vec<ProjectedPeakPoint> {
        let finite = history.finite();
        let values = finite.values();
        let peaks = self.peak_indices(&values);

        let mut next_peak = 0;
        let mut last: Option<f64> = None;
        let mut decrease_sum = 0.0;
        let mut decrease_count = 0usize;

        finite
            .iter()
            .enumerate()
            .map(|(k, point)| {
                while next_peak < peaks.len() && peaks[next_peak] + self.window <= k {
                    let value = values[peaks[next_peak]];
                    if let Some(previous) = last {
                        decrease_sum += (previous - value) / previous;
                        decrease_count += 1;
                    }
                    last = Some(value);
                    next_peak += 1;
                }
                let avg = if decrease_count == 0 {
                    0.0
                } else {
                    decrease_sum / decrease_count as f64
                };
                ProjectedPeakPoint {
                    timestamp: point.timestamp,
                    value: point.value,
                    projected_peak: last.map(|peak| peak * (1.0 - avg)),
                }
            })
            .collect()
    }
}

impl Default for PeakProjector {
    fn default() -> Self {
        Self {
            window: Self::DEFAULT_WINDOW,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

/// Mean of `(peak[k-1] - peak[k]) / peak[k-1]`, or `0` with fewer than two peaks.
fn average_decrease(peaks: impl Iterator<Item = f64>) -> f64 {
    let mut previous: Option<f64> = None;
    let mut sum = 0.0;
    let mut count = 0usize;
    for peak in peaks {
        if let Some(prev) = previous {
            sum += (prev - peak) / prev;
            count += 1;
        }
        previous = Some(peak);
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

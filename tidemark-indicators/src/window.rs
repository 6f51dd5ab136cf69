//! Rolling-window statistics.
//!
//! Every window here "grows" at the start of a series: index `i` covers
//! `values[max(0, i + 1 - window) ..= i]`, so the first `window - 1` outputs
//! use a shorter window instead of being undefined. Historical indicator
//! values depend on this, so all calculators share these primitives.
//!
//! Statistics are population statistics (divide by `n`). Accumulators are
//! incremental, so a full pass is O(n) regardless of the window length.

use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::core::{ensure_period, Indicator, IndicatorResult, Input};

/// Running count, sum and sum of squares supporting removal.
///
/// Sums are kept relative to a shift, the first value pushed while empty, so
/// the variance of values far from zero does not cancel away.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    count: usize,
    shift: f64,
    sum: f64,
    sum_of_squares: f64,
}

impl Moments {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value.
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.shift = value;
        }
        let delta = value - self.shift;
        self.count += 1;
        self.sum += delta;
        self.sum_of_squares += delta * delta;
    }

    /// Remove a value previously pushed. Popping an empty accumulator is a no-op.
    pub fn pop(&mut self, value: f64) {
        if self.count == 0 {
            return;
        }
        self.count -= 1;
        if self.count == 0 {
            *self = Self::default();
            return;
        }
        let delta = value - self.shift;
        self.sum -= delta;
        self.sum_of_squares -= delta * delta;
    }

    /// Number of values currently accumulated.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.shift + self.sum / self.count as f64)
    }

    /// Population variance, clamped at zero against rounding.
    pub fn variance(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean_delta = self.sum / n;
        let variance = self.sum_of_squares / n - mean_delta * mean_delta;
        Some(variance.max(0.0))
    }

    /// Population standard deviation, `None` when empty.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl FromIterator<f64> for Moments {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut moments = Moments::new();
        for value in iter {
            moments.push(value);
        }
        moments
    }
}

/// Arithmetic mean of a slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation of a slice (two-pass).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Growing-window moving average.
#[derive(Debug, Clone)]
pub struct RollingMean<I = f64> {
    window: SlidingWindow,
    marker: PhantomData<I>,
}

impl<I> RollingMean<I>
where
    I: Input,
{
    /// Mean over the last `period` values; errors when `period` is zero.
    pub fn new(period: usize) -> IndicatorResult<Self> {
        Ok(Self {
            window: SlidingWindow::new(ensure_period("RollingMean", period)?),
            marker: PhantomData,
        })
    }

    /// Window length.
    pub fn period(&self) -> usize {
        self.window.period
    }
}

impl<I> Indicator for RollingMean<I>
where
    I: Input,
{
    type Input = I;
    type Output = f64;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        self.window.push(input.value()).mean()
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Growing-window population standard deviation.
#[derive(Debug, Clone)]
pub struct RollingStdDev<I = f64> {
    window: SlidingWindow,
    marker: PhantomData<I>,
}

impl<I> RollingStdDev<I>
where
    I: Input,
{
    /// Standard deviation over the last `period` values; errors when `period` is zero.
    pub fn new(period: usize) -> IndicatorResult<Self> {
        Ok(Self {
            window: SlidingWindow::new(ensure_period("RollingStdDev", period)?),
            marker: PhantomData,
        })
    }
}

impl<I> Indicator for RollingStdDev<I>
where
    I: Input,
{
    type Input = I;
    type Output = f64;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        self.window.push(input.value()).std_dev()
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Bounded window of raw values with matching moments.
///
/// The moments are rebuilt from the stored values once every `period`
/// updates, which bounds the rounding drift of repeated push and pop.
#[derive(Debug, Clone)]
struct SlidingWindow {
    period: usize,
    values: VecDeque<f64>,
    moments: Moments,
    updates: usize,
}

impl SlidingWindow {
    fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
            moments: Moments::new(),
            updates: 0,
        }
    }

    fn push(&mut self, value: f64) -> &Moments {
        self.values.push_back(value);
        self.moments.push(value);
        if self.values.len() > self.period {
            if let Some(oldest) = self.values.pop_front() {
                self.moments.pop(oldest);
            }
        }
        self.updates += 1;
        if self.updates >= self.period {
            self.moments = self.values.iter().copied().collect();
            self.updates = 0;
        }
        &self.moments
    }

    fn clear(&mut self) {
        self.values.clear();
        self.moments = Moments::new();
        self.updates = 0;
    }
}

/// Population standard deviation of the log returns inside a growing window.
///
/// A window of `period` points holds at most `period - 1` returns. Returns
/// that are not finite (non-positive prices) are left out of the statistic.
#[derive(Debug, Clone)]
pub struct RollingLogReturnStdDev<I = f64> {
    period: usize,
    position: usize,
    previous: Option<f64>,
    moments: Moments,
    returns: VecDeque<(usize, f64)>,
    marker: PhantomData<I>,
}

impl<I> RollingLogReturnStdDev<I>
where
    I: Input,
{
    /// Log-return dispersion over the last `period` points; errors when `period` is zero.
    pub fn new(period: usize) -> IndicatorResult<Self> {
        let period = ensure_period("RollingLogReturnStdDev", period)?;
        Ok(Self {
            period,
            position: 0,
            previous: None,
            moments: Moments::new(),
            returns: VecDeque::with_capacity(period),
            marker: PhantomData,
        })
    }
}

impl<I> Indicator for RollingLogReturnStdDev<I>
where
    I: Input,
{
    type Input = I;
    type Output = f64;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        let value = input.value();
        let position = self.position;
        self.position += 1;

        if let Some(previous) = self.previous.replace(value) {
            let log_return = (value / previous).ln();
            if log_return.is_finite() {
                self.returns.push_back((position, log_return));
                self.moments.push(log_return);
            }
        }

        // A return at position k spans points k-1 and k; both must be in the window.
        let first_point = (position + 1).saturating_sub(self.period);
        while let Some(&(k, r)) = self.returns.front() {
            if k >= first_point + 1 {
                break;
            }
            self.returns.pop_front();
            self.moments.pop(r);
        }
        self.moments.std_dev()
    }

    fn reset(&mut self) {
        self.position = 0;
        self.previous = None;
        self.moments = Moments::new();
        self.returns.clear();
    }
}

/// Which extreme a [`RollingExtremum`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    /// Largest value in the window.
    Max,
    /// Smallest value in the window.
    Min,
}

/// Growing-window maximum or minimum backed by a monotonic deque.
///
/// NaN inputs occupy a window slot but can never be the extreme.
#[derive(Debug, Clone)]
pub struct RollingExtremum<I = f64> {
    period: usize,
    kind: Extremum,
    position: usize,
    deque: VecDeque<(usize, f64)>,
    marker: PhantomData<I>,
}

impl<I> RollingExtremum<I>
where
    I: Input,
{
    /// Track `kind` over the last `period` values; errors when `period` is zero.
    pub fn new(period: usize, kind: Extremum) -> IndicatorResult<Self> {
        let period = ensure_period("RollingExtremum", period)?;
        Ok(Self {
            period,
            kind,
            position: 0,
            deque: VecDeque::with_capacity(period),
            marker: PhantomData,
        })
    }

    /// Rolling maximum.
    pub fn max(period: usize) -> IndicatorResult<Self> {
        Self::new(period, Extremum::Max)
    }

    /// Rolling minimum.
    pub fn min(period: usize) -> IndicatorResult<Self> {
        Self::new(period, Extremum::Min)
    }

    fn dominates(&self, candidate: f64, existing: f64) -> bool {
        match self.kind {
            Extremum::Max => candidate >= existing,
            Extremum::Min => candidate <= existing,
        }
    }
}

impl<I> Indicator for RollingExtremum<I>
where
    I: Input,
{
    type Input = I;
    type Output = f64;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        let value = input.value();
        let position = self.position;
        self.position += 1;

        if !value.is_nan() {
            while let Some(&(_, back)) = self.deque.back() {
                if self.dominates(value, back) {
                    self.deque.pop_back();
                } else {
                    break;
                }
            }
            self.deque.push_back((position, value));
        }

        let first = (position + 1).saturating_sub(self.period);
        while let Some(&(k, _)) = self.deque.front() {
            if k >= first {
                break;
            }
            self.deque.pop_front();
        }
        self.deque.front().map(|&(_, v)| v)
    }

    fn reset(&mut self) {
        self.position = 0;
        self.deque.clear();
    }
}

/// Growing-window mean of every element of `values`.
pub fn rolling_mean(values: &[f64], window: usize) -> IndicatorResult<Vec<f64>> {
    let mut indicator = RollingMean::<f64>::new(window)?;
    Ok(values
        .iter()
        .map(|v| indicator.next(*v).unwrap_or(0.0))
        .collect())
}

/// Growing-window population standard deviation of every element of `values`.
pub fn rolling_std_dev(values: &[f64], window: usize) -> IndicatorResult<Vec<f64>> {
    let mut indicator = RollingStdDev::<f64>::new(window)?;
    Ok(values
        .iter()
        .map(|v| indicator.next(*v).unwrap_or(0.0))
        .collect())
}

/// Growing-window standard deviation of log returns; `None` where the window holds no return.
pub fn rolling_log_return_std_dev(
    values: &[f64],
    window: usize,
) -> IndicatorResult<Vec<Option<f64>>> {
    let mut indicator = RollingLogReturnStdDev::<f64>::new(window)?;
    Ok(values.iter().map(|v| indicator.next(*v)).collect())
}

/// Growing-window maximum; `None` where the window holds only NaN.
pub fn rolling_max(values: &[f64], window: usize) -> IndicatorResult<Vec<Option<f64>>> {
    let mut indicator = RollingExtremum::<f64>::max(window)?;
    Ok(values.iter().map(|v| indicator.next(*v)).collect())
}

/// Growing-window minimum; `None` where the window holds only NaN.
pub fn rolling_min(values: &[f64], window: usize) -> IndicatorResult<Vec<Option<f64>>> {
    let mut indicator = RollingExtremum::<f64>::min(window)?;
    Ok(values.iter().map(|v| indicator.next(*v)).collect())
}

/// Infallible growing mean for calculators whose windows were validated at construction.
pub(crate) fn growing_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling_mean(values, window.max(1)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndicatorError;

    fn assert_close(lhs: f64, rhs: f64) {
        assert!((lhs - rhs).abs() <= 1e-9, "{lhs} != {rhs}");
    }

    /// Deterministic pseudo-random walk used to avoid hand-picked fixtures.
    fn walk(len: usize) -> Vec<f64> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut price = 100.0;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let step = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
                price *= 1.0 + step * 0.05;
                price
            })
            .collect()
    }

    #[test]
    fn rolling_mean_matches_direct_recomputation() {
        let values = walk(600);
        for window in [1, 5, 200, 374] {
            let rolled = rolling_mean(&values, window).unwrap();
            for i in [0usize, 1, 3, 17, 199, 200, 373, 374, 451, 599] {
                let start = (i + 1).saturating_sub(window);
                let expected = mean(&values[start..=i]).unwrap();
                assert_close(rolled[i], expected);
            }
        }
    }

    #[test]
    fn growing_window_starts_with_partial_averages() {
        let rolled = rolling_mean(&[2.0, 4.0, 6.0, 8.0], 3).unwrap();
        assert_eq!(rolled, vec![2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn rolling_std_dev_uses_population_statistics() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let rolled = rolling_std_dev(&values, 8).unwrap();
        assert_close(rolled[7], 2.0);
        assert_close(rolled[0], 0.0);

        let values = walk(300);
        let rolled = rolling_std_dev(&values, 30).unwrap();
        for i in [10usize, 29, 30, 150, 299] {
            let start = (i + 1).saturating_sub(30);
            let expected = population_std_dev(&values[start..=i]).unwrap();
            assert!((rolled[i] - expected).abs() <= 1e-6);
        }
    }

    #[test]
    fn rolling_std_dev_keeps_precision_at_price_levels() {
        let values: Vec<f64> = (0..5_000)
            .map(|i| 60_000.0 + 0.01 * (0.7 * i as f64).sin())
            .collect();
        let rolled = rolling_std_dev(&values, 30).unwrap();
        for (i, rolled) in rolled.iter().enumerate().skip(1) {
            let start = (i + 1).saturating_sub(30);
            let expected = population_std_dev(&values[start..=i]).unwrap();
            let error = (rolled - expected).abs() / expected;
            assert!(error < 1e-6, "index {i}: {rolled} != {expected}");
        }
    }

    #[test]
    fn moments_are_exact_for_offset_values() {
        let moments: Moments = [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0]
            .into_iter()
            .collect();
        assert_close(moments.mean().unwrap(), 1e9 + 10.0);
        assert_close(moments.variance().unwrap(), 22.5);
    }

    #[test]
    fn log_return_std_dev_counts_returns_inside_window() {
        let values = walk(120);
        let rolled = rolling_log_return_std_dev(&values, 20).unwrap();
        assert_eq!(rolled[0], None);
        for i in [1usize, 2, 19, 20, 64, 119] {
            let start = (i + 1).saturating_sub(20);
            let returns: Vec<f64> = values[start..=i]
                .windows(2)
                .map(|w| (w[1] / w[0]).ln())
                .collect();
            let expected = population_std_dev(&returns).unwrap();
            assert!((rolled[i].unwrap() - expected).abs() <= 1e-9);
        }
    }

    #[test]
    fn extrema_follow_window_and_skip_nan() {
        let values = [3.0, 1.0, f64::NAN, 5.0, 2.0, 2.0, 0.5];
        let max = rolling_max(&values, 3).unwrap();
        let min = rolling_min(&values, 3).unwrap();
        assert_eq!(
            max,
            vec![Some(3.0), Some(3.0), Some(3.0), Some(5.0), Some(5.0), Some(5.0), Some(2.0)]
        );
        assert_eq!(
            min,
            vec![Some(3.0), Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(0.5)]
        );
        assert_eq!(rolling_max(&[f64::NAN], 2).unwrap(), vec![None]);
    }

    #[test]
    fn streaming_and_slice_forms_agree_after_reset() {
        let values = walk(50);
        let mut indicator = RollingMean::<f64>::new(7).unwrap();
        for v in &values {
            indicator.next(*v);
        }
        indicator.reset();
        let streamed: Vec<f64> = values.iter().filter_map(|v| indicator.next(*v)).collect();
        assert_eq!(streamed, rolling_mean(&values, 7).unwrap());
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = rolling_mean(&[1.0], 0).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidPeriod { period: 0, .. }));
        assert!(RollingExtremum::<f64>::max(0).is_err());
    }

    #[test]
    fn moments_pop_to_empty_has_no_mean() {
        let mut moments = Moments::new();
        moments.push(4.0);
        moments.pop(4.0);
        assert_eq!(moments.mean(), None);
        assert_eq!(moments.std_dev(), None);
        moments.pop(1.0);
        assert_eq!(moments.count(), 0);
    }
}

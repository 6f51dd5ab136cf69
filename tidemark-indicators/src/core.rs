//! Foundational traits and the shared error type.

use std::fmt::Display;

use thiserror::Error;
use tidemark_core::TimePoint;

/// Result alias for indicator construction.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// Streaming computation that consumes one input at a time.
///
/// The window primitives implement this so they can be chained; the series
/// calculators drive them over a whole history at once.
pub trait Indicator {
    /// Value consumed on each step.
    type Input;
    /// Value produced once the indicator has enough state.
    type Output;

    /// Feed the next input, returning an output when one is available.
    fn next(&mut self, input: Self::Input) -> Option<Self::Output>;

    /// Clear all internal state.
    fn reset(&mut self);
}

/// Anything that exposes a single numeric observation.
pub trait Input {
    /// Numeric value fed to an indicator.
    fn value(&self) -> f64;
}

impl Input for f64 {
    fn value(&self) -> f64 {
        *self
    }
}

impl Input for &f64 {
    fn value(&self) -> f64 {
        **self
    }
}

impl Input for TimePoint {
    fn value(&self) -> f64 {
        self.value
    }
}

impl Input for &TimePoint {
    fn value(&self) -> f64 {
        self.value
    }
}

/// Errors raised when an indicator is configured with unusable parameters.
///
/// Computation itself never fails: short or degenerate inputs produce empty
/// output or sentinel values instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    /// A window length of zero was requested.
    #[error("{name} requires a non-zero period (got {period})")]
    InvalidPeriod {
        /// Indicator name.
        name: &'static str,
        /// Offending period.
        period: usize,
    },
    /// A numeric parameter is outside its accepted range.
    #[error("{name} received an invalid {parameter}: {value}")]
    InvalidParameter {
        /// Indicator name.
        name: &'static str,
        /// Parameter name.
        parameter: &'static str,
        /// Rendered offending value.
        value: String,
    },
}

impl IndicatorError {
    /// Convenience constructor for [`IndicatorError::InvalidPeriod`].
    pub fn invalid_period(name: &'static str, period: usize) -> Self {
        Self::InvalidPeriod { name, period }
    }

    /// Convenience constructor for [`IndicatorError::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        parameter: &'static str,
        value: impl Display,
    ) -> Self {
        Self::InvalidParameter {
            name,
            parameter,
            value: value.to_string(),
        }
    }
}

pub(crate) fn ensure_period(name: &'static str, period: usize) -> IndicatorResult<usize> {
    if period == 0 {
        Err(IndicatorError::invalid_period(name, period))
    } else {
        Ok(period)
    }
}

pub(crate) fn ensure_finite(
    name: &'static str,
    parameter: &'static str,
    value: f64,
) -> IndicatorResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IndicatorError::invalid_parameter(name, parameter, value))
    }
}

/// Clamp into `[0, 100]`, mapping NaN to zero.
pub(crate) fn clip_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_indicator() {
        let err = IndicatorError::invalid_period("RiskMetric", 0);
        assert_eq!(err.to_string(), "RiskMetric requires a non-zero period (got 0)");
        let err = IndicatorError::invalid_parameter("HeatWeights", "mayer", -0.5);
        assert_eq!(err.to_string(), "HeatWeights received an invalid mayer: -0.5");
    }

    #[test]
    fn clip_percent_handles_nan_and_bounds() {
        assert_eq!(clip_percent(f64::NAN), 0.0);
        assert_eq!(clip_percent(-3.0), 0.0);
        assert_eq!(clip_percent(130.0), 100.0);
        assert_eq!(clip_percent(42.0), 42.0);
    }
}

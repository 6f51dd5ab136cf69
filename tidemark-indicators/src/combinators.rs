//! Combinators that chain streaming indicators.

use crate::core::Indicator;

/// Feeds every output of the first indicator into the second.
///
/// Steps where the first indicator produces nothing are skipped entirely, so
/// the second indicator only ever sees real values.
#[derive(Debug, Clone)]
pub struct PipedIndicator<First, Second> {
    first: First,
    second: Second,
}

impl<First, Second> PipedIndicator<First, Second> {
    /// Creates a new piped indicator.
    pub fn new(first: First, second: Second) -> Self {
        Self { first, second }
    }
}

impl<First, Second> Indicator for PipedIndicator<First, Second>
where
    First: Indicator,
    Second: Indicator<Input = First::Output>,
{
    type Input = First::Input;
    type Output = Second::Output;

    fn next(&mut self, input: Self::Input) -> Option<Self::Output> {
        let intermediate = self.first.next(input)?;
        self.second.next(intermediate)
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}

/// Extension methods available on every indicator.
pub trait IndicatorExt: Indicator + Sized {
    /// Pipe this indicator's output into `next`.
    fn pipe<Next>(self, next: Next) -> PipedIndicator<Self, Next>
    where
        Next: Indicator<Input = Self::Output>,
    {
        PipedIndicator::new(self, next)
    }

    /// Run the indicator over `inputs`, keeping one slot per input.
    fn run<It>(&mut self, inputs: It) -> Vec<Option<Self::Output>>
    where
        It: IntoIterator<Item = Self::Input>,
    {
        inputs.into_iter().map(|input| self.next(input)).collect()
    }
}

impl<T: Indicator> IndicatorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{RollingExtremum, RollingMean};

    #[test]
    fn piped_mean_of_max() {
        let max = RollingExtremum::<f64>::max(2).unwrap();
        let mean = RollingMean::<f64>::new(2).unwrap();
        let mut piped = max.pipe(mean);
        let out = piped.run([1.0, 3.0, 2.0, 0.0]);
        // max: 1, 3, 3, 2 -> mean over 2: 1, 2, 3, 2.5
        assert_eq!(out, vec![Some(1.0), Some(2.0), Some(3.0), Some(2.5)]);
        piped.reset();
        assert_eq!(piped.next(4.0), Some(4.0));
    }
}

use chrono::NaiveDate;
use thiserror::Error;

/// Result alias for series construction.
pub type SeriesResult<T> = Result<T, SeriesError>;

/// Error type surfaced when a series violates its ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("point {index} ({current}) is not after the previous point ({previous})")]
    Unordered {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },
    #[error("duplicate observation for {date} at index {index}")]
    Duplicate { index: usize, date: NaiveDate },
}

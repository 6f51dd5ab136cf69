//! Core series types shared by every Tidemark crate.
//!
//! A [`TimeSeries`] is the only input calculators accept. It is built either
//! directly from already-ordered points or through the aligner in [`align`],
//! which turns loosely typed upstream payloads into clean daily observations.

pub mod align;
mod derived;
mod error;
mod raw;
mod series;

pub use align::{align, normalize, split_metrics, AlignedFrame, AlignedRow, NormalizeReport};
pub use derived::{DerivedPoint, DerivedSeries};
pub use error::{SeriesError, SeriesResult};
pub use raw::{MetricPoint, RawPoint, RawTime, RawValue};
pub use series::{TimePoint, TimeSeries};

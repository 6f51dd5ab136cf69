#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

//! Derived market indicators computed over full daily histories.

/// Implements `From<$point> for DerivedPoint` using the listed field names.
macro_rules! derived_point {
    ($point:ty { $($field:ident => $name:literal),+ $(,)? }) => {
        impl From<$point> for tidemark_core::DerivedPoint {
            fn from(point: $point) -> Self {
                tidemark_core::DerivedPoint::new(point.timestamp)
                    $(.with($name, f64::from(point.$field)))+
            }
        }

        impl From<&$point> for tidemark_core::DerivedPoint {
            fn from(point: &$point) -> Self {
                tidemark_core::DerivedPoint::from(point.clone())
            }
        }
    };
}

/// Indicator composition helpers such as `PipedIndicator`.
pub mod combinators;
/// Foundational traits and the shared error type.
pub mod core;
/// Bucketed averaging for display-sized output.
pub mod downsample;
/// Market Heat Index composite and its presets.
pub mod heat;
/// Series calculators (risk, ratios, peaks, returns, recession).
pub mod indicators;
/// Rolling-window statistics shared by every calculator.
pub mod window;

/// Re-export of the piped indicator combinator for convenience.
pub use crate::combinators::PipedIndicator;
/// Re-export of the core traits and error type to make the crate easy to consume.
pub use crate::core::{Indicator, IndicatorError, IndicatorResult, Input};
/// Re-export of the downsampling entry points.
pub use crate::downsample::{downsample, Downsampler};
/// Re-export of the heat index builder and its configuration.
pub use crate::heat::{
    CompositeRecord, HeatConfig, HeatInputs, HeatPreset, HeatScores, HeatWeights,
    MarketHeatIndex, MvrvHeatScale, SubScore,
};

//! Single entry point to the Tidemark crates.
//!
//! ```
//! use tidemark::prelude::*;
//!
//! let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let history = TimeSeries::from_pairs(
//!     (0..10).map(|i| (start + chrono::Duration::days(i), 100.0 + i as f64)),
//! )
//! .unwrap();
//! let roi = RunningRoi::new(5, WindowAnchor::ElapsedDays).unwrap().compute(&history);
//! assert_eq!(roi.len(), 5);
//! ```

pub use tidemark_config as config;
pub use tidemark_core as core;
pub use tidemark_indicators as indicators;

/// Run the command-line application with the process arguments.
pub fn run_cli() -> anyhow::Result<()> {
    tidemark_cli::run_app()
}

/// Commonly used types.
pub mod prelude {
    pub use tidemark_config::{load_config, AppConfig};
    pub use tidemark_core::{
        align, normalize, DerivedPoint, DerivedSeries, RawPoint, TimePoint, TimeSeries,
    };
    pub use tidemark_indicators::indicators::*;
    pub use tidemark_indicators::{
        downsample, Downsampler, HeatConfig, HeatInputs, HeatPreset, Indicator, IndicatorError,
        MarketHeatIndex,
    };
}

//! Series calculators provided by the crate.
//!
//! Every calculator is a small parameter struct with a `compute`-style method
//! that borrows a full [`tidemark_core::TimeSeries`] and returns freshly
//! allocated output. Short inputs yield empty output rather than errors.

pub mod mayer;
pub mod peaks;
pub mod pi_cycle;
pub mod puell;
pub mod risk;
pub mod roi;
pub mod sahm;
pub mod zscore;

pub use mayer::{MayerMultiple, RatioPoint};
pub use peaks::{PeakProjection, PeakProjector, PeakRecord, ProjectedPeakPoint};
pub use pi_cycle::{PiCycle, PiCyclePoint};
pub use puell::{IssuanceSource, PuellMultiple, PuellPoint, PuellSmoothing, SmoothingAlignment};
pub use risk::{RiskMetric, RiskPoint};
pub use roi::{
    HistoricalVolatility, MonthlyAverageRoi, MonthlyRoi, RoiPoint, RunningRoi, VolatilityPoint,
    WindowAnchor,
};
pub use sahm::{SahmPoint, SahmRule};
pub use zscore::{ZScore, ZScorePoint};

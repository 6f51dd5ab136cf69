//! Market Heat Index: a weighted composite of five `[0, 100]` sub-scores.
//!
//! The sub-scores are MVRV heat, Mayer heat, risk heat, sentiment heat and
//! PiCycle heat. Historical weight vectors and MVRV scalings differ, so both
//! are explicit configuration: a [`HeatPreset`] (or custom [`HeatWeights`])
//! and a [`MvrvHeatScale`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tidemark_core::{align, DerivedPoint, TimeSeries};
use tracing::debug;

use crate::core::{clip_percent, ensure_finite, IndicatorError, IndicatorResult};
use crate::indicators::{MayerMultiple, PeakProjector, PiCycle, RiskMetric};

/// Names of the sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubScore {
    /// MVRV against its projected peak.
    Mvrv,
    /// Mayer Multiple between fixed bounds.
    Mayer,
    /// Risk Metric scaled to percent.
    Risk,
    /// External sentiment index.
    Sentiment,
    /// PiCycle ratio through a buffer.
    PiCycle,
}

impl SubScore {
    /// Every sub-score in output order.
    pub const ALL: [SubScore; 5] = [
        SubScore::Mvrv,
        SubScore::Mayer,
        SubScore::Risk,
        SubScore::Sentiment,
        SubScore::PiCycle,
    ];

    /// Field name used in output records.
    pub fn name(self) -> &'static str {
        match self {
            SubScore::Mvrv => "mvrv",
            SubScore::Mayer => "mayer",
            SubScore::Risk => "risk",
            SubScore::Sentiment => "sentiment",
            SubScore::PiCycle => "piCycle",
        }
    }
}

impl fmt::Display for SubScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weight of each sub-score in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatWeights {
    /// MVRV heat weight.
    pub mvrv: f64,
    /// Mayer heat weight.
    pub mayer: f64,
    /// Risk heat weight.
    pub risk: f64,
    /// Sentiment heat weight.
    pub sentiment: f64,
    /// PiCycle heat weight.
    pub pi_cycle: f64,
}

impl HeatWeights {
    /// Validated custom weights. Each weight must be finite and non-negative.
    pub fn new(mvrv: f64, mayer: f64, risk: f64, sentiment: f64, pi_cycle: f64) -> IndicatorResult<Self> {
        Self {
            mvrv,
            mayer,
            risk,
            sentiment,
            pi_cycle,
        }
        .validate()
    }

    /// Check weights that were deserialized or built literally.
    pub fn validate(self) -> IndicatorResult<Self> {
        for score in SubScore::ALL {
            let weight = ensure_finite("HeatWeights", score.name(), self.get(score))?;
            if weight < 0.0 {
                return Err(IndicatorError::invalid_parameter(
                    "HeatWeights",
                    score.name(),
                    weight,
                ));
            }
        }
        Ok(self)
    }

    /// Weight of one sub-score.
    pub fn get(&self, score: SubScore) -> f64 {
        match score {
            SubScore::Mvrv => self.mvrv,
            SubScore::Mayer => self.mayer,
            SubScore::Risk => self.risk,
            SubScore::Sentiment => self.sentiment,
            SubScore::PiCycle => self.pi_cycle,
        }
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        SubScore::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Weights keyed by sub-score name.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        SubScore::ALL
            .iter()
            .map(|s| (s.name().to_string(), self.get(*s)))
            .collect()
    }
}

impl Default for HeatWeights {
    fn default() -> Self {
        HeatPreset::default().weights()
    }
}

/// Named weight vectors used historically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatPreset {
    /// `mvrv 0.25, mayer 0.25, risk 0.15, sentiment 0.20, piCycle 0.15`.
    #[default]
    Weighted,
    /// `0.2` for every sub-score.
    Uniform,
}

impl HeatPreset {
    /// Weight vector of the preset.
    pub fn weights(self) -> HeatWeights {
        match self {
            HeatPreset::Weighted => HeatWeights {
                mvrv: 0.25,
                mayer: 0.25,
                risk: 0.15,
                sentiment: 0.20,
                pi_cycle: 0.15,
            },
            HeatPreset::Uniform => HeatWeights {
                mvrv: 0.2,
                mayer: 0.2,
                risk: 0.2,
                sentiment: 0.2,
                pi_cycle: 0.2,
            },
        }
    }
}

/// How MVRV is turned into a `[0, 100]` score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvrvHeatScale {
    /// `100 * (1 - relative distance to the nearest threshold)`.
    InverseDistance,
    /// Linear between the MVRV floor and the larger threshold.
    #[default]
    Linear,
}

impl MvrvHeatScale {
    /// Score `mvrv` against the projected peak (if any) and the overvaluation threshold.
    pub fn score(self, mvrv: f64, projected_peak: Option<f64>, config: &HeatConfig) -> f64 {
        let fixed = config.overvaluation_threshold;
        match self {
            MvrvHeatScale::InverseDistance => {
                let nearest = projected_peak
                    .into_iter()
                    .chain(Some(fixed))
                    .filter(|threshold| *threshold > 0.0)
                    .map(|threshold| (mvrv - threshold).abs() / threshold)
                    .fold(f64::INFINITY, f64::min);
                if nearest.is_finite() {
                    clip_percent(100.0 * (1.0 - nearest))
                } else {
                    0.0
                }
            }
            MvrvHeatScale::Linear => {
                let upper = projected_peak.map_or(fixed, |peak| peak.max(fixed));
                let lower = config.mvrv_floor;
                if upper <= lower {
                    return 0.0;
                }
                clip_percent((mvrv - lower) / (upper - lower) * 100.0)
            }
        }
    }
}

/// Everything the heat index needs besides the input series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatConfig {
    weights: HeatWeights,
    mvrv_scale: MvrvHeatScale,
    overvaluation_threshold: f64,
    mvrv_floor: f64,
    mayer_bounds: (f64, f64),
    pi_cycle_buffer: f64,
    pi_cycle_offset: f64,
    risk: RiskMetric,
    mayer: MayerMultiple,
    pi_cycle: PiCycle,
    peaks: PeakProjector,
}

impl HeatConfig {
    /// Fixed MVRV overvaluation threshold.
    pub const OVERVALUATION_THRESHOLD: f64 = 3.7;
    /// MVRV at which linear heat is zero.
    pub const MVRV_FLOOR: f64 = 1.0;
    /// Mayer Multiple mapped to 0 heat.
    pub const MAYER_LOWER: f64 = 0.6;
    /// Mayer Multiple mapped to 100 heat.
    pub const MAYER_UPPER: f64 = 2.4;
    /// PiCycle buffer below a ratio of 1.
    pub const PI_CYCLE_BUFFER: f64 = 0.5;
    /// Added to the PiCycle ratio before scaling.
    pub const PI_CYCLE_OFFSET: f64 = 0.01;

    /// Configuration using a named weight preset.
    pub fn preset(preset: HeatPreset) -> Self {
        Self::default().with_weights(preset.weights())
    }

    /// Replace the weight vector.
    #[must_use]
    pub fn with_weights(mut self, weights: HeatWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the MVRV scale.
    #[must_use]
    pub fn with_mvrv_scale(mut self, scale: MvrvHeatScale) -> Self {
        self.mvrv_scale = scale;
        self
    }

    /// Replace the sub-calculators, e.g. with configured windows.
    #[must_use]
    pub fn with_calculators(
        mut self,
        risk: RiskMetric,
        mayer: MayerMultiple,
        pi_cycle: PiCycle,
        peaks: PeakProjector,
    ) -> Self {
        self.risk = risk;
        self.mayer = mayer;
        self.pi_cycle = pi_cycle;
        self.peaks = peaks;
        self
    }

    /// Weights in use.
    pub fn weights(&self) -> &HeatWeights {
        &self.weights
    }

    /// MVRV scale in use.
    pub fn mvrv_scale(&self) -> MvrvHeatScale {
        self.mvrv_scale
    }

    /// MVRV heat for one observation.
    pub fn mvrv_heat(&self, mvrv: f64, projected_peak: Option<f64>) -> f64 {
        self.mvrv_scale.score(mvrv, projected_peak, self)
    }

    /// Mayer heat, linear between the configured bounds.
    pub fn mayer_heat(&self, multiple: f64) -> f64 {
        let (lower, upper) = self.mayer_bounds;
        clip_percent((multiple - lower) / (upper - lower) * 100.0)
    }

    /// Risk heat, `risk * 100`.
    pub fn risk_heat(&self, risk: f64) -> f64 {
        clip_percent(risk * 100.0)
    }

    /// Sentiment heat, the index itself.
    pub fn sentiment_heat(&self, sentiment: f64) -> f64 {
        clip_percent(sentiment)
    }

    /// PiCycle heat: `((ratio + offset) - (1 - buffer)) / buffer * 100`.
    pub fn pi_cycle_heat(&self, ratio: f64) -> f64 {
        let buffer = self.pi_cycle_buffer;
        clip_percent(((ratio + self.pi_cycle_offset) - (1.0 - buffer)) / buffer * 100.0)
    }
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            weights: HeatPreset::default().weights(),
            mvrv_scale: MvrvHeatScale::default(),
            overvaluation_threshold: Self::OVERVALUATION_THRESHOLD,
            mvrv_floor: Self::MVRV_FLOOR,
            mayer_bounds: (Self::MAYER_LOWER, Self::MAYER_UPPER),
            pi_cycle_buffer: Self::PI_CYCLE_BUFFER,
            pi_cycle_offset: Self::PI_CYCLE_OFFSET,
            risk: RiskMetric::default(),
            mayer: MayerMultiple::default(),
            pi_cycle: PiCycle::default(),
            peaks: PeakProjector::default(),
        }
    }
}

/// Sub-scores available on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeatScores {
    /// MVRV heat.
    pub mvrv: Option<f64>,
    /// Mayer heat.
    pub mayer: Option<f64>,
    /// Risk heat.
    pub risk: Option<f64>,
    /// Sentiment heat.
    pub sentiment: Option<f64>,
    /// PiCycle heat.
    pub pi_cycle: Option<f64>,
}

impl HeatScores {
    /// One sub-score, if available.
    pub fn get(&self, score: SubScore) -> Option<f64> {
        match score {
            SubScore::Mvrv => self.mvrv,
            SubScore::Mayer => self.mayer,
            SubScore::Risk => self.risk,
            SubScore::Sentiment => self.sentiment,
            SubScore::PiCycle => self.pi_cycle,
        }
    }

    /// Available sub-scores in output order.
    pub fn available(&self) -> impl Iterator<Item = (SubScore, f64)> + '_ {
        SubScore::ALL
            .into_iter()
            .filter_map(|score| self.get(score).map(|value| (score, value)))
    }

    /// Weighted sum clipped to `[0, 100]`; missing sub-scores contribute 0.
    pub fn composite(&self, weights: &HeatWeights) -> f64 {
        clip_percent(
            self.available()
                .map(|(score, value)| weights.get(score) * value)
                .sum(),
        )
    }
}

/// Composite output for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRecord {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Available sub-scores keyed by name.
    pub subscores: BTreeMap<String, f64>,
    /// Weight vector used, keyed by name.
    pub weights: BTreeMap<String, f64>,
    /// Weighted composite in `[0, 100]`.
    pub composite: f64,
}

impl From<&CompositeRecord> for DerivedPoint {
    fn from(record: &CompositeRecord) -> Self {
        let mut point = DerivedPoint::new(record.timestamp).with("composite", record.composite);
        for (name, value) in &record.subscores {
            point.insert(name, *value);
        }
        point
    }
}

impl From<CompositeRecord> for DerivedPoint {
    fn from(record: CompositeRecord) -> Self {
        DerivedPoint::from(&record)
    }
}

/// Input series of the heat index.
#[derive(Debug, Clone, Copy)]
pub struct HeatInputs<'a> {
    /// Daily price.
    pub price: &'a TimeSeries,
    /// Daily MVRV.
    pub mvrv: &'a TimeSeries,
    /// Daily sentiment index in `[0, 100]`.
    pub sentiment: &'a TimeSeries,
}

/// Builds the Market Heat Index over the union of the input dates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketHeatIndex {
    config: HeatConfig,
}

impl MarketHeatIndex {
    /// Builder with the given configuration.
    pub fn new(config: HeatConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &HeatConfig {
        &self.config
    }

    /// Composite record for every date present in any input series.
    pub fn build(&self, inputs: &HeatInputs<'_>) -> Vec<CompositeRecord> {
        let config = &self.config;
        let price = inputs.price.finite();
        let mvrv = inputs.mvrv.finite();
        let sentiment = inputs.sentiment.finite();

        let risk = collect_series(config.risk.compute(&price).iter().map(|p| (p.timestamp, p.risk)));
        let mayer = collect_series(config.mayer.compute(&price).iter().map(|p| (p.timestamp, p.ratio)));
        let pi_cycle =
            collect_series(config.pi_cycle.compute(&price).iter().map(|p| (p.timestamp, p.ratio)));
        let projected = collect_series(
            config
                .peaks
                .project_to_date(&mvrv)
                .iter()
                .filter_map(|p| Some((p.timestamp, p.projected_peak?))),
        );

        // Derived columns only carry input dates, so the union is the input union.
        let frame = align(&[
            &price, &mvrv, &sentiment, &risk, &mayer, &pi_cycle, &projected,
        ]);
        debug!(
            rows = frame.len(),
            price = price.len(),
            mvrv = mvrv.len(),
            sentiment = sentiment.len(),
            "building market heat index"
        );

        let weights = config.weights.to_map();
        frame
            .rows()
            .iter()
            .map(|row| {
                let column = |idx: usize| row.values.get(idx).copied().flatten();
                let scores = HeatScores {
                    mvrv: column(1).map(|value| config.mvrv_heat(value, column(6))),
                    sentiment: column(2).map(|value| config.sentiment_heat(value)),
                    risk: column(3).map(|value| config.risk_heat(value)),
                    mayer: column(4).map(|value| config.mayer_heat(value)),
                    pi_cycle: column(5).map(|value| config.pi_cycle_heat(value)),
                };
                CompositeRecord {
                    timestamp: row.timestamp,
                    subscores: scores
                        .available()
                        .map(|(score, value)| (score.name().to_string(), value))
                        .collect(),
                    weights: weights.clone(),
                    composite: scores.composite(&config.weights),
                }
            })
            .collect()
    }
}

fn collect_series(pairs: impl Iterator<Item = (NaiveDate, f64)>) -> TimeSeries {
    // Calculator output is ordered by construction.
    TimeSeries::from_pairs(pairs).unwrap_or_default()
}

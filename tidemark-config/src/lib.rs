//! Typed configuration for Tidemark binaries.
//!
//! Layers, later ones winning:
//! 1. `config/default.toml` (optional)
//! 2. `config/{env}.toml` (optional)
//! 3. an explicit file passed by the caller (required when given)
//! 4. `TIDEMARK__*` environment variables, e.g. `TIDEMARK__ENGINE__RISK__WINDOW=200`
//!
//! Every section has defaults equal to the canonical indicator constants, so
//! an empty configuration is valid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tidemark_indicators::indicators::{
    HistoricalVolatility, MayerMultiple, MonthlyAverageRoi, PeakProjector, PiCycle,
    PuellMultiple, PuellSmoothing, RiskMetric, RunningRoi, SmoothingAlignment, WindowAnchor,
};
use tidemark_indicators::{Downsampler, HeatConfig, HeatPreset, HeatWeights, MvrvHeatScale};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TIDEMARK";
/// Directory searched for layered TOML files.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Where configuration is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Directory holding `default.toml` and `{env}.toml`.
    pub dir: PathBuf,
    /// Environment name selecting `{env}.toml`.
    pub env: Option<String>,
    /// Explicit file layered last before environment variables.
    pub file: Option<PathBuf>,
}

impl ConfigSources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: Option<&str>) -> Self {
        self.env = env.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(Path::to_path_buf);
        self
    }
}

/// Load configuration from `./config` for the given environment name.
pub fn load_config(env: Option<&str>) -> Result<AppConfig> {
    load_config_from(&ConfigSources::new(DEFAULT_CONFIG_DIR).with_env(env))
}

/// Load configuration from explicit sources.
pub fn load_config_from(sources: &ConfigSources) -> Result<AppConfig> {
    let mut builder = Config::builder().add_source(
        File::from(sources.dir.join("default.toml"))
            .format(FileFormat::Toml)
            .required(false),
    );
    if let Some(env) = sources.env.as_deref().filter(|env| *env != "default") {
        builder = builder.add_source(
            File::from(sources.dir.join(format!("{env}.toml")))
                .format(FileFormat::Toml)
                .required(false),
        );
    }
    if let Some(file) = &sources.file {
        builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config: AppConfig = builder
        .build()
        .context("failed to read configuration sources")?
        .try_deserialize()
        .context("failed to deserialize configuration")?;
    config.engine.validate()?;
    Ok(config)
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default `tracing` filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format for the CLI (`text` or `json`).
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            engine: EngineConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Parameters of every calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskSettings,
    pub mayer: MayerSettings,
    pub pi_cycle: PiCycleSettings,
    pub peaks: PeakSettings,
    pub puell: PuellSettings,
    pub roi: RoiSettings,
    pub heat: HeatSettings,
    pub downsample: DownsampleSettings,
}

impl EngineConfig {
    /// Build every calculator once so invalid settings fail at load time.
    pub fn validate(&self) -> Result<()> {
        self.risk.build()?;
        self.mayer.build()?;
        self.pi_cycle.build()?;
        self.peaks.build()?;
        self.puell.build()?;
        self.roi.running_roi()?;
        self.roi.volatility()?;
        self.roi.monthly()?;
        self.heat_config()?;
        self.downsample.build()?;
        Ok(())
    }

    /// Heat index configuration wired to the configured sub-calculators.
    pub fn heat_config(&self) -> Result<HeatConfig> {
        Ok(HeatConfig::default()
            .with_weights(self.heat.weights()?)
            .with_mvrv_scale(self.heat.mvrv_scale)
            .with_calculators(
                self.risk.build()?,
                self.mayer.build()?,
                self.pi_cycle.build()?,
                self.peaks.build()?,
            ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub window: usize,
    pub exponent: f64,
}

impl RiskSettings {
    pub fn build(&self) -> Result<RiskMetric> {
        RiskMetric::new(self.window, self.exponent).context("invalid [engine.risk] settings")
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            window: RiskMetric::DEFAULT_WINDOW,
            exponent: RiskMetric::DEFAULT_EXPONENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MayerSettings {
    pub window: usize,
}

impl MayerSettings {
    pub fn build(&self) -> Result<MayerMultiple> {
        MayerMultiple::new(self.window).context("invalid [engine.mayer] settings")
    }
}

impl Default for MayerSettings {
    fn default() -> Self {
        Self {
            window: MayerMultiple::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiCycleSettings {
    pub short_window: usize,
    pub long_window: usize,
    pub floor: f64,
}

impl PiCycleSettings {
    pub fn build(&self) -> Result<PiCycle> {
        PiCycle::new(self.short_window, self.long_window, self.floor)
            .context("invalid [engine.pi_cycle] settings")
    }
}

impl Default for PiCycleSettings {
    fn default() -> Self {
        Self {
            short_window: PiCycle::DEFAULT_SHORT,
            long_window: PiCycle::DEFAULT_LONG,
            floor: PiCycle::DEFAULT_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSettings {
    pub window: usize,
    pub threshold: f64,
}

impl PeakSettings {
    pub fn build(&self) -> Result<PeakProjector> {
        PeakProjector::new(self.window, self.threshold).context("invalid [engine.peaks] settings")
    }
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            window: PeakProjector::DEFAULT_WINDOW,
            threshold: PeakProjector::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuellSettings {
    pub issuance_window: usize,
    /// Smoothing period in days: 7, 28, 90, 180 or 365.
    pub smoothing: PuellSmoothing,
    pub alignment: SmoothingAlignment,
}

impl PuellSettings {
    pub fn build(&self) -> Result<PuellMultiple> {
        PuellMultiple::new(self.issuance_window, self.smoothing, self.alignment)
            .context("invalid [engine.puell] settings")
    }
}

impl Default for PuellSettings {
    fn default() -> Self {
        Self {
            issuance_window: PuellMultiple::DEFAULT_ISSUANCE_WINDOW,
            smoothing: PuellSmoothing::Month,
            alignment: SmoothingAlignment::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiSettings {
    /// Running ROI window.
    pub window: usize,
    /// Volatility window.
    pub volatility_window: usize,
    pub anchor: WindowAnchor,
    /// Horizon of the month-of-year ROI table.
    pub months_ahead: usize,
}

impl RoiSettings {
    pub fn running_roi(&self) -> Result<RunningRoi> {
        RunningRoi::new(self.window, self.anchor).context("invalid [engine.roi] window")
    }

    pub fn volatility(&self) -> Result<HistoricalVolatility> {
        HistoricalVolatility::new(self.volatility_window, self.anchor)
            .context("invalid [engine.roi] volatility_window")
    }

    pub fn monthly(&self) -> Result<MonthlyAverageRoi> {
        MonthlyAverageRoi::new(self.months_ahead).context("invalid [engine.roi] months_ahead")
    }
}

impl Default for RoiSettings {
    fn default() -> Self {
        Self {
            window: 365,
            volatility_window: 30,
            anchor: WindowAnchor::default(),
            months_ahead: 12,
        }
    }
}

/// Custom heat weights. Field names match the `[engine.heat.weights]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSettings {
    pub mvrv: f64,
    pub mayer: f64,
    pub risk: f64,
    pub sentiment: f64,
    pub pi_cycle: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatSettings {
    /// Named weight vector, ignored when `weights` is set.
    pub preset: HeatPreset,
    pub mvrv_scale: MvrvHeatScale,
    pub weights: Option<WeightSettings>,
}

impl HeatSettings {
    /// Custom weights when present, otherwise the preset.
    pub fn weights(&self) -> Result<HeatWeights> {
        match self.weights {
            Some(w) => HeatWeights::new(w.mvrv, w.mayer, w.risk, w.sentiment, w.pi_cycle)
                .context("invalid [engine.heat.weights]"),
            None => Ok(self.preset.weights()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownsampleSettings {
    /// Downsample CLI output by default.
    pub enabled: bool,
    pub factor: usize,
    pub threshold: usize,
}

impl DownsampleSettings {
    pub fn build(&self) -> Result<Downsampler> {
        Downsampler::new(self.factor, self.threshold).context("invalid [engine.downsample] settings")
    }
}

impl Default for DownsampleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: Downsampler::DEFAULT_FACTOR,
            threshold: Downsampler::DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_indicator_constants() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine.risk.window, 374);
        assert_eq!(config.engine.mayer.window, 200);
        assert_eq!(config.engine.puell.smoothing, PuellSmoothing::Month);
        assert_eq!(config.engine.heat.preset, HeatPreset::Weighted);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            log_level = "debug"

            [engine.mayer]
            window = 100

            [engine.puell]
            smoothing = 90
            alignment = "lagged"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.engine.mayer.window, 100);
        assert_eq!(config.engine.risk, RiskSettings::default());
        assert_eq!(config.engine.puell.smoothing, PuellSmoothing::Quarter);
        assert_eq!(config.engine.puell.alignment, SmoothingAlignment::Lagged);
    }

    #[test]
    fn custom_weights_override_preset() {
        let heat = HeatSettings {
            preset: HeatPreset::Uniform,
            weights: Some(WeightSettings {
                mvrv: 1.0,
                mayer: 0.0,
                risk: 0.0,
                sentiment: 0.0,
                pi_cycle: 0.0,
            }),
            ..HeatSettings::default()
        };
        let weights = heat.weights().unwrap();
        assert_eq!(weights.mvrv, 1.0);
        assert_eq!(weights.total(), 1.0);
    }

    #[test]
    fn invalid_settings_are_reported() {
        let mut engine = EngineConfig::default();
        engine.pi_cycle.short_window = 400;
        let err = engine.validate().unwrap_err();
        assert!(err.to_string().contains("engine.pi_cycle"));

        let mut engine = EngineConfig::default();
        engine.heat.weights = Some(WeightSettings {
            mvrv: -1.0,
            mayer: 0.0,
            risk: 0.0,
            sentiment: 0.0,
            pi_cycle: 0.0,
        });
        assert!(engine.validate().is_err());
    }

    #[test]
    fn renders_round_trippable_toml() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}

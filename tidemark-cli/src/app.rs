use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tidemark_config::{load_config_from, AppConfig, ConfigSources, DEFAULT_CONFIG_DIR};
use tidemark_core::{DerivedPoint, DerivedSeries, TimeSeries};
use tidemark_indicators::indicators::{
    IssuanceSource, PuellSmoothing, SahmRule, SmoothingAlignment, WindowAnchor, ZScore,
};
use tidemark_indicators::{Downsampler, HeatInputs, HeatPreset, MarketHeatIndex, MvrvHeatScale};
use tracing::{debug, info};

use crate::io::{load_series, write_json, InputFormat};
use crate::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "tidemark",
    version,
    about = "Compute market indicators from daily data files"
)]
pub struct Cli {
    /// Configuration environment, selects `config/{env}.toml`
    #[arg(long, global = true, default_value = "default")]
    pub env: String,

    /// Extra configuration file layered over `config/`
    #[arg(long, global = true, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `tidemark_core=trace`
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Downsample series output into buckets
    #[arg(long, global = true, default_value_t = false)]
    pub downsample: bool,

    /// Write JSON to this file instead of stdout
    #[arg(long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalized log-distance-from-trend score in [0, 1]
    Risk(SeriesArgs),
    /// Price over its 200-day moving average
    Mayer(SeriesArgs),
    /// 111-day SMA over twice the 350-day SMA
    #[command(name = "pi-cycle")]
    PiCycle(SeriesArgs),
    /// Daily issuance value over its yearly average
    Puell(PuellArgs),
    /// Standard deviations from the dataset mean
    Zscore(SeriesArgs),
    /// Local peaks and the projected next peak
    Peaks(PeaksArgs),
    /// Market Heat Index composite
    Heat(HeatArgs),
    /// Running ROI over a trailing window
    Roi(WindowArgs),
    /// Annualized volatility over a trailing window
    Volatility(WindowArgs),
    /// Average ROI per calendar month
    #[command(name = "monthly-roi")]
    MonthlyRoi(MonthlyRoiArgs),
    /// Sahm Rule over a monthly unemployment rate
    Sahm(SeriesArgs),
    /// Bucket-average an existing series
    Downsample(DownsampleArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct SeriesArgs {
    /// CSV (`time,value[,metric]`) or JSON array input
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Metric to select from multi-metric input
    #[arg(long)]
    pub metric: Option<String>,
}

impl SeriesArgs {
    fn load(&self) -> Result<TimeSeries> {
        load_series(&self.input, self.metric.as_deref())
    }
}

#[derive(Args, Debug)]
pub struct PuellArgs {
    /// Daily issuance in USD
    #[arg(long, value_name = "FILE", conflicts_with = "price", required_unless_present = "price")]
    pub issuance: Option<PathBuf>,

    /// Daily price; issuance is derived from the halving schedule
    #[arg(long, value_name = "FILE")]
    pub price: Option<PathBuf>,

    /// Metric to select from multi-metric input
    #[arg(long)]
    pub metric: Option<String>,

    /// Smoothing period in days (7, 28, 90, 180 or 365)
    #[arg(long)]
    pub smoothing: Option<u32>,

    /// Smoothing window alignment
    #[arg(long, value_enum)]
    pub alignment: Option<AlignmentValue>,
}

#[derive(Args, Debug)]
pub struct PeaksArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Emit the projection available on every date instead of the final one
    #[arg(long = "to-date", default_value_t = false)]
    pub to_date: bool,
}

#[derive(Args, Debug)]
pub struct HeatArgs {
    #[arg(long, value_name = "FILE")]
    pub price: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub mvrv: PathBuf,

    /// Sentiment index in [0, 100]
    #[arg(long, value_name = "FILE")]
    pub sentiment: PathBuf,

    /// Named weight vector, overrides configuration
    #[arg(long, value_enum)]
    pub preset: Option<PresetValue>,

    /// MVRV scaling, overrides configuration
    #[arg(long = "mvrv-scale", value_enum)]
    pub mvrv_scale: Option<MvrvScaleValue>,
}

#[derive(Args, Debug)]
pub struct WindowArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Window length in days (positions with `--anchor fixed-offset`)
    #[arg(long)]
    pub window: Option<usize>,

    #[arg(long, value_enum)]
    pub anchor: Option<AnchorValue>,
}

#[derive(Args, Debug)]
pub struct MonthlyRoiArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Months between the start and end averages
    #[arg(long = "months-ahead")]
    pub months_ahead: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DownsampleArgs {
    /// JSON array of `{time, ...fields}` or a CSV series
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    #[arg(long)]
    pub factor: Option<usize>,

    #[arg(long)]
    pub threshold: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AnchorValue {
    ElapsedDays,
    FixedOffset,
}

impl From<AnchorValue> for WindowAnchor {
    fn from(value: AnchorValue) -> Self {
        match value {
            AnchorValue::ElapsedDays => WindowAnchor::ElapsedDays,
            AnchorValue::FixedOffset => WindowAnchor::FixedOffset,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AlignmentValue {
    Trailing,
    Lagged,
}

impl From<AlignmentValue> for SmoothingAlignment {
    fn from(value: AlignmentValue) -> Self {
        match value {
            AlignmentValue::Trailing => SmoothingAlignment::Trailing,
            AlignmentValue::Lagged => SmoothingAlignment::Lagged,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PresetValue {
    Weighted,
    Uniform,
}

impl From<PresetValue> for HeatPreset {
    fn from(value: PresetValue) -> Self {
        match value {
            PresetValue::Weighted => HeatPreset::Weighted,
            PresetValue::Uniform => HeatPreset::Uniform,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MvrvScaleValue {
    InverseDistance,
    Linear,
}

impl From<MvrvScaleValue> for MvrvHeatScale {
    fn from(value: MvrvScaleValue) -> Self {
        match value {
            MvrvScaleValue::InverseDistance => MvrvHeatScale::InverseDistance,
            MvrvScaleValue::Linear => MvrvHeatScale::Linear,
        }
    }
}

/// Parse arguments, load configuration, install logging and run the command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config_from(
        &ConfigSources::new(DEFAULT_CONFIG_DIR)
            .with_env(Some(&cli.env))
            .with_file(cli.config.as_deref()),
    )?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    init_tracing(&level, config.log_format)?;
    debug!(env = %cli.env, "configuration loaded");
    execute(&cli, &config)
}

fn execute(cli: &Cli, config: &AppConfig) -> Result<()> {
    let output = Output::new(cli, config)?;
    let engine = &config.engine;
    match &cli.command {
        Commands::Risk(args) => output.series(&engine.risk.build()?.compute(&args.load()?)),
        Commands::Mayer(args) => output.series(&engine.mayer.build()?.compute(&args.load()?)),
        Commands::PiCycle(args) => {
            output.series(&engine.pi_cycle.build()?.compute(&args.load()?))
        }
        Commands::Puell(args) => run_puell(args, config, &output),
        Commands::Zscore(args) => output.series(&ZScore::compute_series(&args.load()?)),
        Commands::Peaks(args) => {
            let projector = engine.peaks.build()?;
            let history = args.series.load()?;
            if args.to_date {
                output.series(&projector.project_to_date(&history))
            } else {
                output.value(&projector.project(&history))
            }
        }
        Commands::Heat(args) => run_heat(args, config, &output),
        Commands::Roi(args) => {
            let settings = window_settings(config, args, engine.roi.window);
            output.series(&settings.running_roi()?.compute(&args.series.load()?))
        }
        Commands::Volatility(args) => {
            let mut settings = window_settings(config, args, engine.roi.volatility_window);
            settings.volatility_window = settings.window;
            output.series(&settings.volatility()?.compute(&args.series.load()?))
        }
        Commands::MonthlyRoi(args) => {
            let mut settings = engine.roi;
            if let Some(months) = args.months_ahead {
                settings.months_ahead = months;
            }
            output.value(&settings.monthly()?.compute(&args.series.load()?))
        }
        Commands::Sahm(args) => output.series(&SahmRule.compute(&args.load()?)),
        Commands::Downsample(args) => {
            let mut settings = engine.downsample;
            if let Some(factor) = args.factor {
                settings.factor = factor;
            }
            if let Some(threshold) = args.threshold {
                settings.threshold = threshold;
            }
            let points = load_derived(&args.input)?;
            output.value(&settings.build()?.apply(&points))
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn window_settings(
    config: &AppConfig,
    args: &WindowArgs,
    default_window: usize,
) -> tidemark_config::RoiSettings {
    let mut settings = config.engine.roi;
    settings.window = args.window.unwrap_or(default_window);
    if let Some(anchor) = args.anchor {
        settings.anchor = anchor.into();
    }
    settings
}

fn run_puell(args: &PuellArgs, config: &AppConfig, output: &Output) -> Result<()> {
    let mut settings = config.engine.puell;
    if let Some(days) = args.smoothing {
        settings.smoothing = PuellSmoothing::try_from(days)?;
    }
    if let Some(alignment) = args.alignment {
        settings.alignment = alignment.into();
    }
    let calculator = settings.build()?;

    let points = match (&args.issuance, &args.price) {
        (Some(path), _) => {
            let issuance = load_series(path, args.metric.as_deref())?;
            calculator.compute(IssuanceSource::Direct(&issuance))
        }
        (None, Some(path)) => {
            let price = load_series(path, args.metric.as_deref())?;
            calculator.compute(IssuanceSource::HalvingSchedule { price: &price })
        }
        (None, None) => bail!("either --issuance or --price is required"),
    };
    output.series(&points)
}

fn run_heat(args: &HeatArgs, config: &AppConfig, output: &Output) -> Result<()> {
    let mut heat = config.engine.heat_config()?;
    if let Some(preset) = args.preset {
        heat = heat.with_weights(HeatPreset::from(preset).weights());
    }
    if let Some(scale) = args.mvrv_scale {
        heat = heat.with_mvrv_scale(scale.into());
    }
    let price = load_series(&args.price, None)?;
    let mvrv = load_series(&args.mvrv, None)?;
    let sentiment = load_series(&args.sentiment, None)?;

    let records = MarketHeatIndex::new(heat).build(&HeatInputs {
        price: &price,
        mvrv: &mvrv,
        sentiment: &sentiment,
    });
    info!(records = records.len(), "built market heat index");
    output.series(&records)
}

/// Derived points from JSON, or a plain series from CSV.
fn load_derived(path: &Path) -> Result<DerivedSeries> {
    match InputFormat::from_path(path)? {
        InputFormat::Json => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            serde_json::from_reader(std::io::BufReader::new(file))
                .with_context(|| format!("failed to parse {}", path.display()))
        }
        InputFormat::Csv => Ok(DerivedPoint::from_series(&load_series(path, None)?)),
    }
}

/// Output destination plus the downsampler applied to series.
struct Output {
    path: Option<PathBuf>,
    downsampler: Option<Downsampler>,
}

impl Output {
    fn new(cli: &Cli, config: &AppConfig) -> Result<Self> {
        let settings = config.engine.downsample;
        let downsampler = if cli.downsample || settings.enabled {
            Some(settings.build()?)
        } else {
            None
        };
        Ok(Self {
            path: cli.output.clone(),
            downsampler,
        })
    }

    fn value<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        write_json(value, self.path.as_deref())
    }

    /// Series output keeps its own field layout unless it has to be downsampled.
    fn series<T>(&self, points: &[T]) -> Result<()>
    where
        T: Serialize,
        for<'a> DerivedPoint: From<&'a T>,
    {
        match &self.downsampler {
            Some(downsampler) => {
                let derived: DerivedSeries = points.iter().map(DerivedPoint::from).collect();
                self.value(&downsampler.apply(&derived))
            }
            None => self.value(points),
        }
    }
}

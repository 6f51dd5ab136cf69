//! Reading input files and writing JSON output.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tidemark_core::{
    normalize, split_metrics, MetricPoint, RawPoint, RawTime, RawValue, TimeSeries,
};
use tracing::{info, warn};

/// Supported input encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => bail!(
                "unsupported input {}: expected a .csv or .json file",
                path.display()
            ),
        }
    }
}

/// One input row; `metric` is only present in multi-metric feeds.
#[derive(Debug, Clone, Deserialize)]
struct InputRow {
    time: RawTime,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    value: RawValue,
}

/// CSV cells are read as text and parsed by the aligner.
#[derive(Debug, Clone, Deserialize)]
struct CsvRow {
    time: String,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl From<CsvRow> for InputRow {
    fn from(row: CsvRow) -> Self {
        Self {
            time: RawTime::Text(row.time),
            metric: row.metric.filter(|m| !m.is_empty()),
            value: row
                .value
                .filter(|v| !v.trim().is_empty())
                .map_or(RawValue::Missing, RawValue::Text),
        }
    }
}

fn read_rows(path: &Path) -> Result<Vec<InputRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    match InputFormat::from_path(path)? {
        InputFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(BufReader::new(file));
            reader
                .deserialize::<CsvRow>()
                .map(|row| {
                    row.map(InputRow::from)
                        .with_context(|| format!("invalid row in {}", path.display()))
                })
                .collect()
        }
        InputFormat::Json => serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", path.display())),
    }
}

/// Load one series from `path`.
///
/// Files with a `metric` column require `metric` to pick one of them; plain
/// `time,value` files ignore it.
pub fn load_series(path: &Path, metric: Option<&str>) -> Result<TimeSeries> {
    let rows = read_rows(path)?;
    let name = path.display().to_string();
    let has_metrics = rows.iter().any(|row| row.metric.is_some());

    let series = if has_metrics {
        let rows: Vec<MetricPoint> = rows
            .into_iter()
            .filter_map(|row| {
                Some(MetricPoint {
                    time: row.time,
                    metric: row.metric?,
                    value: row.value,
                })
            })
            .collect();
        let mut by_metric = split_metrics(&rows);
        let available = by_metric.keys().cloned().collect::<Vec<_>>().join(", ");
        let metric = metric.ok_or_else(|| {
            anyhow!("{name} holds several metrics ({available}); pass --metric to pick one")
        })?;
        by_metric
            .remove(metric)
            .ok_or_else(|| anyhow!("metric {metric} not found in {name} (available: {available})"))?
    } else {
        let raw: Vec<RawPoint> = rows
            .into_iter()
            .map(|row| RawPoint {
                time: row.time,
                value: row.value,
            })
            .collect();
        let (series, report) = normalize(&name, &raw);
        if report.dropped() > 0 {
            warn!(
                input = %name,
                dropped = report.dropped(),
                duplicates = report.duplicates,
                "input contained unusable rows"
            );
        }
        series
    };

    info!(input = %name, points = series.len(), "loaded series");
    Ok(series)
}

/// Write `value` as pretty JSON to `output`, or stdout when `None`.
pub fn write_json<T>(value: &T, output: Option<&Path>) -> Result<()>
where
    T: Serialize + ?Sized,
{
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

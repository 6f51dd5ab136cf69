use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn mayer_multiple_of_constant_price_is_one() -> Result<()> {
    let temp = tempdir()?;
    let input = write_series(temp.path(), "price.csv", &vec![30_000.0; 250])?;

    let output = run(temp.path(), &["mayer", "--input", path_str(&input)])?;
    let points = output.as_array().expect("array output");
    assert_eq!(points.len(), 250);
    assert!(points
        .iter()
        .all(|p| (p["ratio"].as_f64().unwrap() - 1.0).abs() < 1e-12));
    assert_eq!(points[0]["time"], "2020-01-01");
    Ok(())
}

#[test]
fn running_roi_uses_window_override() -> Result<()> {
    let temp = tempdir()?;
    let values: Vec<f64> = (100..=110).map(f64::from).collect();
    let input = write_series(temp.path(), "price.csv", &values)?;

    let output = run(
        temp.path(),
        &["roi", "--input", path_str(&input), "--window", "5"],
    )?;
    let points = output.as_array().expect("array output");
    assert_eq!(points.len(), 6);
    let last = points.last().unwrap();
    assert!((last["roi"].as_f64().unwrap() - 110.0 / 105.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn downsample_flag_buckets_series_output() -> Result<()> {
    let temp = tempdir()?;
    let values: Vec<f64> = (0..203).map(|i| 100.0 + i as f64).collect();
    let input = write_series(temp.path(), "price.csv", &values)?;

    let output = run(
        temp.path(),
        &["risk", "--input", path_str(&input), "--downsample"],
    )?;
    let points = output.as_array().expect("array output");
    assert_eq!(points.len(), 42);
    assert_eq!(points[41]["value"].as_f64(), Some(302.0));
    Ok(())
}

#[test]
fn downsample_command_reads_derived_json() -> Result<()> {
    let temp = tempdir()?;
    let input = temp.path().join("derived.json");
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let rows: Vec<Value> = (0..10)
        .map(|i| {
            serde_json::json!({
                "time": (start + Duration::days(i)).to_string(),
                "ratio": i as f64,
            })
        })
        .collect();
    fs::write(&input, serde_json::to_string(&rows)?)?;

    let output = run(
        temp.path(),
        &[
            "downsample",
            "--input",
            path_str(&input),
            "--threshold",
            "5",
        ],
    )?;
    let points = output.as_array().expect("array output");
    assert_eq!(points.len(), 3);
    assert_eq!(points[0]["ratio"].as_f64(), Some(2.0));
    assert_eq!(points[1]["ratio"].as_f64(), Some(7.0));
    assert_eq!(points[2]["ratio"].as_f64(), Some(9.0));
    Ok(())
}

#[test]
fn environment_config_changes_windows() -> Result<()> {
    let temp = tempdir()?;
    fs::create_dir_all(temp.path().join("config"))?;
    fs::write(
        temp.path().join("config/research.toml"),
        "[engine.mayer]\nwindow = 2\n",
    )?;
    let input = write_series(temp.path(), "price.csv", &[10.0, 30.0, 60.0])?;

    let output = run(
        temp.path(),
        &["--env", "research", "mayer", "--input", path_str(&input)],
    )?;
    let ratios: Vec<f64> = output
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["ratio"].as_f64().unwrap())
        .collect();
    assert_eq!(ratios, vec![1.0, 1.5, 60.0 / 45.0]);

    let rendered = run_raw(temp.path(), &["--env", "research", "config"])?;
    assert!(rendered.contains("window = 2"));
    Ok(())
}

#[test]
fn heat_index_scores_union_of_dates() -> Result<()> {
    let temp = tempdir()?;
    let price: Vec<f64> = (0..400).map(|i| 8_000.0 + 25.0 * i as f64).collect();
    let mvrv: Vec<f64> = (0..400).map(|i| 1.2 + (i % 50) as f64 * 0.04).collect();
    let sentiment: Vec<f64> = (0..400).map(|i| (i % 100) as f64).collect();
    let price = write_series(temp.path(), "price.csv", &price)?;
    let mvrv = write_series(temp.path(), "mvrv.csv", &mvrv)?;
    let sentiment = write_series(temp.path(), "sentiment.csv", &sentiment)?;

    let output = run(
        temp.path(),
        &[
            "heat",
            "--price",
            path_str(&price),
            "--mvrv",
            path_str(&mvrv),
            "--sentiment",
            path_str(&sentiment),
            "--preset",
            "uniform",
        ],
    )?;
    let records = output.as_array().expect("array output");
    assert_eq!(records.len(), 400);
    for record in records {
        let composite = record["composite"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&composite));
        assert_eq!(record["weights"]["mvrv"].as_f64(), Some(0.2));
    }
    assert!(records[399]["subscores"]["piCycle"].is_number());
    Ok(())
}

#[test]
fn short_history_has_no_peak_projection() -> Result<()> {
    let temp = tempdir()?;
    let input = write_series(temp.path(), "mvrv.csv", &[3.0; 20])?;
    let output = run(temp.path(), &["peaks", "--input", path_str(&input)])?;
    assert!(output.is_null());
    Ok(())
}

#[test]
fn monthly_roi_reports_every_month() -> Result<()> {
    let temp = tempdir()?;
    let values: Vec<f64> = (0..800).map(|i| 100.0 + i as f64).collect();
    let input = write_series(temp.path(), "price.csv", &values)?;
    let output = run(
        temp.path(),
        &["monthly-roi", "--input", path_str(&input), "--months-ahead", "1"],
    )?;
    let months = output.as_array().unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0]["month"], 1);
    assert!(months.iter().all(|m| m["averageRoi"].as_f64().unwrap() > 1.0));
    Ok(())
}

#[test]
fn output_flag_writes_file() -> Result<()> {
    let temp = tempdir()?;
    let input = write_series(temp.path(), "rate.csv", &[4.0; 13])?;
    let target = temp.path().join("sahm.json");
    run_raw(
        temp.path(),
        &[
            "sahm",
            "--input",
            path_str(&input),
            "--output",
            path_str(&target),
        ],
    )?;
    let written: Value = serde_json::from_str(&fs::read_to_string(&target)?)?;
    assert_eq!(written.as_array().unwrap().len(), 2);
    Ok(())
}

#[test]
fn unsupported_input_fails() -> Result<()> {
    let temp = tempdir()?;
    let input = temp.path().join("price.parquet");
    fs::write(&input, b"not really parquet")?;
    let mut cmd = command(temp.path());
    cmd.args(["risk", "--input", path_str(&input)]);
    cmd.assert().failure();
    Ok(())
}

fn command(dir: &Path) -> Command {
    let binary = assert_cmd::cargo::cargo_bin!("tidemark-cli");
    let mut cmd = Command::new(binary);
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn run_raw(dir: &Path, args: &[&str]) -> Result<String> {
    let mut cmd = command(dir);
    cmd.args(args);
    let assert = cmd.assert().success();
    Ok(String::from_utf8(assert.get_output().stdout.clone())?)
}

fn run(dir: &Path, args: &[&str]) -> Result<Value> {
    Ok(serde_json::from_str(&run_raw(dir, args)?)?)
}

/// Daily `time,value` CSV starting on 2020-01-01.
fn write_series(dir: &Path, name: &str, values: &[f64]) -> Result<PathBuf> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut body = String::from("time,value\n");
    for (i, value) in values.iter().enumerate() {
        body.push_str(&format!("{},{}\n", start + Duration::days(i as i64), value));
    }
    let path = dir.join(name);
    fs::write(&path, body)?;
    Ok(path)
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

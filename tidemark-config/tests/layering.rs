use std::fs;

use anyhow::Result;
use tempfile::tempdir;
use tidemark_config::{load_config_from, ConfigSources, LogFormat};
use tidemark_indicators::indicators::WindowAnchor;
use tidemark_indicators::{HeatPreset, MvrvHeatScale};

#[test]
fn later_layers_override_earlier_ones() -> Result<()> {
    let temp = tempdir()?;
    fs::write(
        temp.path().join("default.toml"),
        r#"
        log_level = "warn"

        [engine.risk]
        window = 300

        [engine.heat]
        preset = "uniform"
        "#,
    )?;
    fs::write(
        temp.path().join("research.toml"),
        r#"
        log_format = "json"

        [engine.risk]
        window = 250

        [engine.roi]
        anchor = "fixed_offset"
        "#,
    )?;
    let explicit = temp.path().join("explicit.toml");
    fs::write(
        &explicit,
        r#"
        [engine.heat]
        mvrv_scale = "inverse_distance"
        "#,
    )?;

    let config = load_config_from(
        &ConfigSources::new(temp.path())
            .with_env(Some("research"))
            .with_file(Some(&explicit)),
    )?;
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.engine.risk.window, 250);
    assert_eq!(config.engine.roi.anchor, WindowAnchor::FixedOffset);
    assert_eq!(config.engine.heat.preset, HeatPreset::Uniform);
    assert_eq!(config.engine.heat.mvrv_scale, MvrvHeatScale::InverseDistance);
    Ok(())
}

#[test]
fn missing_directory_yields_defaults() -> Result<()> {
    let temp = tempdir()?;
    let config = load_config_from(&ConfigSources::new(temp.path().join("absent")))?;
    assert_eq!(config.engine.mayer.window, 200);
    Ok(())
}

#[test]
fn missing_explicit_file_is_an_error() -> Result<()> {
    let temp = tempdir()?;
    let missing = temp.path().join("nope.toml");
    let result = load_config_from(&ConfigSources::new(temp.path()).with_file(Some(&missing)));
    assert!(result.is_err());
    Ok(())
}

#[test]
fn invalid_values_fail_at_load_time() -> Result<()> {
    let temp = tempdir()?;
    fs::write(
        temp.path().join("default.toml"),
        "[engine.puell]\nsmoothing = 30\n",
    )?;
    assert!(load_config_from(&ConfigSources::new(temp.path())).is_err());

    fs::write(
        temp.path().join("default.toml"),
        "[engine.mayer]\nwindow = 0\n",
    )?;
    let err = load_config_from(&ConfigSources::new(temp.path())).unwrap_err();
    assert!(err.to_string().contains("engine.mayer"));
    Ok(())
}

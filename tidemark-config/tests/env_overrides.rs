use std::fs;

use anyhow::Result;
use tempfile::tempdir;
use tidemark_config::{load_config_from, ConfigSources};

// Kept in its own test binary so the variables cannot leak into other tests.
#[test]
fn environment_wins_over_files() -> Result<()> {
    let temp = tempdir()?;
    fs::write(
        temp.path().join("default.toml"),
        "[engine.mayer]\nwindow = 100\n\n[engine.pi_cycle]\nlong_window = 300\n",
    )?;
    std::env::set_var("TIDEMARK__ENGINE__MAYER__WINDOW", "150");
    std::env::set_var("TIDEMARK__LOG_LEVEL", "trace");

    let config = load_config_from(&ConfigSources::new(temp.path()))?;

    std::env::remove_var("TIDEMARK__ENGINE__MAYER__WINDOW");
    std::env::remove_var("TIDEMARK__LOG_LEVEL");

    assert_eq!(config.engine.mayer.window, 150);
    assert_eq!(config.engine.pi_cycle.long_window, 300);
    assert_eq!(config.log_level, "trace");
    Ok(())
}

use anyhow::Result;
use tidemark_cli::app;

fn main() -> Result<()> {
    app::run()
}

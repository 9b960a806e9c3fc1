use anyhow::Result;

use botlog::cli::{self, Cli};
use botlog::logging;

fn main() -> Result<()> {
    // Install diagnostics BEFORE any tracing calls
    logging::init_tracing("botlog=info")?;

    let cli = Cli::from_cli();
    cli::run(cli)
}

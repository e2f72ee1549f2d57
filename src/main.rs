//! sandgate binary entry point.

use anyhow::{Context, Result};
use clap::Parser;
use sandgate::cli::{self, Cli};
use sandgate::hardening::apply_process_hardening;

mod main_helpers;

#[tokio::main]
async fn main() -> Result<()> {
    apply_process_hardening().context("failed to apply process hardening safeguards")?;

    let args = Cli::parse();
    let manager = cli::load_config(&args)?;
    main_helpers::initialize_tracing(&manager.config().log_level);
    if let Some(path) = manager.config_path() {
        tracing::debug!(path = %path.display(), "loaded configuration file");
    }

    cli::dispatch(args.command, &manager).await
}

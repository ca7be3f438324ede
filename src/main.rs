mod airtable;
mod cli;
mod config;
mod error;
mod job;
mod logging;
mod shipit;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use cli::Cli;
use logging::TracingLogger;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    info!("Loading job configuration from {:?}", cli.config);
    let summary = job::run_once(&cli.config, TracingLogger)
        .await
        .with_context(|| format!("shipment KPI run failed (config {:?})", cli.config))?;

    info!(
        run_id = %summary.run_id,
        updated = summary.updated(),
        "Run complete"
    );
    ui::print_summary(&summary);
    Ok(())
}

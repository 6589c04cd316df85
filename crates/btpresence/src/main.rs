//! # btpresence
//!
//! Scans for nearby Bluetooth devices for a fixed time, then writes a report
//! of when each device was present.
//!
//! ## Running
//!
//! ```bash
//! # Scan for five minutes, write a text report
//! btpresence 5m report.txt
//!
//! # Scan for an hour with a two-minute gap threshold, PDF output
//! btpresence 1h report.pdf --gap 120
//! ```
//!
//! Ctrl-C ends scanning early; the report is still written.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use btpresence::app;
use btpresence::cli::Cli;
use btpresence::logging;
use btpresence_core::PresenceError;
use clap::Parser;
use tracing::{info, Instrument};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let run_id = Uuid::now_v7();
    let result = execute(&cli, run_id)
        .instrument(tracing::info_span!("observation", %run_id))
        .await;

    if let Err(err) = result {
        app::report_failure(&err);
        return Err(err.into());
    }
    Ok(())
}

async fn execute(cli: &Cli, run_id: Uuid) -> Result<(), PresenceError> {
    let config = app::load_config(cli)?;
    let mut scanner = app::open_scanner(&config).await?;
    app::run(&mut scanner, cli, &config, run_id, interrupted()).await?;
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupted; finishing early");
    } else {
        std::future::pending::<()>().await;
    }
}

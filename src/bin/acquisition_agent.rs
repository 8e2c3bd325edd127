// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition agent
//!
//! Polls the power meter every period and pushes each snapshot to the collector.

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use rust_powermeter::cli::CommonArgs;
use rust_powermeter::daemon::Daemon;

/// Power meter acquisition agent
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.common.init_logging();

    let Some(config) = args.common.load_config()? else {
        return Ok(());
    };

    info!(
        "Polling {} every {} ms, posting to {}",
        config.device.socket_address(),
        config.acquisition.period_ms,
        config.collector.ingest_url()
    );

    let mut daemon = Daemon::new();
    daemon.launch_agent(&config).await?;

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    daemon.shutdown();
    daemon.join().await?;
    info!("Acquisition agent terminated");
    Ok(())
}

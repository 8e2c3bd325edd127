// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector service
//!
//! Stores the latest snapshot posted by the agent and serves it on `GET /data`.

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use rust_powermeter::cli::CommonArgs;
use rust_powermeter::collector::CollectorState;
use rust_powermeter::daemon::Daemon;

/// Power meter collector service
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[rocket::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.common.init_logging();

    let Some(config) = args.common.load_config()? else {
        return Ok(());
    };

    let mut daemon = Daemon::new();
    daemon
        .launch_collector(&config, CollectorState::new())
        .await?;

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    daemon.shutdown();
    daemon.join().await?;
    info!("Collector terminated");
    Ok(())
}

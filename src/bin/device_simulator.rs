// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated power meter
//!
//! Serves the configured measurement groups over Modbus TCP, with the channel
//! values listed in the `simulator` section of the configuration.

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use rust_powermeter::cli::CommonArgs;
use rust_powermeter::daemon::Daemon;

/// Simulated Modbus TCP power meter
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

    let mut daemon = Daemon::new();
    let (local_addr, _device) = daemon.launch_simulator(&config).await?;
    for group in &config.acquisition.groups {
        info!(
            "Serving {} at registers {}..{} on {}",
            group.name,
            group.address,
            u32::from(group.address) + u32::from(group.count),
            local_addr
        );
    }

    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    daemon.shutdown();
    daemon.join().await?;
    Ok(())
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Diagnostic Modbus client
//!
//! Reads one register block from a power meter and prints the raw registers
//! next to the decoded float channels.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::debug;

use rust_powermeter::acquisition::{ModbusRegisterSource, RegisterSource};
use rust_powermeter::config::RegisterKind;
use rust_powermeter::registers::{block_fits, decompose_block};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Input,
    Holding,
}

impl From<Kind> for RegisterKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Input => RegisterKind::Input,
            Kind::Holding => RegisterKind::Holding,
        }
    }
}

/// Modbus client reading a block of float registers from a power meter
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Modbus server address
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[arg(long, default_value = "502")]
    port: u16,

    /// Modbus unit identifier
    #[arg(long, default_value = "1")]
    unit_id: u8,

    /// Starting register address
    #[arg(long, default_value = "352")]
    register: u16,

    /// Number of registers to read
    #[arg(long, default_value = "2")]
    quantity: u16,

    /// Register table to read from
    #[arg(long, value_enum, default_value = "input")]
    kind: Kind,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,
}

/// First and last register of channel `index` (0-based) in a block read from `register`.
fn channel_registers(register: u16, index: usize) -> (u32, u32) {
    let first = u32::from(register) + index as u32 * 2;
    (first, first + 1)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    if !block_fits(args.register, args.quantity) {
        anyhow::bail!(
            "Block {}+{} runs past the last register address 65535",
            args.register,
            args.quantity
        );
    }

    let target = format!("{}:{}", args.address, args.port);
    println!("Connecting to Modbus server at {}", target);

    let mut source = ModbusRegisterSource::new(
        &target,
        args.unit_id,
        args.kind.into(),
        Duration::from_millis(args.timeout_ms),
    );
    source.connect().await?;

    println!(
        "Reading {} {:?} registers starting at address {}",
        args.quantity, args.kind, args.register
    );
    let registers = source.read_registers(args.register, args.quantity).await?;
    println!("Raw register values: {:?}", registers);

    match decompose_block(&registers) {
        Ok(channels) => {
            for (index, value) in channels.iter().enumerate() {
                let (first, last) = channel_registers(args.register, index);
                println!(
                    "Channel {} (registers {}-{}): {}",
                    index + 1,
                    first,
                    last,
                    value
                );
            }
        }
        Err(e) => {
            debug!("Block not decodable as floats: {}", e);
            println!("Registers do not form whole float channels: {}", e);
        }
    }

    Ok(())
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated field device
//!
//! A Modbus TCP server standing in for the power meter during development and
//! integration tests. It answers the same register reads the agent issues and
//! stores channel values in the same word-swapped float layout.
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module
//! uses the terms "server" (the simulated meter) and "client" (the agent).
//!
//! ## Usage
//!
//! ```no_run
//! use rust_powermeter::acquisition::MeasurementGroup;
//! use rust_powermeter::modbus::{serve, SimulatedDevice};
//! use tokio::net::TcpListener;
//! use tokio::sync::watch;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let device = SimulatedDevice::new();
//! let voltage = MeasurementGroup::new("VOLTAGE", 352, 2)?;
//! device.set_channel(&voltage, 1, 230.0)?;
//!
//! let listener = TcpListener::bind("127.0.0.1:5502").await?;
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! serve(listener, device, shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod simulator;

pub use simulator::{serve, SimulatedDevice};

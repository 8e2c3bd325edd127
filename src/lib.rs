// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust power meter telemetry library
//!
//! An acquisition agent polls a Modbus TCP power meter, decodes its
//! word-swapped float registers into named channels and pushes one flat
//! snapshot per cycle to a collector, which keeps the latest snapshot and
//! serves it over HTTP.

pub mod acquisition;
pub mod cli;
pub mod collector;
pub mod config;
pub mod daemon;
pub mod delivery;
pub mod error;
pub mod modbus;
pub mod registers;
pub mod snapshot;

pub use error::{CollectorError, DecodeError, DeliveryError, TransportError};
pub use snapshot::{Reading, Snapshot};

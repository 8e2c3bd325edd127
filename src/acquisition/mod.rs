// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register acquisition
//!
//! This module handles reading measurement groups from the field device and
//! turning them into snapshots.
//!
//! - [`RegisterSource`]: reads a contiguous block of registers from a device
//! - [`ModbusRegisterSource`]: Modbus TCP implementation
//! - [`MockRegisterSource`]: in-memory implementation for tests and dry runs
//! - [`AcquisitionAgent`]: the periodic read / decode / submit loop

pub mod agent;
pub mod mock;
pub mod modbus;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::MeasurementGroupConfig;
use crate::error::{DecodeError, TransportError};
use crate::registers::{block_fits, decompose_block, validate_block_len};

pub use agent::{AcquisitionAgent, CycleReport};
pub use mock::MockRegisterSource;
pub use modbus::ModbusRegisterSource;

/// A device that can be asked for a contiguous block of 16-bit registers.
#[async_trait]
pub trait RegisterSource: Send {
    /// Read `count` registers starting at `address`.
    async fn read_registers(&mut self, address: u16, count: u16)
        -> Result<Vec<u16>, TransportError>;

    /// Short human readable description, used in logs
    fn describe(&self) -> String;
}

/// A validated measurement group.
///
/// Built once at startup from [`MeasurementGroupConfig`]; holding one proves
/// the register count splits into whole channels and the block fits the
/// 16-bit register address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementGroup {
    name: String,
    address: u16,
    count: u16,
}

impl MeasurementGroup {
    /// ### Errors
    ///
    /// Returns [`DecodeError::InvalidRegisterCount`] if `count` is zero or odd,
    /// and [`DecodeError::AddressOutOfRange`] if the block does not end at or
    /// before register 65535.
    pub fn new(name: impl Into<String>, address: u16, count: u16) -> Result<Self, DecodeError> {
        validate_block_len(count as usize).map_err(|_| DecodeError::InvalidRegisterCount {
            count: count as usize,
        })?;
        if !block_fits(address, count) {
            return Err(DecodeError::AddressOutOfRange { address, count });
        }
        Ok(Self {
            name: name.into(),
            address,
            count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Number of float32 channels in the block.
    pub fn channels(&self) -> usize {
        self.count as usize / 2
    }

    /// Decode a block read for this group into its channel readings.
    pub fn decode(&self, registers: &[u16]) -> Result<Vec<f32>, DecodeError> {
        decompose_block(registers)
    }
}

impl TryFrom<&MeasurementGroupConfig> for MeasurementGroup {
    type Error = DecodeError;

    fn try_from(config: &MeasurementGroupConfig) -> Result<Self, Self::Error> {
        MeasurementGroup::new(config.name.clone(), config.address, config.count)
    }
}

/// Build the validated group table from configuration, failing on the first bad row.
pub fn groups_from_config(configs: &[MeasurementGroupConfig]) -> Result<Vec<MeasurementGroup>> {
    configs
        .iter()
        .map(|config| {
            MeasurementGroup::try_from(config).map_err(|e| {
                anyhow::anyhow!("Invalid measurement group '{}': {}", config.name, e)
            })
        })
        .collect()
}

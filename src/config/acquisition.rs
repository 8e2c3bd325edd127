// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration
//!
//! This module defines the acquisition period and the measurement group table,
//! i.e. which register blocks are read on every cycle.

use serde::{Deserialize, Serialize};

/// One row of the measurement group table.
///
/// `count` is a number of registers, not channels: each channel takes two
/// registers, so a block of 12 registers yields 6 channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementGroupConfig {
    /// Group name, used as the snapshot key prefix (`VOLTAGE_Channel1`).
    pub name: String,

    /// First register address of the block.
    pub address: u16,

    /// Number of registers in the block, non-zero and even.
    pub count: u16,
}

impl MeasurementGroupConfig {
    pub fn new(name: impl Into<String>, address: u16, count: u16) -> Self {
        Self {
            name: name.into(),
            address,
            count,
        }
    }
}

/// Configuration for the periodic acquisition loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Delay between the end of a cycle and the start of the next one, in milliseconds.
    ///
    /// Must be greater than zero.
    pub period_ms: u64,

    /// Register blocks read on each cycle, in order.
    #[serde(default = "default_groups")]
    pub groups: Vec<MeasurementGroupConfig>,
}

fn default_groups() -> Vec<MeasurementGroupConfig> {
    vec![
        MeasurementGroupConfig::new("VOLTAGE", 352, 2),   // Voltage (RMS)
        MeasurementGroupConfig::new("FREQUENCY", 424, 2), // Frequency
    ]
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            period_ms: 5000,
            groups: default_groups(),
        }
    }
}

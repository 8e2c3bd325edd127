// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated field device configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Settings of the `device_simulator` binary.
///
/// The simulator exposes every group of the acquisition table. Channel values
/// come from `values`, keyed by group name; missing channels read as `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Address the simulated Modbus server binds to.
    pub address: String,

    /// Port the simulated Modbus server listens on.
    pub port: u16,

    /// Channel values per group name, channel 1 first.
    #[serde(default)]
    pub values: BTreeMap<String, Vec<f32>>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert("VOLTAGE".to_string(), vec![230.0]);
        values.insert("FREQUENCY".to_string(), vec![50.0]);
        Self {
            address: "127.0.0.1".to_string(),
            port: 5502,
            values,
        }
    }
}

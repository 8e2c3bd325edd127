// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device (Modbus TCP) configuration

use serde::{Deserialize, Serialize};

/// Modbus register table the measurement blocks are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Function code 0x04, read-only measurement registers
    #[default]
    Input,
    /// Function code 0x03, read/write registers
    Holding,
}

/// Connection settings of the power meter.
///
/// # Example
///
/// ```
/// use rust_powermeter::config::{DeviceConfig, RegisterKind};
///
/// let device = DeviceConfig {
///     address: "127.0.0.1".to_string(),
///     port: 5502,
///     unit_id: 1,
///     register_kind: RegisterKind::Input,
///     timeout_ms: 1000,
/// };
/// assert_eq!(device.socket_address(), "127.0.0.1:5502");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// IP address or hostname of the meter.
    pub address: String,

    /// Modbus TCP port, 502 on most devices.
    pub port: u16,

    /// Modbus unit identifier (slave id).
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Register table holding the measurement blocks.
    #[serde(default)]
    pub register_kind: RegisterKind,

    /// Upper bound for a single connect or read, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

impl DeviceConfig {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "169.254.20.1".to_string(), // Factory link-local address of the meter
            port: 502,
            unit_id: default_unit_id(),
            register_kind: RegisterKind::Input,
            timeout_ms: default_timeout_ms(),
        }
    }
}

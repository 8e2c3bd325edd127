// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, CONFIG_SCHEMA};
use crate::registers::{block_fits, validate_block_len};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./collector --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules that aren't covered by the JSON schema.
///
/// ### Validation Rules
///
/// - **Measurement groups**: at least one group, non-empty unique names, a
///   non-zero even register count, and a block that fits the 16-bit address space
/// - **Period**: the acquisition period is greater than zero
/// - **Collector URL**: `base_url` is an absolute http(s) URL
/// - **Port Range**: device, collector and simulator ports are within 1-65534
/// - **Timeouts**: device and collector timeouts are greater than zero
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.acquisition.groups.is_empty() {
        anyhow::bail!("At least one measurement group must be configured");
    }

    let mut names = HashSet::new();
    for group in &config.acquisition.groups {
        if group.name.trim().is_empty() {
            anyhow::bail!("Measurement group at address {} has an empty name", group.address);
        }
        if !names.insert(group.name.as_str()) {
            anyhow::bail!("Duplicate measurement group name: {}", group.name);
        }
        validate_block_len(group.count as usize).map_err(|_| {
            anyhow::anyhow!(
                "Measurement group '{}': register count {} must be a non-zero even number (InvalidRegisterCount)",
                group.name,
                group.count
            )
        })?;
        if !block_fits(group.address, group.count) {
            anyhow::bail!(
                "Measurement group '{}': block {}+{} exceeds the register address space",
                group.name,
                group.address,
                group.count
            );
        }
    }

    if config.acquisition.period_ms == 0 {
        anyhow::bail!("Acquisition period must be greater than zero");
    }

    let url = url::Url::parse(&config.collector.base_url)
        .with_context(|| format!("Invalid collector URL: {}", config.collector.base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!(
            "Collector URL must use http or https: {}",
            config.collector.base_url
        );
    }

    for (name, port) in [
        ("device", config.device.port),
        ("collector", config.collector.port),
        ("simulator", config.simulator.port),
    ] {
        if !(1..=65534).contains(&port) {
            anyhow::bail!("Invalid {} port number: {}", name, port);
        }
    }

    if config.device.timeout_ms == 0 || config.collector.timeout_ms == 0 {
        anyhow::bail!("Device and collector timeouts must be greater than zero");
    }

    if !is_valid_ip_address(&config.collector.address) {
        // Hostnames are accepted by the server, only flag the value
        debug!(
            "Potentially invalid collector address format: {}",
            config.collector.address
        );
    }

    Ok(())
}

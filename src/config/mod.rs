// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the power meter telemetry tools
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before being deserialized.
//!
//! ## Configuration Structure
//!
//! - `device`: Modbus TCP connection to the power meter
//! - `collector`: where the agent posts snapshots, where the collector listens
//! - `acquisition`: acquisition period and measurement group table
//! - `simulator`: settings of the simulated field device
//!
//! ## Environment Overrides
//!
//! Deployment specific values can be overridden without editing the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `POWERMETER_DEVICE_ADDRESS` | `device.address` |
//! | `POWERMETER_DEVICE_PORT` | `device.port` |
//! | `POWERMETER_DEVICE_UNIT_ID` | `device.unit_id` |
//! | `POWERMETER_COLLECTOR_URL` | `collector.base_url` |
//! | `POWERMETER_COLLECTOR_PATH` | `collector.data_path` |
//! | `POWERMETER_COLLECTOR_ADDRESS` | `collector.address` |
//! | `POWERMETER_COLLECTOR_PORT` | `collector.port` |
//! | `POWERMETER_PERIOD_MS` | `acquisition.period_ms` |
//!
//! ## Usage
//!
//! ```no_run
//! use rust_powermeter::config::Config;
//!
//! let mut config = Config::from_file("config.yaml").unwrap();
//! config.apply_env().unwrap();
//! config.validate().unwrap();
//! println!("Polling {} every {} ms", config.device.socket_address(), config.acquisition.period_ms);
//! ```

pub mod acquisition;
pub mod collector;
pub mod device;
pub mod simulator;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::{AcquisitionConfig, MeasurementGroupConfig};
pub use collector::CollectorConfig;
pub use device::{DeviceConfig, RegisterKind};
pub use simulator::SimulatorConfig;
pub use utils::{is_valid_ip_address, output_config_schema};

/// Embedded JSON schema used to validate configuration files.
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Prefix shared by all environment overrides.
pub const ENV_PREFIX: &str = "POWERMETER_";

/// Root configuration structure.
///
/// Every section falls back to its defaults when missing from the file, so a
/// minimal file only lists what differs from the factory setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modbus TCP connection to the field device.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Collector endpoint and server settings.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Acquisition period and measurement group table.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Simulated field device settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails schema
    /// validation, deserialization or the specific rules is rejected, and a
    /// `*.sample.yaml` file with default values is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // YAML is converted to JSON so the schema validator can inspect it
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            let message = error.to_string();
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", message);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = config.validate() {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate the rules the JSON schema cannot express
    ///
    /// Binaries call this after [`Config::apply_env`] so that overridden
    /// values are checked too.
    pub fn validate(&self) -> Result<()> {
        utils::validate_specific_rules(self)
    }

    /// Apply `POWERMETER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides provided by `lookup`, keyed by full variable name.
    ///
    /// ### Errors
    ///
    /// Fails if a numeric variable cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(address) = var("DEVICE_ADDRESS") {
            debug!("Overriding device address from environment: {}", address);
            self.device.address = address;
        }
        if let Some(port) = parse_override(&var, "DEVICE_PORT")? {
            debug!("Overriding device port from environment: {}", port);
            self.device.port = port;
        }
        if let Some(unit_id) = parse_override(&var, "DEVICE_UNIT_ID")? {
            debug!("Overriding device unit id from environment: {}", unit_id);
            self.device.unit_id = unit_id;
        }
        if let Some(url) = var("COLLECTOR_URL") {
            debug!("Overriding collector URL from environment: {}", url);
            self.collector.base_url = url;
        }
        if let Some(data_path) = var("COLLECTOR_PATH") {
            debug!("Overriding collector path from environment: {}", data_path);
            self.collector.data_path = data_path;
        }
        if let Some(address) = var("COLLECTOR_ADDRESS") {
            debug!("Overriding collector bind address from environment: {}", address);
            self.collector.address = address;
        }
        if let Some(port) = parse_override(&var, "COLLECTOR_PORT")? {
            debug!("Overriding collector port from environment: {}", port);
            self.collector.port = port;
        }
        if let Some(period_ms) = parse_override(&var, "PERIOD_MS")? {
            debug!("Overriding acquisition period from environment: {} ms", period_ms);
            self.acquisition.period_ms = period_ms;
        }

        Ok(())
    }
}

fn parse_override<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value '{}' for {}{}", raw, ENV_PREFIX, name))
        })
        .transpose()
}

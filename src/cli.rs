// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command line handling shared by the service binaries
//!
//! Binaries only select the configuration file and operational flags.
//! Measurement settings always come from the configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::{debug, info};

use crate::config::{output_config_schema, Config};

/// Flags common to `acquisition_agent`, `collector` and `device_simulator`.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to configuration file (YAML format)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    pub validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    pub show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl CommonArgs {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Off
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    /// Initialize `env_logger`; `RUST_LOG` is honoured unless `-v` or `-q` is given.
    pub fn init_logging(&self) {
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        );
        if self.quiet || self.verbose {
            builder.filter_level(self.log_level());
        }
        // A logger may already be installed, e.g. when called twice
        let _ = builder.try_init();
    }

    /// Handle the one-shot flags, or load the configuration.
    ///
    /// Returns `None` when a one-shot flag was handled and the binary should
    /// exit. Otherwise the configuration is loaded, environment overrides
    /// applied and the result validated.
    pub fn load_config(&self) -> Result<Option<Config>> {
        if self.show_config_schema {
            output_config_schema()?;
            return Ok(None);
        }

        if let Some(validate_path) = &self.validate_config {
            if !validate_path.exists() {
                anyhow::bail!(
                    "Configuration file does not exist: {}",
                    validate_path.display()
                );
            }
            Config::from_file(validate_path)
                .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
            println!("Configuration file is valid: {}", validate_path.display());
            return Ok(None);
        }

        debug!("Loading configuration from {}", self.config.display());
        let mut config = Config::from_file(&self.config)?;
        config.apply_env()?;
        config.validate()?;
        info!("Configuration loaded from {}", self.config.display());
        Ok(Some(config))
    }
}

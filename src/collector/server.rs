// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server builder for the collector

use log::debug;
use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use rocket::{catchers, routes, Build, Rocket};

use super::api::{get_data, ingest_data, not_found};
use super::state::CollectorState;
use crate::config::CollectorConfig;

/// Rocket configuration for the collector: bind address, port and body limit.
pub fn collector_figment(config: &CollectorConfig) -> Figment {
    rocket::Config::figment()
        .merge(("ident", "rust-powermeter-collector"))
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge((
            "limits",
            Limits::default().limit("string", config.payload_limit_kib.kibibytes()),
        ))
        .merge(("log_level", LogLevel::Normal))
}

/// Build a configured Rocket instance serving `state`.
///
/// ### Example
///
/// ```
/// use rust_powermeter::collector::{build_rocket, collector_figment, CollectorState};
/// use rust_powermeter::config::CollectorConfig;
///
/// let figment = collector_figment(&CollectorConfig::default());
/// let rocket = build_rocket(figment, CollectorState::new());
/// // rocket.launch().await
/// ```
pub fn build_rocket(figment: Figment, state: CollectorState) -> Rocket<Build> {
    debug!("Mounting collector routes");
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![ingest_data, get_data])
        .register("/", catchers![not_found])
}

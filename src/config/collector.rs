// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector configuration
//!
//! The same section serves both sides of the HTTP link: the agent reads
//! `base_url` and `data_path` to know where to post, the collector server reads
//! `address`, `port` and `payload_limit_kib` to know where to listen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Base URL the agent posts snapshots to, e.g. `http://localhost:5000`.
    pub base_url: String,

    /// Ingestion path appended to `base_url`.
    ///
    /// The collector server always serves `/data`; another value only makes
    /// sense behind a proxy that rewrites the path.
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Timeout of one snapshot submission, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Address the collector server binds to.
    pub address: String,

    /// Port the collector server listens on.
    pub port: u16,

    /// Largest accepted ingestion body, in KiB.
    #[serde(default = "default_payload_limit_kib")]
    pub payload_limit_kib: u64,
}

fn default_data_path() -> String {
    "/data".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_payload_limit_kib() -> u64 {
    64
}

impl CollectorConfig {
    /// Full ingestion URL, joining `base_url` and `data_path` with a single slash.
    pub fn ingest_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.data_path.trim_start_matches('/')
        )
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            data_path: default_data_path(),
            timeout_ms: default_timeout_ms(),
            address: "0.0.0.0".to_string(),
            port: 5000,
            payload_limit_kib: default_payload_limit_kib(),
        }
    }
}

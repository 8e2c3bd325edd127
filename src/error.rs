// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy shared by the acquisition agent and the collector
//!
//! Each variant family maps to one failure domain:
//!
//! - [`DecodeError`]: malformed register sequences, a configuration bug
//! - [`TransportError`]: the field device could not be reached or read
//! - [`DeliveryError`]: the snapshot could not be handed to the collector
//! - [`CollectorError`]: the collector refused an ingestion request
//!
//! Per-cycle errors are logged and contained by the agent loop; only
//! configuration errors are fatal, and they surface at startup.

use std::time::Duration;

use thiserror::Error;
use tokio_modbus::prelude::ExceptionCode;

/// Errors raised while turning raw registers into floating-point readings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid register count: expected 2 registers for a float32 value, got {count}")]
    InvalidRegisterCount { count: usize },

    #[error("Invalid register block length {len}: a block must hold a non-zero, even number of registers")]
    InvalidBlockLength { len: usize },

    #[error("Register block {address}+{count} runs past the last register address 65535")]
    AddressOutOfRange { address: u16, count: u16 },
}

/// Errors raised by a register source while talking to the field device.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to field device at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reading {count} registers at address {address} failed: {reason}")]
    Read {
        address: u16,
        count: u16,
        reason: String,
    },

    #[error("Field device answered reading {count} registers at address {address} with exception: {code:?}")]
    Exception {
        address: u16,
        count: u16,
        code: ExceptionCode,
    },

    #[error("Reading {count} registers at address {address} timed out after {timeout:?}")]
    Timeout {
        address: u16,
        count: u16,
        timeout: Duration,
    },

    #[error("Field device returned {actual} registers at address {address}, expected {expected}")]
    ShortRead {
        address: u16,
        expected: u16,
        actual: usize,
    },
}

/// Errors raised while submitting a snapshot to the collector.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid collector URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to reach collector at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Collector at {url} answered HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// Errors raised by the collector when a request cannot be honoured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Payload exceeds the configured size limit of {limit_kib} KiB")]
    PayloadTooLarge { limit_kib: u64 },
}

impl CollectorError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        CollectorError::MalformedPayload {
            reason: reason.into(),
        }
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector service
//!
//! Holds the latest snapshot pushed by the acquisition agent and serves it
//! back over HTTP.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /data` | replace the stored snapshot, answers `201` |
//! | `GET /data` | current snapshot, empty until the first ingestion |

pub mod api;
pub mod server;
pub mod state;

pub use server::{build_rocket, collector_figment};
pub use state::{CollectorSlot, CollectorState};

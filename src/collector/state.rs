// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector state
//!
//! A single process-wide slot holding the most recent snapshot. Ingestion
//! swaps the whole slot under one write guard, so readers see either the
//! previous snapshot or the new one, never a mix. Last writer wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::snapshot::Snapshot;

/// Content of the collector slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectorSlot {
    /// Latest ingested snapshot, empty at startup
    pub snapshot: Snapshot,
    /// When the snapshot was ingested, `None` before the first ingestion
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of accepted ingestions since startup
    pub ingested: u64,
}

/// Shared handle on the collector slot.
///
/// Cloning is cheap and every clone refers to the same slot.
#[derive(Debug, Clone, Default)]
pub struct CollectorState {
    slot: Arc<RwLock<CollectorSlot>>,
}

impl CollectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot wholesale.
    ///
    /// Returns the ingestion count including this one.
    pub async fn ingest(&self, snapshot: Snapshot) -> u64 {
        for (key, reading) in snapshot.iter() {
            debug!("Ingested {}: {:?}", key, reading);
        }

        let mut slot = self.slot.write().await;
        let ingested = slot.ingested + 1;
        *slot = CollectorSlot {
            snapshot,
            updated_at: Some(Utc::now()),
            ingested,
        };
        ingested
    }

    /// Copy of the whole slot.
    pub async fn query(&self) -> CollectorSlot {
        self.slot.read().await.clone()
    }

    /// Copy of the stored snapshot only.
    pub async fn snapshot(&self) -> Snapshot {
        self.slot.read().await.snapshot.clone()
    }
}

/// Rocket request guard giving routes access to the managed state
#[rocket::async_trait]
impl<'r> rocket::request::FromRequest<'r> for &'r CollectorState {
    type Error = ();

    async fn from_request(
        request: &'r rocket::Request<'_>,
    ) -> rocket::request::Outcome<Self, Self::Error> {
        match request.rocket().state::<CollectorState>() {
            Some(state) => rocket::request::Outcome::Success(state),
            None => rocket::request::Outcome::Error((
                rocket::http::Status::InternalServerError,
                (),
            )),
        }
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Snapshot delivery
//!
//! The agent hands every snapshot to a [`SnapshotSink`]. In production this is
//! the [`HttpSnapshotSink`] posting to the collector; tests plug their own
//! sink to observe what would have been sent.

pub mod http;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::snapshot::Snapshot;

pub use http::HttpSnapshotSink;

/// Destination of acquired snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Submit one full snapshot. A single attempt, no retry.
    async fn submit(&self, snapshot: &Snapshot) -> Result<(), DeliveryError>;

    /// Short human readable description, used in logs
    fn describe(&self) -> String;
}

/// Sink keeping every submitted snapshot in memory.
///
/// Clones share the same storage, so a test can keep one handle and give the
/// other to the agent.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    submitted: Arc<Mutex<Vec<Snapshot>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all snapshots submitted so far, oldest first.
    pub fn submitted(&self) -> Vec<Snapshot> {
        match self.submitted.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn submit(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        match self.submitted.lock() {
            Ok(mut guard) => guard.push(snapshot.clone()),
            Err(poisoned) => poisoned.into_inner().push(snapshot.clone()),
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition agent
//!
//! The agent polls every configured measurement group, decodes the blocks it
//! could read into one snapshot and submits that snapshot. Failures stay
//! inside the cycle that produced them: a group that cannot be read is left
//! out of the snapshot, and a failed submission is retried only by the next
//! cycle. Cycles are scheduled with a fixed delay, the next one starting one
//! period after the previous one finished.

use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::sleep;

use super::{groups_from_config, MeasurementGroup, RegisterSource};
use crate::config::AcquisitionConfig;
use crate::delivery::SnapshotSink;
use crate::error::DeliveryError;
use crate::snapshot::Snapshot;

/// Outcome of one acquisition cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// Groups whose block was read and decoded
    pub groups_read: Vec<String>,
    /// Groups left out of the snapshot, with the reason
    pub groups_failed: Vec<(String, String)>,
    /// Channel keys dropped because the decoded value was not finite
    pub skipped_keys: Vec<String>,
    /// The snapshot handed to the sink
    pub snapshot: Snapshot,
    /// Result of the single submission attempt
    pub delivery: Result<(), DeliveryError>,
}

impl CycleReport {
    pub fn delivered(&self) -> bool {
        self.delivery.is_ok()
    }
}

/// Periodic read / decode / submit loop.
pub struct AcquisitionAgent {
    source: Box<dyn RegisterSource>,
    sink: Box<dyn SnapshotSink>,
    groups: Vec<MeasurementGroup>,
    period: Duration,
    cycles: u64,
}

impl AcquisitionAgent {
    pub fn new(
        source: Box<dyn RegisterSource>,
        sink: Box<dyn SnapshotSink>,
        groups: Vec<MeasurementGroup>,
        period: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            groups,
            period,
            cycles: 0,
        }
    }

    /// Build an agent from the acquisition section of the configuration.
    ///
    /// ### Errors
    ///
    /// Fails if a measurement group has an odd or zero register count.
    pub fn from_config(
        config: &AcquisitionConfig,
        source: Box<dyn RegisterSource>,
        sink: Box<dyn SnapshotSink>,
    ) -> Result<Self> {
        let groups = groups_from_config(&config.groups)?;
        Ok(Self::new(
            source,
            sink,
            groups,
            Duration::from_millis(config.period_ms),
        ))
    }

    pub fn groups(&self) -> &[MeasurementGroup] {
        &self.groups
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run a single cycle: read every group, build the snapshot, submit it.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let mut snapshot = Snapshot::new();
        let mut groups_read = Vec::new();
        let mut groups_failed = Vec::new();
        let mut skipped_keys = Vec::new();

        for group in &self.groups {
            let registers = match self
                .source
                .read_registers(group.address(), group.count())
                .await
            {
                Ok(registers) => registers,
                Err(e) => {
                    warn!("Failed to read group {}: {}", group.name(), e);
                    groups_failed.push((group.name().to_string(), e.to_string()));
                    continue;
                }
            };

            match group.decode(&registers) {
                Ok(readings) => {
                    debug!("Group {} decoded as {:?}", group.name(), readings);
                    for key in snapshot.insert_group(group.name(), &readings) {
                        warn!("Skipping {}: decoded value is not a finite number", key);
                        skipped_keys.push(key);
                    }
                    groups_read.push(group.name().to_string());
                }
                Err(e) => {
                    warn!("Failed to decode group {}: {}", group.name(), e);
                    groups_failed.push((group.name().to_string(), e.to_string()));
                }
            }
        }

        let delivery = self.sink.submit(&snapshot).await;
        match &delivery {
            Ok(()) => info!(
                "Cycle {}: submitted {} readings ({} groups read, {} failed)",
                self.cycles,
                snapshot.len(),
                groups_read.len(),
                groups_failed.len()
            ),
            Err(e) => error!("Cycle {}: failed to submit snapshot: {}", self.cycles, e),
        }

        CycleReport {
            cycle: self.cycles,
            groups_read,
            groups_failed,
            skipped_keys,
            snapshot,
            delivery,
        }
    }

    /// Poll until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The shutdown signal interrupts the sleep between cycles; a cycle that
    /// already started runs to completion.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Acquisition agent started: {} groups from {} to {}, every {:?}",
            self.groups.len(),
            self.source.describe(),
            self.sink.describe(),
            self.period
        );

        while !*shutdown.borrow() {
            self.run_cycle().await;
            if !wait_next_cycle(self.period, &mut shutdown).await {
                break;
            }
        }

        info!("Acquisition agent stopped after {} cycles", self.cycles);
        Ok(())
    }
}

/// Sleep for `period`. Returns `false` if shutdown was requested meanwhile.
async fn wait_next_cycle(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let delay = sleep(period);
    tokio::pin!(delay);

    loop {
        tokio::select! {
            _ = &mut delay => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management
//!
//! Every service runs as an independent tokio task tracked by [`Daemon`].
//! Shutdown is broadcast through a `watch` channel that the agent and the
//! simulator race against their waits; the collector is stopped through its
//! Rocket [`Shutdown`] handle.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use rocket::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::acquisition::{groups_from_config, AcquisitionAgent, ModbusRegisterSource};
use crate::collector::{build_rocket, collector_figment, CollectorState};
use crate::config::Config;
use crate::delivery::HttpSnapshotSink;
use crate::modbus::{serve, SimulatedDevice};

/// How long [`Daemon::join`] waits for each task.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks the background tasks of one process and coordinates their shutdown.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    shutdown_tx: watch::Sender<bool>,
    rocket_shutdown: Option<Shutdown>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a daemon with no task running.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            shutdown_tx,
            rocket_shutdown: None,
        }
    }

    /// A receiver that turns `true` when [`Daemon::shutdown`] is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Start the acquisition agent against the configured Modbus device.
    ///
    /// The device connection is attempted once here. A failure is logged and
    /// not fatal: the agent retries on its next read.
    ///
    /// ### Errors
    ///
    /// Fails on configuration errors: an invalid collector URL or an invalid
    /// measurement group. An unresolvable device name is a connection failure.
    pub async fn launch_agent(&mut self, config: &Config) -> Result<()> {
        let mut source = ModbusRegisterSource::from_config(&config.device);
        if let Err(e) = source.connect().await {
            warn!("Initial connection to field device failed: {}", e);
        }

        let sink = HttpSnapshotSink::from_config(&config.collector)
            .context("Invalid collector configuration")?;
        let agent = AcquisitionAgent::from_config(
            &config.acquisition,
            Box::new(source),
            Box::new(sink),
        )?;

        self.spawn_agent(agent);
        Ok(())
    }

    /// Start an already built agent.
    pub fn spawn_agent(&mut self, mut agent: AcquisitionAgent) {
        let shutdown = self.shutdown_signal();
        let task = tokio::spawn(async move { agent.run(shutdown).await });
        self.tasks.push(task);
    }

    /// Start the collector HTTP server serving `state`.
    ///
    /// ### Errors
    ///
    /// Fails if Rocket cannot be ignited (invalid figment values).
    pub async fn launch_collector(&mut self, config: &Config, state: CollectorState) -> Result<()> {
        info!(
            "Starting collector on {}:{}",
            config.collector.address, config.collector.port
        );

        let rocket = build_rocket(collector_figment(&config.collector), state);
        let ignited = rocket
            .ignite()
            .await
            .context("Failed to ignite collector server")?;
        self.rocket_shutdown = Some(ignited.shutdown());

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok(())
        });
        self.tasks.push(task);
        Ok(())
    }

    /// Start the simulated field device on the configured address.
    ///
    /// Returns the bound address and a handle on the device, which can be used
    /// to change channel values while it is being served.
    pub async fn launch_simulator(
        &mut self,
        config: &Config,
    ) -> Result<(SocketAddr, SimulatedDevice)> {
        let groups = groups_from_config(&config.acquisition.groups)?;
        let device = SimulatedDevice::with_groups(&groups, &config.simulator.values);

        let bind = format!("{}:{}", config.simulator.address, config.simulator.port);
        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind simulated device on {}", bind))?;
        let local_addr = self.spawn_simulator(listener, device.clone())?;
        Ok((local_addr, device))
    }

    /// Serve `device` on an already bound listener.
    pub fn spawn_simulator(
        &mut self,
        listener: TcpListener,
        device: SimulatedDevice,
    ) -> Result<SocketAddr> {
        let local_addr = listener.local_addr()?;
        let shutdown = self.shutdown_signal();
        let task = tokio::spawn(async move { serve(listener, device, shutdown).await });
        self.tasks.push(task);
        Ok(local_addr)
    }

    /// Number of tasks started so far.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task to stop.
    ///
    /// This only signals; call [`Daemon::join`] to wait for the tasks.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        // No receiver left is fine, tasks already ended
        let _ = self.shutdown_tx.send(true);
        if let Some(shutdown) = &self.rocket_shutdown {
            shutdown.clone().notify();
        }
    }

    /// Wait for every task, giving each at most five seconds.
    ///
    /// Task failures and panics are logged, not returned.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match tokio::time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}

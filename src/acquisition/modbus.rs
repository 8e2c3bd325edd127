// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP register source
//!
//! The connection is opened once and kept across cycles. When a read fails at
//! the transport level the connection is dropped, and the next read opens a
//! new one. Exception responses from the device leave the connection intact.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::net::lookup_host;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context as ModbusContext};
use tokio_modbus::prelude::*;

use super::RegisterSource;
use crate::config::{DeviceConfig, RegisterKind};
use crate::error::TransportError;

/// Register source backed by a Modbus TCP client.
pub struct ModbusRegisterSource {
    target: String,
    unit_id: u8,
    register_kind: RegisterKind,
    timeout: Duration,
    ctx: Option<ModbusContext>,
}

impl ModbusRegisterSource {
    /// Create a source for `target` (`host:port` or a socket address), without connecting.
    ///
    /// The host name is resolved on every connection attempt, so a device
    /// whose name does not resolve yet is retried like an unreachable one.
    pub fn new(
        target: impl ToString,
        unit_id: u8,
        register_kind: RegisterKind,
        timeout: Duration,
    ) -> Self {
        Self {
            target: target.to_string(),
            unit_id,
            register_kind,
            timeout,
            ctx: None,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.socket_address(),
            config.unit_id,
            config.register_kind,
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    /// Open the connection if it is not open yet.
    ///
    /// Resolution and connection share the configured timeout.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ctx.is_some() {
            return Ok(());
        }

        debug!(
            "Connecting to field device at {} (unit {})",
            self.target, self.unit_id
        );
        let ctx = match timeout(self.timeout, open_context(&self.target, self.unit_id)).await {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(source)) => {
                return Err(TransportError::Connect {
                    addr: self.target.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(TransportError::Connect {
                    addr: self.target.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("connection timed out after {:?}", self.timeout),
                    ),
                })
            }
        };

        info!("Connected to field device at {}", self.target);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn drop_connection(&mut self) {
        if self.ctx.take().is_some() {
            warn!(
                "Dropping connection to field device at {}, it will be reopened on next read",
                self.target
            );
        }
    }
}

/// Resolve `target` and connect to the first address found.
async fn open_context(target: &str, unit_id: u8) -> std::io::Result<ModbusContext> {
    let socket_addr: SocketAddr = lookup_host(target).await?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address found for {}", target),
        )
    })?;
    debug!("Field device {} resolved to {}", target, socket_addr);
    tcp::connect_slave(socket_addr, Slave(unit_id)).await
}

#[async_trait]
impl RegisterSource for ModbusRegisterSource {
    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.connect().await?;
        let register_kind = self.register_kind;
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(TransportError::Read {
                address,
                count,
                reason: "no connection to field device".to_string(),
            });
        };

        debug!(
            "Reading {} {:?} registers starting from address {}",
            count, register_kind, address
        );
        // Raw call: the typed readers assume the device honours the count
        let request = match register_kind {
            RegisterKind::Input => Request::ReadInputRegisters(address, count),
            RegisterKind::Holding => Request::ReadHoldingRegisters(address, count),
        };

        let registers = match timeout(self.timeout, ctx.call(request)).await {
            Ok(Ok(Ok(
                Response::ReadInputRegisters(registers) | Response::ReadHoldingRegisters(registers),
            ))) => registers,
            Ok(Ok(Ok(response))) => {
                return Err(TransportError::Read {
                    address,
                    count,
                    reason: format!("unexpected response {:?}", response),
                })
            }
            Ok(Ok(Err(code))) => {
                return Err(TransportError::Exception {
                    address,
                    count,
                    code,
                })
            }
            Ok(Err(e)) => {
                self.drop_connection();
                return Err(TransportError::Read {
                    address,
                    count,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                // The stream may hold a late reply, do not reuse it
                self.drop_connection();
                return Err(TransportError::Timeout {
                    address,
                    count,
                    timeout: self.timeout,
                });
            }
        };

        if registers.len() != count as usize {
            return Err(TransportError::ShortRead {
                address,
                expected: count,
                actual: registers.len(),
            });
        }

        debug!("Raw registers at {}: {:?}", address, registers);
        Ok(registers)
    }

    fn describe(&self) -> String {
        format!("modbus://{} (unit {})", self.target, self.unit_id)
    }
}

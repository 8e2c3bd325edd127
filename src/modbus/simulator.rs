// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server simulating the power meter
//!
//! ## Register Map
//!
//! Every configured measurement group occupies `count` registers from its start
//! address, in both the input and the holding register tables. Channel `N` of
//! a group sits at `address + 2 * (N - 1)`, low word first:
//!
//! | Register | Content |
//! |----------|---------|
//! | `address` | low 16 bits of channel 1 |
//! | `address + 1` | high 16 bits of channel 1 |
//! | `address + 2` | low 16 bits of channel 2 |
//! | ... | ... |
//!
//! Reads touching an unmapped register answer `IllegalDataAddress`. Holding
//! registers can be written, input registers cannot.

use std::collections::{BTreeMap, HashMap};
use std::future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::acquisition::MeasurementGroup;
use crate::config::RegisterKind;
use crate::registers::{encode_block, encode_f32, REGISTERS_PER_CHANNEL};

type RegisterMap = Arc<Mutex<HashMap<u16, u16>>>;

/// Simulated power meter.
///
/// Clones share the same register tables, so a handle kept by the caller can
/// update values while connections are being served.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice {
    input_registers: RegisterMap,
    holding_registers: RegisterMap,
}

impl tokio_modbus::server::Service for SimulatedDevice {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request
    ///
    /// Supported function codes:
    /// - 0x04: Read Input Registers
    /// - 0x03: Read Holding Registers
    /// - 0x10: Write Multiple Registers
    /// - 0x06: Write Single Register
    ///
    /// Any other function code answers `IllegalFunction`.
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadInputRegisters(addr, cnt) => lock_for_request(&self.input_registers)
                .and_then(|registers| register_read(&registers, addr, cnt))
                .map(Response::ReadInputRegisters),
            Request::ReadHoldingRegisters(addr, cnt) => lock_for_request(&self.holding_registers)
                .and_then(|registers| register_read(&registers, addr, cnt))
                .map(Response::ReadHoldingRegisters),
            Request::WriteMultipleRegisters(addr, values) => {
                lock_for_request(&self.holding_registers)
                    .and_then(|mut registers| register_write(&mut registers, addr, &values))
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => lock_for_request(&self.holding_registers)
                .and_then(|mut registers| {
                    register_write(&mut registers, addr, std::slice::from_ref(&value))
                })
                .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => {
                error!("Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            warn!("Modbus request answered with exception: {:?}", e);
        }

        future::ready(res)
    }
}

impl SimulatedDevice {
    /// Create a device with empty register tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device exposing `groups`, with channel values taken from `values`.
    ///
    /// Channels without a configured value read as `0.0`.
    pub fn with_groups(groups: &[MeasurementGroup], values: &BTreeMap<String, Vec<f32>>) -> Self {
        let device = Self::new();
        for group in groups {
            let configured = values.get(group.name()).map(Vec::as_slice).unwrap_or(&[]);
            let channels: Vec<f32> = (0..group.channels())
                .map(|index| configured.get(index).copied().unwrap_or(0.0))
                .collect();
            if configured.len() > channels.len() {
                warn!(
                    "Group {} has {} channels, ignoring {} extra simulated values",
                    group.name(),
                    channels.len(),
                    configured.len() - channels.len()
                );
            }
            device.set_registers(group.address(), &encode_block(&channels));
            debug!("Simulating group {} as {:?}", group.name(), channels);
        }
        device
    }

    /// Store raw registers from `address` in both register tables.
    pub fn set_registers(&self, address: u16, values: &[u16]) {
        for table in [&self.input_registers, &self.holding_registers] {
            let mut registers = lock_for_update(table);
            // Values past the last register are dropped, never wrapped to 0
            for (reg_addr, value) in (address..=u16::MAX).zip(values) {
                registers.insert(reg_addr, *value);
            }
        }
    }

    /// Update channel `channel` (1-based) of `group`.
    pub fn set_channel(&self, group: &MeasurementGroup, channel: usize, value: f32) -> Result<()> {
        if channel == 0 || channel > group.channels() {
            anyhow::bail!(
                "Group {} has no channel {} (1..={})",
                group.name(),
                channel,
                group.channels()
            );
        }
        let offset = ((channel - 1) * REGISTERS_PER_CHANNEL) as u16;
        self.set_registers(group.address() + offset, &encode_f32(value));
        debug!("Channel {} of {} set to {}", channel, group.name(), value);
        Ok(())
    }

    /// Current value of one register, `None` when unmapped.
    pub fn register(&self, kind: RegisterKind, address: u16) -> Option<u16> {
        let table = match kind {
            RegisterKind::Input => &self.input_registers,
            RegisterKind::Holding => &self.holding_registers,
        };
        lock_for_update(table).get(&address).copied()
    }
}

fn lock_for_request(map: &RegisterMap) -> Result<MutexGuard<'_, HashMap<u16, u16>>, ExceptionCode> {
    map.lock().map_err(|_| {
        error!("Exception::ServerDeviceFailure - Register table lock poisoned");
        ExceptionCode::ServerDeviceFailure
    })
}

fn lock_for_update(map: &RegisterMap) -> MutexGuard<'_, HashMap<u16, u16>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Read `cnt` registers from `addr`, failing on the first unmapped address.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = Vec::with_capacity(cnt.into());

    for i in 0..cnt {
        let Some(reg_addr) = addr.checked_add(i) else {
            warn!("Exception::IllegalDataAddress - Read {}+{} past the last register", addr, cnt);
            return Err(ExceptionCode::IllegalDataAddress);
        };
        match registers.get(&reg_addr) {
            Some(value) => response_values.push(*value),
            None => {
                warn!(
                    "Exception::IllegalDataAddress - Register {} not found",
                    reg_addr
                );
                return Err(ExceptionCode::IllegalDataAddress);
            }
        }
    }

    debug!("Successfully read {} registers from address {}", cnt, addr);
    Ok(response_values)
}

/// Write `values` from `addr`; every target register must already be mapped.
fn register_write(
    registers: &mut HashMap<u16, u16>,
    addr: u16,
    values: &[u16],
) -> Result<(), ExceptionCode> {
    let targets: Vec<u16> = (addr..=u16::MAX).take(values.len()).collect();
    if targets.len() < values.len() {
        warn!(
            "Exception::IllegalDataAddress - Write {}+{} past the last register",
            addr,
            values.len()
        );
        return Err(ExceptionCode::IllegalDataAddress);
    }
    if let Some(missing) = targets.iter().find(|a| !registers.contains_key(a)) {
        warn!(
            "Exception::IllegalDataAddress - Register {} not found",
            missing
        );
        return Err(ExceptionCode::IllegalDataAddress);
    }

    for (reg_addr, value) in targets.into_iter().zip(values) {
        registers.insert(reg_addr, *value);
    }

    debug!(
        "Successfully wrote {} values starting at register {}",
        values.len(),
        addr
    );
    Ok(())
}

/// Serve `device` on `listener` until `shutdown` turns `true` or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    device: SimulatedDevice,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Simulated field device listening on {}", local_addr);

    let server = Server::new(listener);
    let on_connected = move |stream, socket_addr: SocketAddr| {
        let device = device.clone();
        debug!("Modbus client connected from {}", socket_addr);
        async move {
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(device.clone()))
            })
        }
    };
    let on_process_error = |err| {
        error!("Modbus server error: {err}");
    };

    tokio::select! {
        result = server.serve(&on_connected, on_process_error) => {
            result?;
        }
        _ = wait_for_shutdown(&mut shutdown) => {
            info!("Simulated field device on {} stopped", local_addr);
        }
    }
    Ok(())
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

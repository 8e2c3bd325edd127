// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus register reads against the simulated field device
//!
//! Each test starts a simulated device on an OS assigned port and reads it
//! through [`ModbusRegisterSource`], the same client the agent uses.

use std::collections::BTreeMap;
use std::future;
use std::net::SocketAddr;
use std::time::Duration;

use approx::assert_relative_eq;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use rust_powermeter::acquisition::{
    AcquisitionAgent, MeasurementGroup, ModbusRegisterSource, RegisterSource,
};
use rust_powermeter::config::RegisterKind;
use rust_powermeter::delivery::MemorySink;
use rust_powermeter::error::TransportError;
use rust_powermeter::modbus::{serve, SimulatedDevice};
use rust_powermeter::snapshot::Reading;

const TIMEOUT: Duration = Duration::from_secs(1);

/// Start `device` in the background, returning its address and the shutdown sender.
async fn start_test_device(device: SimulatedDevice) -> (SocketAddr, watch::Sender<bool>) {
    // Use port 0 to let the OS assign an available port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = serve(listener, device, shutdown_rx).await {
            eprintln!("Server error: {}", e);
        }
    });

    (socket_addr, shutdown_tx)
}

fn meter_groups() -> Vec<MeasurementGroup> {
    vec![
        MeasurementGroup::new("VOLTAGE", 352, 2).unwrap(),
        MeasurementGroup::new("FREQUENCY", 424, 2).unwrap(),
    ]
}

#[tokio::test]
async fn test_reads_word_swapped_registers() {
    let device = SimulatedDevice::new();
    device.set_registers(352, &[49709, 17262]);
    let (socket_addr, _shutdown) = start_test_device(device).await;

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let registers = source.read_registers(352, 2).await.unwrap();

    assert_eq!(registers, vec![49709, 17262]);
}

#[tokio::test]
async fn test_agent_decodes_known_voltage() {
    let device = SimulatedDevice::with_groups(&meter_groups(), &BTreeMap::new());
    device.set_registers(352, &[49709, 17262]);
    device
        .set_channel(&meter_groups()[1], 1, 50.0)
        .unwrap();
    let (socket_addr, _shutdown) = start_test_device(device).await;

    let source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let mut agent = AcquisitionAgent::new(
        Box::new(source),
        Box::new(MemorySink::new()),
        meter_groups(),
        Duration::from_secs(5),
    );
    let report = agent.run_cycle().await;

    assert!(report.groups_failed.is_empty(), "{:?}", report.groups_failed);
    match report.snapshot.get("VOLTAGE_Channel1") {
        Some(Reading::Scalar(value)) => {
            assert_eq!(*value, f64::from(f32::from_bits(0x436E_C22D)));
            assert_relative_eq!(*value, 238.7585, epsilon = 1e-4);
        }
        other => panic!("unexpected voltage reading {:?}", other),
    }
    assert_eq!(
        report.snapshot.get("FREQUENCY_Channel1"),
        Some(&Reading::Scalar(50.0))
    );
}

#[tokio::test]
async fn test_holding_registers_can_be_selected() {
    let device = SimulatedDevice::with_groups(&meter_groups(), &BTreeMap::new());
    let (socket_addr, _shutdown) = start_test_device(device).await;

    // Write through the client, then read back through the source
    let mut ctx = tcp::connect(socket_addr).await.unwrap();
    ctx.write_multiple_registers(424, &[0, 16968])
        .await
        .unwrap()
        .unwrap();

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Holding, TIMEOUT);
    assert_eq!(source.read_registers(424, 2).await.unwrap(), vec![0, 16968]);

    let mut input = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    assert_eq!(input.read_registers(424, 2).await.unwrap(), vec![0, 0]);
}

#[tokio::test]
async fn test_exception_keeps_the_connection() {
    let device = SimulatedDevice::with_groups(&meter_groups(), &BTreeMap::new());
    let (socket_addr, _shutdown) = start_test_device(device).await;

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let err = source.read_registers(1000, 2).await.unwrap_err();

    assert!(
        matches!(
            err,
            TransportError::Exception {
                address: 1000,
                code: ExceptionCode::IllegalDataAddress,
                ..
            }
        ),
        "{:?}",
        err
    );
    assert!(source.is_connected());
    assert!(source.read_registers(352, 2).await.is_ok());
}

#[tokio::test]
async fn test_unreachable_device_is_a_connect_error() {
    // Bind then drop to get a port nothing listens on
    let socket_addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let err = source.read_registers(352, 2).await.unwrap_err();

    assert!(matches!(err, TransportError::Connect { .. }), "{:?}", err);
    assert!(!source.is_connected());
}

#[tokio::test]
async fn test_transport_failure_drops_the_connection() {
    // A peer that accepts and hangs up, like a meter rebooting mid request
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    for _ in 0..2 {
        let err = source.read_registers(352, 2).await.unwrap_err();
        assert!(
            matches!(
                err,
                TransportError::Read { .. }
                    | TransportError::Timeout { .. }
                    | TransportError::Connect { .. }
            ),
            "{:?}",
            err
        );
        assert!(!source.is_connected());
    }
}

/// A meter that answers every input register read at `short_at` with a single register.
#[derive(Clone)]
struct TruncatingMeter {
    short_at: u16,
}

impl tokio_modbus::server::Service for TruncatingMeter {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadInputRegisters(addr, _) if addr == self.short_at => {
                Ok(Response::ReadInputRegisters(vec![17254]))
            }
            Request::ReadInputRegisters(_, cnt) => {
                let mut words = Vec::new();
                for _ in 0..cnt / 2 {
                    words.extend_from_slice(&[0, 17254]);
                }
                Ok(Response::ReadInputRegisters(words))
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}

async fn start_truncating_meter(meter: TruncatingMeter) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let server = Server::new(listener);
        let on_connected = move |stream, socket_addr: SocketAddr| {
            let meter = meter.clone();
            async move {
                accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                    Ok(Some(meter.clone()))
                })
            }
        };
        let on_process_error = |err: std::io::Error| eprintln!("Server error: {}", err);
        let _ = server.serve(&on_connected, on_process_error).await;
    });

    socket_addr
}

#[tokio::test]
async fn test_short_answer_is_a_short_read() {
    let socket_addr = start_truncating_meter(TruncatingMeter { short_at: 424 }).await;

    let mut source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let err = source.read_registers(424, 2).await.unwrap_err();

    assert!(
        matches!(
            err,
            TransportError::ShortRead {
                address: 424,
                expected: 2,
                actual: 1
            }
        ),
        "{:?}",
        err
    );
    assert!(source.is_connected());
    assert_eq!(source.read_registers(352, 2).await.unwrap(), vec![0, 17254]);
}

#[tokio::test]
async fn test_short_read_group_is_left_out_of_the_cycle() {
    let socket_addr = start_truncating_meter(TruncatingMeter { short_at: 424 }).await;

    let source = ModbusRegisterSource::new(socket_addr, 1, RegisterKind::Input, TIMEOUT);
    let sink = MemorySink::new();
    let mut agent = AcquisitionAgent::new(
        Box::new(source),
        Box::new(sink.clone()),
        meter_groups(),
        Duration::from_secs(5),
    );
    let report = agent.run_cycle().await;

    assert_eq!(report.groups_read, vec!["VOLTAGE"]);
    assert_eq!(report.groups_failed.len(), 1);
    assert_eq!(report.groups_failed[0].0, "FREQUENCY");
    assert_eq!(
        report.snapshot.get("VOLTAGE_Channel1"),
        Some(&Reading::Scalar(230.0))
    );
    assert!(!report.snapshot.contains_key("FREQUENCY_Channel1"));
    assert_eq!(sink.submitted(), vec![report.snapshot.clone()]);
}

#[tokio::test]
async fn test_unresolvable_host_is_retried_as_connect_error() {
    let mut source =
        ModbusRegisterSource::new("meter.invalid:502", 1, RegisterKind::Input, TIMEOUT);

    for _ in 0..2 {
        let err = source.read_registers(352, 2).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }), "{:?}", err);
        assert!(!source.is_connected());
    }
}

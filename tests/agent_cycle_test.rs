// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Agent scheduling and resilience, driven by tokio's paused clock

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use rust_powermeter::acquisition::{AcquisitionAgent, MeasurementGroup, MockRegisterSource};
use rust_powermeter::delivery::{MemorySink, SnapshotSink};
use rust_powermeter::error::DeliveryError;
use rust_powermeter::snapshot::Snapshot;

const PERIOD: Duration = Duration::from_secs(5);

fn groups() -> Vec<MeasurementGroup> {
    vec![
        MeasurementGroup::new("VOLTAGE", 352, 2).unwrap(),
        MeasurementGroup::new("FREQUENCY", 424, 2).unwrap(),
    ]
}

fn meter() -> MockRegisterSource {
    MockRegisterSource::new()
        .with_block(352, &[230.0])
        .with_block(424, &[50.0])
}

/// Sink recording when each submission happened, taking `work` to answer.
#[derive(Clone)]
struct TimedSink {
    work: Duration,
    fail: bool,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl TimedSink {
    fn new(work: Duration, fail: bool) -> Self {
        Self {
            work,
            fail,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotSink for TimedSink {
    async fn submit(&self, _snapshot: &Snapshot) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(Instant::now());
        tokio::time::sleep(self.work).await;
        if self.fail {
            return Err(DeliveryError::Status {
                url: "http://collector/data".to_string(),
                status: 503,
                body: String::new(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "timed".to_string()
    }
}

async fn run_for(agent: AcquisitionAgent, duration: Duration) -> AcquisitionAgent {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut agent = agent;
        agent.run(shutdown_rx).await.unwrap();
        agent
    });

    tokio::time::sleep(duration).await;
    shutdown_tx.send(true).unwrap();
    task.await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_three_cycles_in_twelve_seconds() {
    let sink = MemorySink::new();
    let agent = AcquisitionAgent::new(Box::new(meter()), Box::new(sink.clone()), groups(), PERIOD);

    let agent = run_for(agent, Duration::from_secs(12)).await;

    assert_eq!(agent.cycles(), 3);
    let submitted = sink.submitted();
    assert_eq!(submitted.len(), 3);
    for snapshot in submitted {
        assert_eq!(
            snapshot.keys().collect::<Vec<_>>(),
            vec!["FREQUENCY_Channel1", "VOLTAGE_Channel1"]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_group_never_stops_the_loop() {
    let mut source = meter();
    source.fail_at(424);
    let sink = MemorySink::new();
    let agent = AcquisitionAgent::new(Box::new(source), Box::new(sink.clone()), groups(), PERIOD);

    run_for(agent, Duration::from_secs(12)).await;

    let submitted = sink.submitted();
    assert_eq!(submitted.len(), 3);
    for snapshot in submitted {
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["VOLTAGE_Channel1"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failures_are_not_retried_within_a_cycle() {
    let sink = TimedSink::new(Duration::ZERO, true);
    let agent = AcquisitionAgent::new(Box::new(meter()), Box::new(sink.clone()), groups(), PERIOD);

    let agent = run_for(agent, Duration::from_secs(12)).await;

    // One attempt per cycle, the next cycle being the retry
    assert_eq!(agent.cycles(), 3);
    assert_eq!(sink.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_scheduling_is_fixed_delay() {
    let work = Duration::from_secs(2);
    let sink = TimedSink::new(work, false);
    let agent = AcquisitionAgent::new(Box::new(meter()), Box::new(sink.clone()), groups(), PERIOD);

    run_for(agent, Duration::from_secs(15)).await;

    // Cycles start at 0, 7 and 14: the period counts from the end of the work
    let calls = sink.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert_eq!(pair[1] - pair[0], PERIOD + work);
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_the_sleep() {
    let sink = MemorySink::new();
    let agent = AcquisitionAgent::new(
        Box::new(meter()),
        Box::new(sink.clone()),
        groups(),
        Duration::from_secs(3600),
    );

    let started = Instant::now();
    let agent = run_for(agent, Duration::from_secs(1)).await;

    assert_eq!(agent.cycles(), 1);
    assert!(started.elapsed() < Duration::from_secs(3600));
}

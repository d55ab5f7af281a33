//! # Receive Side
//!
//! Taps the transport's console, cuts the byte stream into fixed-size
//! blocks, and classifies each decoded sequence number as it arrives.
//!
//! A dedicated reader thread owns the console pipe and forwards blocks
//! over a bounded channel. The classify loop stays off blocking reads,
//! so the stop monitor's deadline is checked even while the stream is
//! silent.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use quanta::Instant;

use seqprobe_core::classify::{Classifier, ReceptionRecord};
use seqprobe_core::config::RunPlan;
use seqprobe_core::monitor::{StopMonitor, StopReason, DEFAULT_GRACE};
use seqprobe_core::report::RunReport;

use crate::process::TransportProcess;
use crate::transport::TransportCmd;

const UNIT_CHANNEL_CAPACITY: usize = 256;
const RECV_TICK: Duration = Duration::from_millis(100);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Receive-side knobs that sit outside the shared [`RunPlan`].
#[derive(Debug, Clone, Copy)]
pub struct ReceiveOptions {
    /// Extra percentage on top of the planned unit count before the
    /// run is considered complete. Lets a duplicating transport drain.
    pub slack_percent: f64,
    /// How long past the expected stream duration to keep waiting.
    pub grace: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        ReceiveOptions {
            slack_percent: 0.0,
            grace: DEFAULT_GRACE,
        }
    }
}

/// Everything the receive side learned from one run.
#[derive(Debug, Clone)]
pub struct ReceiveSummary {
    pub report: RunReport,
    pub records: Vec<ReceptionRecord>,
}

/// Drive one receive-side run: spawn the transport, classify its
/// console output until the stop monitor rules, then wind it down.
pub fn run(
    cmd: &TransportCmd,
    plan: &RunPlan,
    settle: Duration,
    options: ReceiveOptions,
    running: Arc<AtomicBool>,
) -> anyhow::Result<ReceiveSummary> {
    plan.validate()?;

    let mut process = TransportProcess::spawn(cmd)?;
    process.wait_ready(settle)?;
    let tap = process
        .take_stdout()
        .context("transport console unavailable")?;

    let payload_size = plan.payload.payload_size();
    let (unit_tx, unit_rx) = bounded::<Bytes>(UNIT_CHANNEL_CAPACITY);
    let reader = thread::Builder::new()
        .name("seqprobe-reader".into())
        .spawn(move || read_units(tap, payload_size, unit_tx))
        .expect("failed to spawn unit reader");

    let mut classifier = Classifier::new(plan.origin);
    let mut monitor = StopMonitor::with_slack(
        plan.count,
        options.slack_percent,
        plan.expected_duration(),
        options.grace,
    );

    tracing::info!(
        target = monitor.base_target(),
        effective_target = monitor.effective_target(),
        grace_secs = options.grace.as_secs(),
        "receive side starting"
    );

    let start = Instant::now();
    let mut last_progress = start;

    let stop = loop {
        if !running.load(Ordering::Relaxed) {
            break StopReason::Interrupted;
        }

        let verdict = match unit_rx.recv_timeout(RECV_TICK) {
            Ok(block) => {
                match plan.payload.decode(&block) {
                    Ok(sequence) => {
                        let record = classifier.observe(sequence);
                        tracing::debug!(
                            sequence,
                            class = %record.classification,
                            gap = record.discontinuity_size,
                            "unit"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed block");
                        classifier.note_malformed(err);
                    }
                }
                monitor.observe_arrival(classifier.counts().total_received, Instant::now())
            }
            Err(RecvTimeoutError::Timeout) => {
                monitor.poll(classifier.counts().total_received, Instant::now())
            }
            Err(RecvTimeoutError::Disconnected) => break StopReason::StreamClosed,
        };
        if let Some(reason) = verdict {
            break reason;
        }

        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            let counts = classifier.counts();
            tracing::info!(
                received = counts.total_received,
                in_order = counts.in_order,
                reordered = counts.reordered,
                duplicate = counts.duplicate,
                "receive progress"
            );
            last_progress = Instant::now();
        }
    };

    tracing::info!(
        stop = %stop,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "receive side finished"
    );

    // Unblock the reader whichever call it is parked in: dropping the
    // channel fails its send, stopping the transport ends its read.
    drop(unit_rx);
    process.stop()?;
    let _ = reader.join();

    let report = RunReport::new(plan.count, &classifier, stop);
    Ok(ReceiveSummary {
        report,
        records: classifier.records().to_vec(),
    })
}

/// Cut the console byte stream into `payload_size` blocks.
///
/// Short reads are refilled until a block completes. A tail shorter
/// than one block is still forwarded so the classifier can count it as
/// malformed instead of silently dropping it.
fn read_units(mut tap: impl Read, payload_size: usize, units: Sender<Bytes>) {
    let mut block = vec![0u8; payload_size];
    loop {
        let mut filled = 0;
        while filled < payload_size {
            match tap.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "transport console read failed");
                    return;
                }
            }
        }
        if filled == 0 {
            return;
        }
        if units.send(Bytes::copy_from_slice(&block[..filled])).is_err() {
            return;
        }
        if filled < payload_size {
            return;
        }
    }
}

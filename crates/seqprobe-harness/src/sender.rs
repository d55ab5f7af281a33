//! # Send Side
//!
//! Paces the generated unit stream into the transport's console. Units
//! leave on an absolute schedule anchored at the start of the run, so a
//! slow write delays its successors but never shifts the schedule
//! itself.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quanta::Instant;

use seqprobe_core::config::RunPlan;
use seqprobe_core::generator::UnitGenerator;

use crate::process::TransportProcess;
use crate::transport::TransportCmd;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of the send side of a run.
#[derive(Debug, Clone, Copy)]
pub struct SendSummary {
    pub sent: u64,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Drive one send-side run: spawn the transport, pace the unit stream
/// into it, hold it open for the drain window, and wind it down with a
/// console EOF.
pub fn run(
    cmd: &TransportCmd,
    plan: &RunPlan,
    settle: Duration,
    drain: Duration,
    running: Arc<AtomicBool>,
) -> anyhow::Result<SendSummary> {
    let generator = UnitGenerator::new(plan)?;

    let mut process = TransportProcess::spawn(cmd)?;
    process.wait_ready(settle)?;
    let mut console = process
        .take_stdin()
        .context("transport console unavailable")?;

    tracing::info!(
        units = plan.count,
        interval_us = plan.interval.as_micros() as u64,
        payload_size = plan.payload.payload_size(),
        "send side starting"
    );

    let start = Instant::now();
    let mut last_progress = start;
    let mut sent: u64 = 0;
    let mut interrupted = false;

    for unit in generator {
        if !running.load(Ordering::Relaxed) {
            interrupted = true;
            break;
        }

        let due = start + schedule_offset(plan.interval, sent);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }

        console
            .write_all(&unit)
            .context("transport console write failed")?;
        sent += 1;

        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            tracing::info!(sent, remaining = plan.count - sent, "send progress");
            last_progress = Instant::now();
        }
    }

    // Keep the console open through the drain window so the transport's
    // socket outlives the last unit. Sliced sleeps keep Ctrl-C prompt.
    if !interrupted && drain > Duration::ZERO {
        tracing::info!(drain_ms = drain.as_millis() as u64, "draining transport");
        let drain_deadline = Instant::now() + drain;
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= drain_deadline {
                break;
            }
            std::thread::sleep((drain_deadline - now).min(Duration::from_millis(100)));
        }
    }

    // EOF tells the transport to flush in-flight units and wind down.
    drop(console);
    process.stop()?;

    let elapsed = start.elapsed();
    tracing::info!(
        sent,
        elapsed_ms = elapsed.as_millis() as u64,
        interrupted,
        "send side finished"
    );
    Ok(SendSummary {
        sent,
        elapsed,
        interrupted,
    })
}

/// `interval * n` in nanoseconds, saturating instead of truncating to u32.
fn schedule_offset(interval: Duration, n: u64) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(u128::from(n));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

//! # Stop Conditions
//!
//! Decides when a receive loop ends and why. The monitor itself does no
//! timekeeping; the run loop hands it arrival counts and the current
//! instant, and it answers with a [`StopReason`] once one applies.
//!
//! ## Timing model
//!
//! The wait for the first arrival is unbounded, since the far end may take
//! arbitrarily long to connect. The completion deadline arms when the first
//! unit lands: `first_arrival + expected_run_length + grace`. From then on
//! the run stops at the target count or at the deadline, whichever comes
//! first.
//!
//! An optional slack percentage raises the stop bar above the agreed count
//! so that trailing duplicates and stragglers still enter the tallies. With
//! slack active, reaching the agreed count but not the raised bar by the
//! deadline still ends the run as [`StopReason::TargetReached`].

use quanta::Instant;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Extra wall-clock allowance past the expected run length before a run
/// times out.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

// ─── Stop Reason ─────────────────────────────────────────────────────────────

/// Why a receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agreed unit count arrived.
    TargetReached,
    /// The deadline passed with arrivals still missing.
    Timeout,
    /// The transport closed the stream before the run ended.
    StreamClosed,
    /// The operator interrupted the run.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::TargetReached => "target reached",
            StopReason::Timeout => "timeout",
            StopReason::StreamClosed => "stream closed",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

// ─── Stop Monitor ────────────────────────────────────────────────────────────

/// Target-count and deadline tracking for one run.
#[derive(Debug, Clone)]
pub struct StopMonitor {
    base_target: u64,
    effective_target: u64,
    expected: Duration,
    grace: Duration,
    deadline: Option<Instant>,
}

impl StopMonitor {
    /// Monitor that stops exactly at the agreed count.
    pub fn new(target: u64, expected: Duration, grace: Duration) -> Self {
        Self::with_slack(target, 0.0, expected, grace)
    }

    /// Monitor that keeps listening for `slack_percent` extra arrivals
    /// beyond the agreed count. Negative slack is treated as zero.
    pub fn with_slack(
        target: u64,
        slack_percent: f64,
        expected: Duration,
        grace: Duration,
    ) -> Self {
        let slack = slack_percent.max(0.0);
        let raised = (target as f64 * (1.0 + slack / 100.0)).ceil() as u64;
        StopMonitor {
            base_target: target,
            effective_target: raised.max(target),
            expected,
            grace,
            deadline: None,
        }
    }

    /// The agreed unit count.
    #[inline]
    pub fn base_target(&self) -> u64 {
        self.base_target
    }

    /// The raised stop bar with slack applied.
    #[inline]
    pub fn effective_target(&self) -> u64 {
        self.effective_target
    }

    /// Completion deadline, once armed by the first arrival.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fold in one arrival. `total_received` is the tally including this
    /// arrival; `now` is when it landed.
    pub fn observe_arrival(&mut self, total_received: u64, now: Instant) -> Option<StopReason> {
        let deadline = *self
            .deadline
            .get_or_insert(now + self.expected + self.grace);
        if total_received >= self.effective_target {
            return Some(StopReason::TargetReached);
        }
        if now >= deadline {
            return Some(self.deadline_verdict(total_received));
        }
        None
    }

    /// Check the deadline between arrivals. Before the first arrival there
    /// is no deadline and the wait is unbounded.
    pub fn poll(&self, total_received: u64, now: Instant) -> Option<StopReason> {
        let deadline = self.deadline?;
        if now >= deadline {
            return Some(self.deadline_verdict(total_received));
        }
        None
    }

    /// At the deadline, the agreed count decides: met means the slack
    /// window closed clean, unmet means units never made it.
    fn deadline_verdict(&self, total_received: u64) -> StopReason {
        if total_received >= self.base_target {
            StopReason::TargetReached
        } else {
            StopReason::Timeout
        }
    }
}

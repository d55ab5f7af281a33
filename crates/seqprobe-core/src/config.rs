//! # Run Configuration
//!
//! The run plan both endpoints must agree on: unit shape, sequence origin,
//! target count, and send interval. Pacing derives from either an explicit
//! interval or a target bitrate; the target count derives from either an
//! explicit count or a wall-clock duration.
//!
//! Nothing on the wire carries the plan, so a mismatch between the two
//! invocations skews the metrics silently instead of failing.
//!
//! Validation happens before a single unit is produced, so a plan that
//! would wrap the sequence space or stall the pacer is rejected up front.

use std::time::Duration;
use thiserror::Error;

use crate::payload::PayloadSpec;

// ─── Constants ───────────────────────────────────────────────────────────────

/// First sequence number of a run.
pub const DEFAULT_ORIGIN: u64 = 1;

/// Inter-unit send interval when no bitrate is given.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Run length when neither a count nor a duration is given.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A run plan that cannot produce a coherent measurement.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("sequence prefix width {width} is outside the supported 1..=8 bytes")]
    PrefixWidth { width: usize },

    #[error("payload of {payload} bytes cannot hold a {prefix}-byte sequence prefix")]
    PayloadTooSmall { payload: usize, prefix: usize },

    #[error("run must send at least one unit")]
    ZeroCount,

    #[error("send interval must be positive")]
    ZeroInterval,

    #[error("bitrate must be positive, got {mbps} Mbit/s")]
    Bitrate { mbps: f64 },

    #[error("duration must be positive")]
    ZeroDuration,

    #[error("{count} units from origin {origin} exceed the prefix maximum {max}")]
    SequenceSpace { origin: u64, count: u64, max: u64 },
}

// ─── Derivations ─────────────────────────────────────────────────────────────

/// Interval that paces `payload_size`-byte units at `mbps` Mbit/s, rounded
/// to whole microseconds. Sub-microsecond results clamp to 1 µs.
pub fn interval_for_bitrate(mbps: f64, payload_size: usize) -> Result<Duration, ConfigError> {
    if !(mbps.is_finite() && mbps > 0.0) {
        return Err(ConfigError::Bitrate { mbps });
    }
    // bits / (Mbit/s · 10^6) seconds == bits / Mbit µs
    let micros = (payload_size as f64 * 8.0 / mbps).round() as u64;
    Ok(Duration::from_micros(micros.max(1)))
}

/// Unit count that fills `duration` at one unit per `interval`. The first
/// unit goes out at t=0, so a duration of exactly one interval yields two.
pub fn count_for_duration(duration: Duration, interval: Duration) -> Result<u64, ConfigError> {
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration);
    }
    if interval.is_zero() {
        return Err(ConfigError::ZeroInterval);
    }
    let count = duration.as_micros() / interval.as_micros() + 1;
    Ok(u64::try_from(count).unwrap_or(u64::MAX))
}

// ─── Run Plan ────────────────────────────────────────────────────────────────

/// Everything the sender and receiver agree on for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPlan {
    /// Unit shape shared by both ends.
    pub payload: PayloadSpec,
    /// First sequence number sent.
    pub origin: u64,
    /// Total units the sender emits.
    pub count: u64,
    /// Pacing interval between unit starts.
    pub interval: Duration,
}

impl Default for RunPlan {
    fn default() -> Self {
        RunPlan {
            payload: PayloadSpec::default(),
            origin: DEFAULT_ORIGIN,
            // 60 s at one unit per 10 ms, endpoints inclusive.
            count: 6001,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl RunPlan {
    /// Build a validated plan.
    pub fn new(
        payload: PayloadSpec,
        origin: u64,
        count: u64,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        let plan = RunPlan {
            payload,
            origin,
            count,
            interval,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan can run: at least one unit, a ticking pacer, and a
    /// sequence range that fits the prefix without wrapping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        let max = self.payload.max_sequence();
        match self.origin.checked_add(self.count - 1) {
            Some(last) if last <= max => Ok(()),
            _ => Err(ConfigError::SequenceSpace {
                origin: self.origin,
                count: self.count,
                max,
            }),
        }
    }

    /// Highest sequence number the plan sends.
    #[inline]
    pub fn last_sequence(&self) -> u64 {
        self.origin + self.count - 1
    }

    /// Wall-clock length of a loss-free run, saturating at ~584 years.
    pub fn expected_duration(&self) -> Duration {
        let nanos = self.interval.as_nanos().saturating_mul(u128::from(self.count));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

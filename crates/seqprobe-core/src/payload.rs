//! # Sequence Payload Format
//!
//! Fixed-size measurement units carrying a big-endian sequence number prefix.
//!
//! ## Unit layout (`payload_size` bytes, defaults shown)
//!
//! ```text
//! |<----------------------- 1316 bytes ----------------------------->|
//! |<- seq prefix ->|<-------------- filler ---------------->|sentinel|
//! +----+----+----+----+----+----+----+----+-----------+-----+--------+
//! | b3 | b2 | b1 | b0 |  5 |  6 |  7 | .. | 1,2,..255 | ... |    0   |
//! +----+----+----+----+----+----+----+----+-----------+-----+--------+
//! ```
//!
//! The prefix is a big-endian unsigned integer of 1-8 bytes. Filler bytes
//! cycle through `1..=255` so the value `0` appears exactly once, as the
//! final sentinel byte. The filler at absolute offset `i` is `1 + (i % 255)`,
//! making every unit of a run byte-identical outside the prefix region.
//!
//! A received block shorter than the prefix width cannot yield a sequence
//! number and is rejected as [`MalformedUnit`].

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::config::ConfigError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default unit size in bytes (seven 188-byte MPEG-TS cells, the common
/// payload of live-streaming transports).
pub const DEFAULT_PAYLOAD_SIZE: usize = 1316;

/// Default sequence prefix width in bytes.
pub const DEFAULT_PREFIX_WIDTH: usize = 4;

/// Narrowest supported prefix.
pub const MIN_PREFIX_WIDTH: usize = 1;

/// Widest supported prefix (full u64).
pub const MAX_PREFIX_WIDTH: usize = 8;

/// Terminating byte of every unit. Never produced by the filler cycle.
pub const SENTINEL: u8 = 0;

// ─── Malformed Unit ──────────────────────────────────────────────────────────

/// A received block too short to contain the sequence prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("received block of {len} bytes is shorter than the {need}-byte sequence prefix")]
pub struct MalformedUnit {
    /// Bytes actually received.
    pub len: usize,
    /// Prefix width the codec needed.
    pub need: usize,
}

// ─── Payload Spec ────────────────────────────────────────────────────────────

/// Shape of a measurement unit: total size and sequence prefix width.
///
/// Both ends of a run must agree on these or sequence numbers decode as
/// garbage. Construction validates the prefix fits the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSpec {
    payload_size: usize,
    prefix_width: usize,
}

impl Default for PayloadSpec {
    fn default() -> Self {
        PayloadSpec {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            prefix_width: DEFAULT_PREFIX_WIDTH,
        }
    }
}

impl PayloadSpec {
    /// Create a spec, rejecting prefix widths outside `1..=8` and payloads
    /// smaller than their own prefix.
    pub fn new(payload_size: usize, prefix_width: usize) -> Result<Self, ConfigError> {
        if !(MIN_PREFIX_WIDTH..=MAX_PREFIX_WIDTH).contains(&prefix_width) {
            return Err(ConfigError::PrefixWidth { width: prefix_width });
        }
        if payload_size < prefix_width {
            return Err(ConfigError::PayloadTooSmall {
                payload: payload_size,
                prefix: prefix_width,
            });
        }
        Ok(PayloadSpec {
            payload_size,
            prefix_width,
        })
    }

    /// Total unit size in bytes.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Sequence prefix width in bytes.
    #[inline]
    pub fn prefix_width(&self) -> usize {
        self.prefix_width
    }

    /// Largest sequence number the prefix can carry: `2^(8·width) - 1`.
    #[inline]
    pub fn max_sequence(&self) -> u64 {
        if self.prefix_width == MAX_PREFIX_WIDTH {
            u64::MAX
        } else {
            (1u64 << (8 * self.prefix_width)) - 1
        }
    }

    /// Build the unit template: filler cycle everywhere, sentinel last.
    ///
    /// The prefix region is included in the cycle; [`stamp`](Self::stamp)
    /// overwrites it per unit.
    pub fn template(&self) -> Vec<u8> {
        // payload_size >= prefix_width >= 1, enforced in new().
        let mut block = vec![0u8; self.payload_size];
        let body = self.payload_size - 1;
        for (i, byte) in block[..body].iter_mut().enumerate() {
            *byte = 1 + (i % 255) as u8;
        }
        block[body] = SENTINEL;
        block
    }

    /// Overwrite the prefix region of `block` with `sequence`, big-endian.
    ///
    /// Panics if the block is shorter than the prefix or the sequence does
    /// not fit the prefix width; run plans are validated before any unit is
    /// stamped, so neither occurs in a planned run.
    pub fn stamp(&self, sequence: u64, block: &mut [u8]) {
        assert!(
            sequence <= self.max_sequence(),
            "sequence {sequence} exceeds the {}-byte prefix",
            self.prefix_width
        );
        let w = self.prefix_width;
        for (i, byte) in block[..w].iter_mut().enumerate() {
            *byte = (sequence >> (8 * (w - 1 - i))) as u8;
        }
    }

    /// Encode a complete unit for `sequence`.
    pub fn encode(&self, sequence: u64) -> Bytes {
        let mut block = BytesMut::with_capacity(self.payload_size);
        block.put_slice(&self.template());
        self.stamp(sequence, &mut block);
        block.freeze()
    }

    /// Decode the sequence number from a received block.
    ///
    /// Any block at least as long as the prefix decodes, including a
    /// truncated final block cut short by stream close.
    pub fn decode(&self, block: &[u8]) -> Result<u64, MalformedUnit> {
        if block.len() < self.prefix_width {
            return Err(MalformedUnit {
                len: block.len(),
                need: self.prefix_width,
            });
        }
        let mut sequence = 0u64;
        for &byte in &block[..self.prefix_width] {
            sequence = (sequence << 8) | u64::from(byte);
        }
        Ok(sequence)
    }
}

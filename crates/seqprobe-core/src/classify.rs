//! # Arrival Classification
//!
//! Pure logic, no I/O. Classifies each decoded sequence number at arrival
//! time into in-order, reordered, or duplicate, following the
//! Type-P-Reordered definition of RFC 4737.
//!
//! ## State
//!
//! Two structures carry the whole decision:
//!
//! 1. **Seen set**: every sequence number observed so far. Membership at
//!    arrival means duplicate.
//! 2. **Watermark**: the highest sequence number seen. A new sequence at or
//!    below it arrived late (reordered); above it, the stream moved forward
//!    (in-order), and any skipped range is a sequence discontinuity
//!    (RFC 4737 §3.4).
//!
//! A duplicate never moves the watermark. The first arrival of a run is
//! in-order by definition, there being no baseline to be late against.

use std::collections::HashSet;
use std::fmt;

use crate::payload::MalformedUnit;

// ─── Classification ──────────────────────────────────────────────────────────

/// Verdict for one arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First occurrence, at or above every sequence seen before it.
    InOrder,
    /// First occurrence, but a later sequence already arrived.
    Reordered,
    /// Sequence was already seen.
    Duplicate,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::InOrder => "in-order",
            Classification::Reordered => "reordered",
            Classification::Duplicate => "duplicate",
        };
        f.write_str(label)
    }
}

// ─── Reception Record ────────────────────────────────────────────────────────

/// One row of the arrival log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceptionRecord {
    /// Decoded sequence number.
    pub sequence: u64,
    /// 1-based arrival position, duplicates included.
    pub arrival_index: u64,
    /// Verdict at arrival time.
    pub classification: Classification,
    /// What the classifier expected next when this arrival landed.
    pub next_expected: u64,
    /// Sequences skipped over by this arrival; 0 when none.
    pub discontinuity_size: u64,
}

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Running arrival tallies. `total_received` always equals the sum of the
/// three classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrivalCounts {
    pub in_order: u64,
    pub reordered: u64,
    pub duplicate: u64,
    pub total_received: u64,
}

impl ArrivalCounts {
    /// The partition invariant the classifier maintains.
    pub fn is_consistent(&self) -> bool {
        self.total_received == self.in_order + self.reordered + self.duplicate
    }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// Arrival-order classifier for one run.
pub struct Classifier {
    origin: u64,
    highest_seen: Option<u64>,
    seen: HashSet<u64>,
    counts: ArrivalCounts,
    malformed: u64,
    discontinuities: u64,
    discontinuity_units: u64,
    records: Vec<ReceptionRecord>,
}

impl Classifier {
    /// Create a classifier expecting the run to start at `origin`.
    pub fn new(origin: u64) -> Self {
        Classifier {
            origin,
            highest_seen: None,
            seen: HashSet::new(),
            counts: ArrivalCounts::default(),
            malformed: 0,
            discontinuities: 0,
            discontinuity_units: 0,
            records: Vec::new(),
        }
    }

    /// Classify one arrival and fold it into the run state.
    pub fn observe(&mut self, sequence: u64) -> ReceptionRecord {
        let next_expected = self.next_expected();
        let mut discontinuity_size = 0;

        // `insert` returning false means the sequence was already seen.
        let classification = if !self.seen.insert(sequence) {
            Classification::Duplicate
        } else {
            match self.highest_seen {
                Some(watermark) if sequence <= watermark => Classification::Reordered,
                _ => {
                    // Forward progress. Anything skipped is a discontinuity.
                    if sequence > next_expected {
                        discontinuity_size = sequence - next_expected;
                        self.discontinuities += 1;
                        self.discontinuity_units += discontinuity_size;
                    }
                    self.highest_seen = Some(sequence);
                    Classification::InOrder
                }
            }
        };

        self.counts.total_received += 1;
        match classification {
            Classification::InOrder => self.counts.in_order += 1,
            Classification::Reordered => self.counts.reordered += 1,
            Classification::Duplicate => self.counts.duplicate += 1,
        }
        debug_assert!(self.counts.is_consistent());

        let record = ReceptionRecord {
            sequence,
            arrival_index: self.counts.total_received,
            classification,
            next_expected,
            discontinuity_size,
        };
        self.records.push(record);
        record
    }

    /// Count a block that carried no decodable sequence. Malformed blocks
    /// never enter the arrival tallies.
    pub fn note_malformed(&mut self, _unit: MalformedUnit) {
        self.malformed += 1;
    }

    /// Sequence the run would continue with if no unit were missing:
    /// watermark + 1, or the origin before any arrival.
    #[inline]
    pub fn next_expected(&self) -> u64 {
        match self.highest_seen {
            Some(watermark) => watermark.saturating_add(1),
            None => self.origin,
        }
    }

    /// Highest sequence observed, if any arrived.
    #[inline]
    pub fn highest_seen(&self) -> Option<u64> {
        self.highest_seen
    }

    /// Arrival tallies so far.
    #[inline]
    pub fn counts(&self) -> ArrivalCounts {
        self.counts
    }

    /// Distinct sequence numbers observed.
    #[inline]
    pub fn distinct(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Blocks rejected as undecodable.
    #[inline]
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Number of discontinuity events.
    #[inline]
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }

    /// Total sequences spanned by all discontinuities.
    #[inline]
    pub fn discontinuity_units(&self) -> u64 {
        self.discontinuity_units
    }

    /// Full arrival log, in arrival order.
    #[inline]
    pub fn records(&self) -> &[ReceptionRecord] {
        &self.records
    }
}

//! # seqprobe-core
//!
//! Measurement engine for sequence-stamped probe streams.
//!
//! Pure logic, no I/O or process handling. A sender-side generator
//! produces fixed-size units with big-endian sequence prefixes; the
//! receive side decodes arrivals, classifies each one against RFC 4737
//! Type-P-Reordered semantics, decides when the run is over, and folds
//! everything into a run report.
//!
//! ## Crate structure
//!
//! - [`payload`] — Unit layout: sequence prefix, filler cycle, sentinel
//! - [`config`] — Run plan, pacing and count derivation, validation
//! - [`generator`] — Deterministic unit production for the send side
//! - [`classify`] — Per-arrival in-order/reordered/duplicate classification
//! - [`monitor`] — Stop conditions: target count, slack, deadline
//! - [`report`] — Run summary, arrival table, JSON export

pub mod classify;
pub mod config;
pub mod generator;
pub mod monitor;
pub mod payload;
pub mod report;

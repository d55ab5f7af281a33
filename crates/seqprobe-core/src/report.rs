//! # Run Report
//!
//! Final summary of a run: arrival tallies, the reordered ratio, loss
//! against the agreed count, and why the run stopped. Renders as plain
//! text for the console and serializes to JSON for tooling.
//!
//! The ratio denominator is everything that arrived, duplicates included;
//! `distinct` carries the deduplicated view alongside it. Loss is agreed
//! count minus distinct sequences, floored at zero, so a duplicate can
//! never mask a missing unit.

use serde::Serialize;
use std::fmt::{self, Write as _};

use crate::classify::{Classifier, ReceptionRecord};
use crate::monitor::StopReason;

// ─── Run Report ──────────────────────────────────────────────────────────────

/// Everything the probe reports at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Units the sender agreed to emit.
    pub target: u64,
    /// Arrivals classified, duplicates included.
    pub total_received: u64,
    pub in_order: u64,
    pub reordered: u64,
    pub duplicate: u64,
    /// Distinct sequence numbers observed.
    pub distinct: u64,
    /// Agreed units that never arrived: `target - distinct`, floored at 0.
    pub lost: u64,
    /// Blocks rejected as undecodable.
    pub malformed: u64,
    /// Discontinuity events and the sequences they spanned.
    pub discontinuities: u64,
    pub discontinuity_units: u64,
    /// Reordered arrivals as a percentage of all arrivals, rounded to two
    /// decimals. `None` when nothing arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reordered_ratio: Option<f64>,
    /// Why the run ended.
    pub stop: StopReason,
}

impl RunReport {
    /// Summarize a finished run.
    pub fn new(target: u64, classifier: &Classifier, stop: StopReason) -> Self {
        let counts = classifier.counts();
        let distinct = classifier.distinct();
        let reordered_ratio = if counts.total_received == 0 {
            None
        } else {
            let percent = counts.reordered as f64 / counts.total_received as f64 * 100.0;
            Some((percent * 100.0).round() / 100.0)
        };
        RunReport {
            target,
            total_received: counts.total_received,
            in_order: counts.in_order,
            reordered: counts.reordered,
            duplicate: counts.duplicate,
            distinct,
            lost: target.saturating_sub(distinct),
            malformed: classifier.malformed(),
            discontinuities: classifier.discontinuities(),
            discontinuity_units: classifier.discontinuity_units(),
            reordered_ratio,
            stop,
        }
    }

    /// True unless the run ended with the agreed count accounted for.
    pub fn is_premature(&self) -> bool {
        self.stop != StopReason::TargetReached
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stop reason: {}", self.stop)?;
        writeln!(
            f,
            "units received: {} ({} in-order, {} reordered, {} duplicate)",
            self.total_received, self.in_order, self.reordered, self.duplicate
        )?;
        writeln!(
            f,
            "distinct sequences: {} of {} agreed",
            self.distinct, self.target
        )?;
        match self.reordered_ratio {
            Some(ratio) => writeln!(f, "reordered ratio: {ratio:.2} %")?,
            None => writeln!(f, "reordered ratio: no data")?,
        }
        writeln!(
            f,
            "sequence discontinuities: {}, total size: {} unit(s)",
            self.discontinuities, self.discontinuity_units
        )?;
        writeln!(f, "units lost: {}", self.lost)?;
        if self.malformed > 0 {
            writeln!(f, "malformed blocks: {}", self.malformed)?;
        }
        Ok(())
    }
}

// ─── Arrival Table ───────────────────────────────────────────────────────────

/// Render the per-arrival log as an aligned text table.
pub fn arrival_table(records: &[ReceptionRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 48 + 64);
    let _ = writeln!(
        out,
        "{:>8}  {:>12}  {:<9}  {:>12}  {:>6}",
        "arrival", "sequence", "class", "expected", "gap"
    );
    for record in records {
        let gap = if record.discontinuity_size > 0 {
            record.discontinuity_size.to_string()
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:>8}  {:>12}  {:<9}  {:>12}  {:>6}",
            record.arrival_index,
            record.sequence,
            record.classification.to_string(),
            record.next_expected,
            gap
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;

    fn report_for(arrivals: &[u64], target: u64, stop: StopReason) -> RunReport {
        let mut classifier = Classifier::new(1);
        for &sequence in arrivals {
            classifier.observe(sequence);
        }
        RunReport::new(target, &classifier, stop)
    }

    // ─── Ratio ──────────────────────────────────────────────────────────

    #[test]
    fn ratio_counts_duplicates_in_the_denominator() {
        // 12 arrivals for 10 distinct sequences, one of them late.
        let report = report_for(
            &[1, 2, 3, 5, 6, 7, 8, 4, 9, 10, 10, 6],
            10,
            StopReason::TargetReached,
        );
        assert_eq!(report.total_received, 12);
        assert_eq!(report.distinct, 10);
        assert_eq!(report.reordered_ratio, Some(8.33));
    }

    #[test]
    fn ratio_rounds_to_two_decimals() {
        let report = report_for(&[1, 3, 2], 3, StopReason::TargetReached);
        assert_eq!(report.reordered_ratio, Some(33.33));

        let report = report_for(&[1, 3, 2, 4], 4, StopReason::TargetReached);
        assert_eq!(report.reordered_ratio, Some(25.0));

        let report = report_for(&[1, 4, 2, 3], 4, StopReason::TargetReached);
        // 2 of 4 arrivals landed late.
        assert_eq!(report.reordered_ratio, Some(50.0));
    }

    #[test]
    fn duplicates_stay_out_of_the_numerator() {
        let report = report_for(&[1, 2, 2, 3], 3, StopReason::TargetReached);
        assert_eq!(report.total_received, 4);
        assert_eq!(report.duplicate, 1);
        assert_eq!(report.reordered_ratio, Some(0.0));
    }

    #[test]
    fn empty_run_has_no_ratio() {
        let report = report_for(&[], 10, StopReason::Timeout);
        assert_eq!(report.reordered_ratio, None);
        assert_eq!(report.total_received, 0);
        assert!(report.to_string().contains("reordered ratio: no data"));
    }

    // ─── Loss ───────────────────────────────────────────────────────────

    #[test]
    fn loss_is_agreed_minus_distinct() {
        let report = report_for(&[1, 2, 5], 5, StopReason::Timeout);
        assert_eq!(report.lost, 2);

        // Seven of ten agreed units made it; the ratio runs over the seven.
        let report = report_for(&[1, 2, 3, 4, 5, 6, 7], 10, StopReason::Timeout);
        assert_eq!(report.lost, 3);
        assert_eq!(report.total_received, 7);
        assert_eq!(report.reordered_ratio, Some(0.0));
    }

    #[test]
    fn duplicates_never_mask_loss() {
        // Five arrivals, but only three distinct of five agreed.
        let report = report_for(&[1, 1, 2, 2, 5], 5, StopReason::Timeout);
        assert_eq!(report.total_received, 5);
        assert_eq!(report.distinct, 3);
        assert_eq!(report.lost, 2);
    }

    #[test]
    fn loss_floors_at_zero() {
        // The far end sent past the agreed count.
        let report = report_for(&[1, 2, 3, 4], 3, StopReason::TargetReached);
        assert_eq!(report.lost, 0);
    }

    // ─── Display ────────────────────────────────────────────────────────

    #[test]
    fn display_carries_the_summary_lines() {
        let report = report_for(
            &[1, 2, 3, 5, 6, 7, 8, 4, 9, 10],
            10,
            StopReason::TargetReached,
        );
        let text = report.to_string();
        assert!(text.contains("stop reason: target reached"));
        assert!(text.contains("units received: 10 (9 in-order, 1 reordered, 0 duplicate)"));
        assert!(text.contains("distinct sequences: 10 of 10 agreed"));
        assert!(text.contains("reordered ratio: 10.00 %"));
        assert!(text.contains("sequence discontinuities: 1, total size: 1 unit(s)"));
        assert!(text.contains("units lost: 0"));
        assert!(!text.contains("malformed"));
    }

    #[test]
    fn display_flags_malformed_blocks() {
        use crate::payload::MalformedUnit;

        let mut classifier = Classifier::new(1);
        classifier.observe(1);
        classifier.note_malformed(MalformedUnit { len: 1, need: 4 });
        let report = RunReport::new(2, &classifier, StopReason::StreamClosed);
        assert!(report.to_string().contains("malformed blocks: 1"));
        assert!(report.is_premature());
    }

    // ─── JSON ───────────────────────────────────────────────────────────

    #[test]
    fn serializes_for_tooling() {
        let report = report_for(&[1, 3, 2], 3, StopReason::TargetReached);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stop"], "target_reached");
        assert_eq!(value["total_received"], 3);
        assert_eq!(value["reordered_ratio"], 33.33);
    }

    #[test]
    fn empty_ratio_is_omitted_from_json() {
        let report = report_for(&[], 3, StopReason::Timeout);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stop"], "timeout");
        assert!(value.get("reordered_ratio").is_none());
    }

    // ─── Arrival Table ──────────────────────────────────────────────────

    #[test]
    fn table_renders_one_row_per_arrival() {
        let mut classifier = Classifier::new(1);
        for sequence in [1, 3, 2, 2] {
            classifier.observe(sequence);
        }
        let table = arrival_table(classifier.records());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("arrival"));
        assert!(lines[1].contains("in-order"));
        assert!(lines[2].contains('1'), "gap column shows the skip");
        assert!(lines[3].contains("reordered"));
        assert!(lines[4].contains("duplicate"));
    }
}

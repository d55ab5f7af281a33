//! Property-based tests for the sequence payload codec.
//!
//! These tests verify prefix roundtrips across every supported width,
//! template invariants for arbitrary unit sizes, and decoding behavior on
//! truncated and corrupted blocks.

use proptest::prelude::*;
use seqprobe_core::payload::{PayloadSpec, SENTINEL};

// ─── Strategies ──────────────────────────────────────────────────────────────

/// Strategy over valid payload shapes: width 1..=8, size at least the width.
fn spec_strategy() -> impl Strategy<Value = PayloadSpec> {
    (1usize..=8).prop_flat_map(|width| {
        (width..=2048usize).prop_map(move |size| PayloadSpec::new(size, width).unwrap())
    })
}

/// Strategy pairing a shape with a sequence its prefix can carry.
fn spec_and_sequence() -> impl Strategy<Value = (PayloadSpec, u64)> {
    spec_strategy().prop_flat_map(|spec| (Just(spec), 0..=spec.max_sequence()))
}

/// Strategy that targets the edges of each prefix's sequence space.
fn spec_and_boundary_sequence() -> impl Strategy<Value = (PayloadSpec, u64)> {
    spec_strategy().prop_flat_map(|spec| {
        let max = spec.max_sequence();
        (
            Just(spec),
            prop_oneof![Just(0u64), Just(1), Just(max - 1), Just(max)],
        )
    })
}

// ─── Prefix Roundtrip ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sequence_roundtrips_through_a_unit((spec, sequence) in spec_and_sequence()) {
        let unit = spec.encode(sequence);
        prop_assert_eq!(unit.len(), spec.payload_size());
        prop_assert_eq!(spec.decode(&unit), Ok(sequence));
    }

    #[test]
    fn boundary_sequences_roundtrip((spec, sequence) in spec_and_boundary_sequence()) {
        let unit = spec.encode(sequence);
        prop_assert_eq!(spec.decode(&unit), Ok(sequence));
    }

    #[test]
    fn prefix_is_big_endian((spec, sequence) in spec_and_sequence()) {
        let unit = spec.encode(sequence);
        let mut rebuilt = 0u64;
        for &byte in &unit[..spec.prefix_width()] {
            rebuilt = (rebuilt << 8) | u64::from(byte);
        }
        prop_assert_eq!(rebuilt, sequence);
    }
}

// ─── Template Invariants ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sentinel_terminates_and_never_leaks_into_filler(spec in spec_strategy()) {
        let template = spec.template();
        let size = spec.payload_size();
        prop_assert_eq!(template.len(), size);
        prop_assert_eq!(template[size - 1], SENTINEL);
        prop_assert!(template[..size - 1].iter().all(|&b| b != SENTINEL));
    }

    #[test]
    fn units_of_one_run_share_every_non_prefix_byte(
        (spec, a) in spec_and_sequence(),
        b in any::<u64>(),
    ) {
        let b = b & spec.max_sequence();
        let unit_a = spec.encode(a);
        let unit_b = spec.encode(b);
        prop_assert_eq!(
            &unit_a[spec.prefix_width()..],
            &unit_b[spec.prefix_width()..]
        );
    }
}

// ─── Truncation & Corruption ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn any_cut_at_or_past_the_prefix_decodes(
        (spec, sequence) in spec_and_sequence(),
    ) {
        let unit = spec.encode(sequence);
        // Probing every legal cut is quadratic; check the ends and the middle.
        let cuts = [
            spec.prefix_width(),
            (spec.prefix_width() + spec.payload_size()) / 2,
            spec.payload_size(),
        ];
        for cut in cuts {
            prop_assert_eq!(spec.decode(&unit[..cut]), Ok(sequence));
        }
    }

    #[test]
    fn any_cut_inside_the_prefix_is_malformed(
        (spec, sequence) in spec_and_sequence(),
        cut_seed in any::<usize>(),
    ) {
        let unit = spec.encode(sequence);
        let cut = cut_seed % spec.prefix_width();
        let err = spec.decode(&unit[..cut]).unwrap_err();
        prop_assert_eq!(err.len, cut);
        prop_assert_eq!(err.need, spec.prefix_width());
    }

    #[test]
    fn filler_corruption_does_not_disturb_the_sequence(
        (spec, sequence) in spec_and_sequence(),
        offset_seed in any::<usize>(),
        flip in 1u8..,
    ) {
        prop_assume!(spec.payload_size() > spec.prefix_width());
        let mut unit = spec.encode(sequence).to_vec();
        let body = spec.payload_size() - spec.prefix_width();
        let offset = spec.prefix_width() + offset_seed % body;
        unit[offset] ^= flip;
        prop_assert_eq!(spec.decode(&unit), Ok(sequence));
    }
}

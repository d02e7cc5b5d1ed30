// LZ-diff codec scenarios: round-trips, token shapes, both dialects, and
// the estimator/cost-vector contracts.

use garc_common::{symbols_from_ascii, Contig};
use garc_core::{LzDiff, LzVersion};

fn lz_with(version: LzVersion, min_match_len: u32) -> LzDiff {
    let mut lz = LzDiff::new(version);
    assert!(lz.set_min_match_len(min_match_len));
    lz
}

fn prepared(version: LzVersion, min_match_len: u32, reference: &Contig) -> LzDiff {
    let mut lz = lz_with(version, min_match_len);
    lz.prepare(reference);
    lz
}

/// Deterministic pseudo-random sequence over ACGT symbols
fn random_contig(len: usize, seed: u64) -> Contig {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) & 3) as u8
        })
        .collect()
}

#[test]
fn test_self_reference_is_empty() {
    let reference = symbols_from_ascii(b"ACGTACGTACGT");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    let encoded = lz.encode(&reference);
    assert!(encoded.is_empty());
    assert_eq!(lz.decode(&reference, b"").unwrap(), reference);
}

#[test]
fn test_prefix_of_reference_is_one_closed_match() {
    let reference = symbols_from_ascii(b"ACGTACGTACGT");
    let text = symbols_from_ascii(b"ACGTACGT");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    // the match stops short of the reference end, so the length is written
    let encoded = lz.encode(&text);
    assert_eq!(encoded, b"0,2.".to_vec());
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

#[test]
fn test_unmatchable_text_is_all_literals() {
    let reference = symbols_from_ascii(b"ACGTACGTACGT");
    let text = symbols_from_ascii(b"TTTTTTTTTTTT");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    let encoded = lz.encode(&text);
    assert_eq!(encoded.len(), text.len());
    assert!(encoded.iter().all(|&c| c == b'D')); // T carries symbol 3
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

#[test]
fn test_nrun_in_the_middle() {
    let reference = symbols_from_ascii(b"ACGTACGTNNNNNNNNACGT");
    let text = symbols_from_ascii(b"ACGTNNNNNNNNACGT");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    let encoded = lz.encode(&text);
    // the 8-base run collapses into exactly one N-run token
    assert_eq!(encoded.iter().filter(|&&c| c == 30).count(), 1);
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

#[test]
fn test_trailing_mismatch_stays_a_literal() {
    let reference = symbols_from_ascii(b"AAAAAAAAAAAAAAAA");
    let text = symbols_from_ascii(b"AAAAAAAAAAAAAAAG");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    // match over the first 15 bases, then one literal that disagrees with
    // the reference and therefore is not rewritten to '!'
    let encoded = lz.encode(&text);
    assert_eq!(encoded, b"0,9.C".to_vec()); // G carries symbol 2
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

#[test]
fn test_identity_literal_rewrite_and_open_ended_match() {
    // reference avoids T entirely, so windows covering the mutated base
    // cannot match and come out as literals
    let reference = symbols_from_ascii(b"ACGCGACCGGAACGGCACGACGGCAACCGG");
    let mut text = reference.clone();
    text[2] = 3; // T

    let mut lz = prepared(LzVersion::V2, 6, &reference);
    let encoded = lz.encode(&text);

    // literals A, C, T precede a match that resumes at the predicted
    // position and runs to both ends: the agreeing 'C' literal becomes '!'
    // and the match is open-ended
    assert_eq!(encoded, b"A!D0.".to_vec());
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

#[test]
fn test_nrun_policy_boundary() {
    let reference = random_contig(64, 11);

    // runs shorter than the minimum are literals
    let short: Contig = symbols_from_ascii(b"ACGNNNACG");
    let mut lz = prepared(LzVersion::V2, 6, &reference);
    let encoded = lz.encode(&short);
    assert_eq!(encoded.iter().filter(|&&c| c == 30).count(), 0);
    assert_eq!(encoded.len(), short.len());
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), short);

    // one base longer and the run becomes a single token
    let long: Contig = symbols_from_ascii(b"ACGNNNNACG");
    let encoded = lz.encode(&long);
    assert_eq!(encoded.iter().filter(|&&c| c == 30).count(), 1);
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), long);
}

#[test]
fn test_roundtrip_with_scattered_snps() {
    let reference = random_contig(600, 42);
    let mut text = reference.clone();
    for k in (31..600).step_by(57) {
        text[k] = (text[k] + 1) % 4;
    }

    for version in [LzVersion::V1, LzVersion::V2] {
        let mut lz = prepared(version, 18, &reference);
        let encoded = lz.encode(&text);
        assert!(encoded.len() < text.len());
        assert_eq!(lz.decode(&reference, &encoded).unwrap(), text, "{:?}", version);
    }
}

#[test]
fn test_estimate_matches_encode_exactly() {
    let reference = random_contig(500, 7);
    let mut text = reference.clone();
    for k in (20..500).step_by(83) {
        text[k] = (text[k] + 2) % 4;
    }

    let mut lz = prepared(LzVersion::V2, 16, &reference);
    let encoded_len = lz.encode(&text).len() as u32;
    assert_eq!(lz.estimate(&text, u32::MAX), encoded_len);

    // a query equal to the reference is free
    assert_eq!(lz.estimate(&reference.clone(), u32::MAX), 0);
}

#[test]
fn test_estimate_early_exit_is_a_lower_bound() {
    let reference = symbols_from_ascii(b"ACGTACGTACGT");
    let text = symbols_from_ascii(b"TTTTTTTTTTTT");
    let mut lz = prepared(LzVersion::V2, 6, &reference);

    // the scan stops at the first check past the bound
    let bounded = lz.estimate(&text, 3);
    assert_eq!(bounded, 4);
    assert!(lz.encode(&text).len() as u32 >= bounded);
}

#[test]
fn test_v1_dialect_has_no_v2_forms() {
    let reference = random_contig(200, 3);
    let mut lz = prepared(LzVersion::V1, 16, &reference);

    // equal sequences still encode to a real token stream under V1
    let encoded = lz.encode(&reference.clone());
    assert!(!encoded.is_empty());
    assert!(!encoded.contains(&b'!'));
    // every match token carries its length
    assert_eq!(
        encoded.iter().filter(|&&c| c == b'.').count(),
        encoded.iter().filter(|&&c| c == b',').count()
    );
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), reference);
}

#[test]
fn test_v1_estimate_is_full_encode_length() {
    let reference = random_contig(300, 19);
    let mut text = reference.clone();
    text[40] = (text[40] + 1) % 4;

    let mut lz = prepared(LzVersion::V1, 16, &reference);
    let encoded_len = lz.encode(&text).len() as u32;
    assert_eq!(lz.estimate(&text, 1), encoded_len); // bound is ignored
}

#[test]
fn test_set_min_match_len_rejected_after_prepare() {
    let reference = random_contig(100, 5);

    let mut lz = LzDiff::new(LzVersion::V2);
    assert!(lz.set_min_match_len(20));
    lz.prepare(&reference);
    assert!(!lz.set_min_match_len(24));
    assert_eq!(lz.min_match_len(), 20);
}

#[test]
fn test_encode_is_deterministic_across_instances() {
    let reference = random_contig(400, 23);
    let mut text = reference.clone();
    text[100] = (text[100] + 3) % 4;

    let mut a = prepared(LzVersion::V2, 18, &reference);
    let mut b = prepared(LzVersion::V2, 18, &reference);
    assert_eq!(a.encode(&text), b.encode(&text));
    assert_eq!(a.encode(&text), a.encode(&text));
}

#[test]
fn test_get_reference_strips_padding() {
    let reference = random_contig(75, 1);
    let lz = prepared(LzVersion::V2, 18, &reference);
    assert_eq!(lz.get_reference(), reference);
}

#[test]
fn test_cost_vector_shape_and_placement() {
    let reference = random_contig(300, 77);
    let mut text = reference.clone();
    text[150] = (text[150] + 1) % 4;

    let mut lz = prepared(LzVersion::V2, 16, &reference);
    let prefix = lz.get_coding_cost_vector(&text, true);
    let suffix = lz.get_coding_cost_vector(&text, false);

    assert_eq!(prefix.len(), text.len());
    assert_eq!(suffix.len(), text.len());
    // placement moves costs around but never changes the total
    assert_eq!(prefix.iter().sum::<u32>(), suffix.iter().sum::<u32>());
    // a match emission leaves zeros on its covered bases
    assert!(prefix.iter().any(|&c| c == 0));

    // text with no matchable window costs one byte per base
    let junk: Contig = vec![4; 40]; // all N, but runs are tokens
    let plain: Contig = symbols_from_ascii(b"TTTTTTTT");
    let mut lz2 = prepared(LzVersion::V2, 16, &reference);
    let costs = lz2.get_coding_cost_vector(&plain, true);
    assert!(costs.iter().all(|&c| c == 1));
    let nrun_costs = lz2.get_coding_cost_vector(&junk, true);
    assert_eq!(nrun_costs.len(), junk.len());
    assert_eq!(nrun_costs[0], 1 + 2 + 1); // starter + "36" + terminator
    assert!(nrun_costs[1..].iter().all(|&c| c == 0));
}

#[test]
fn test_long_reference_uses_wide_table() {
    // push the reference past the 16-bit cell limit
    let reference = random_contig(70_000, 99);
    let mut text = reference[1_000..3_000].to_vec();
    text[500] = (text[500] + 1) % 4;

    let mut lz = prepared(LzVersion::V2, 18, &reference);
    let encoded = lz.encode(&text);
    assert!(encoded.len() < text.len() / 4);
    assert_eq!(lz.decode(&reference, &encoded).unwrap(), text);
}

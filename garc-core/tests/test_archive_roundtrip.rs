// End-to-end archive tests: create, append, and extract

use garc_common::{ascii_from_symbols, Contig};
use garc_core::{Compressor, CompressorConfig, Decompressor, LzVersion};
use std::io::Write;
use tempfile::tempdir;

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

fn mutated(base: &Contig, step: usize) -> Contig {
    let mut out = base.clone();
    let mut k = step;
    while k < out.len() {
        out[k] = (out[k] + 1) % 4;
        k += step;
    }
    out
}

fn test_config() -> CompressorConfig {
    CompressorConfig {
        segment_size: 100,
        min_match_len: 16,
        zstd_level: 3,
        verbosity: 0,
    }
}

#[test]
fn test_create_and_extract_two_samples() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two.garc");

    let chr1 = random_contig(330, 1);
    let chr2 = random_contig(140, 2);
    let ref_sample = vec![
        ("chr1".to_string(), chr1.clone()),
        ("chr2".to_string(), chr2.clone()),
    ];
    let alt_sample = vec![
        ("chr1".to_string(), mutated(&chr1, 47)),
        ("chr2".to_string(), mutated(&chr2, 31)),
    ];

    let mut comp = Compressor::new(&path, test_config()).unwrap();
    comp.add_sample_contigs("ref", ref_sample.clone()).unwrap();
    let groups_after_ref = comp.n_groups();
    comp.add_sample_contigs("alt", alt_sample.clone()).unwrap();
    // the mutated sample reuses the reference layout
    assert_eq!(comp.n_groups(), groups_after_ref);
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&path).unwrap();
    assert_eq!(decomp.n_samples(), 2);
    assert_eq!(decomp.reference_sample(), Some("ref"));
    assert_eq!(decomp.list_samples(), vec!["ref", "alt"]);
    assert_eq!(decomp.lz_version(), LzVersion::V2);
    assert_eq!(decomp.segment_size(), 100);
    assert_eq!(decomp.min_match_len(), 16);
    assert_eq!(
        decomp.list_contigs("alt").unwrap(),
        vec!["chr1", "chr2"]
    );

    assert_eq!(decomp.get_sample("ref").unwrap(), ref_sample);
    assert_eq!(decomp.get_sample("alt").unwrap(), alt_sample);
}

#[test]
fn test_range_extraction_matches_full_contig() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("range.garc");

    let chr1 = random_contig(350, 9);
    let alt = mutated(&chr1, 29);

    let mut comp = Compressor::new(&path, test_config()).unwrap();
    comp.add_sample_contigs("ref", vec![("chr1".to_string(), chr1.clone())])
        .unwrap();
    comp.add_sample_contigs("alt", vec![("chr1".to_string(), alt.clone())])
        .unwrap();
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&path).unwrap();
    for (start, end) in [(0, 350), (0, 1), (95, 105), (100, 300), (340, 350)] {
        let slice = decomp
            .get_contig_range(Some("alt"), "chr1", start, end)
            .unwrap();
        assert_eq!(slice, alt[start..end].to_vec(), "range {}-{}", start, end);
    }

    // a contig lookup without a sample finds the first occurrence
    assert_eq!(decomp.get_contig(None, "chr1").unwrap(), chr1);

    assert!(decomp.get_contig_range(Some("alt"), "chr1", 100, 351).is_err());
    assert!(decomp.get_contig(Some("alt"), "chrX").is_err());
    assert!(decomp.get_sample("missing").is_err());
}

#[test]
fn test_divergent_contig_founds_new_groups() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("divergent.garc");

    let chr1 = random_contig(300, 4);
    // same contig rank, entirely unrelated content
    let stranger = random_contig(300, 4242);

    let mut comp = Compressor::new(&path, test_config()).unwrap();
    comp.add_sample_contigs("ref", vec![("chr1".to_string(), chr1.clone())])
        .unwrap();
    let groups_after_ref = comp.n_groups();
    comp.add_sample_contigs("far", vec![("chr1".to_string(), stranger.clone())])
        .unwrap();
    // poor estimates push the divergent segments into fresh groups
    assert!(comp.n_groups() > groups_after_ref);
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&path).unwrap();
    assert_eq!(decomp.get_sample("far").unwrap()[0].1, stranger);
    assert_eq!(decomp.get_sample("ref").unwrap()[0].1, chr1);
}

#[test]
fn test_extra_contig_in_later_sample() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("extra.garc");

    let chr1 = random_contig(220, 6);
    let chr_extra = random_contig(130, 60);

    let mut comp = Compressor::new(&path, test_config()).unwrap();
    comp.add_sample_contigs("ref", vec![("chr1".to_string(), chr1.clone())])
        .unwrap();
    comp.add_sample_contigs(
        "plus",
        vec![
            ("chr1".to_string(), mutated(&chr1, 53)),
            ("chrM".to_string(), chr_extra.clone()),
        ],
    )
    .unwrap();
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&path).unwrap();
    assert_eq!(decomp.list_contigs("plus").unwrap(), vec!["chr1", "chrM"]);
    assert_eq!(decomp.get_contig(Some("plus"), "chrM").unwrap(), chr_extra);
}

#[test]
fn test_append_produces_superset_archive() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.garc");
    let second = dir.path().join("second.garc");

    let chr1 = random_contig(260, 12);
    let alt = mutated(&chr1, 41);
    let third = mutated(&chr1, 37);

    let mut comp = Compressor::new(&first, test_config()).unwrap();
    comp.add_sample_contigs("ref", vec![("chr1".to_string(), chr1.clone())])
        .unwrap();
    comp.add_sample_contigs("alt", vec![("chr1".to_string(), alt.clone())])
        .unwrap();
    comp.finalize().unwrap();

    let mut comp = Compressor::from_archive(&first, &second, test_config()).unwrap();
    comp.add_sample_contigs("extra", vec![("chr1".to_string(), third.clone())])
        .unwrap();
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&second).unwrap();
    assert_eq!(decomp.list_samples(), vec!["ref", "alt", "extra"]);
    assert_eq!(decomp.get_sample("ref").unwrap()[0].1, chr1);
    assert_eq!(decomp.get_sample("alt").unwrap()[0].1, alt);
    assert_eq!(decomp.get_sample("extra").unwrap()[0].1, third);

    // the original archive is untouched
    let mut old = Decompressor::open(&first).unwrap();
    assert_eq!(old.n_samples(), 2);
    assert_eq!(old.get_sample("alt").unwrap()[0].1, alt);
}

#[test]
fn test_fasta_file_ingestion() {
    let dir = tempdir().unwrap();
    let fasta_path = dir.path().join("sample.fa");
    let archive_path = dir.path().join("fasta.garc");

    let chr = random_contig(180, 8);
    let ascii = ascii_from_symbols(&chr);
    let mut file = std::fs::File::create(&fasta_path).unwrap();
    writeln!(file, ">chrZ some description").unwrap();
    for chunk in ascii.chunks(70) {
        file.write_all(chunk).unwrap();
        file.write_all(b"\n").unwrap();
    }
    drop(file);

    let mut comp = Compressor::new(&archive_path, test_config()).unwrap();
    comp.add_fasta_file("sample", &fasta_path).unwrap();
    comp.finalize().unwrap();

    let mut decomp = Decompressor::open(&archive_path).unwrap();
    assert_eq!(decomp.list_samples(), vec!["sample"]);
    assert_eq!(decomp.get_contig(Some("sample"), "chrZ").unwrap(), chr);
}

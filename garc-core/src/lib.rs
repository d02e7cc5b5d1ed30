//! Core engine of the garc genome-collection archive.
//!
//! The centerpiece is the reference-relative LZ-diff codec
//! ([`lz_diff::LzDiff`]): contigs of related assemblies are encoded as
//! literals, N-run tokens, and back-references against a reference contig,
//! giving independently decodable, cross-referenced blocks. Around it sit
//! FASTA I/O, fixed-size segmentation, zstd segment compression, and the
//! compressor/decompressor pair that reads and writes archives.
//!
//! # Example
//!
//! ```
//! use garc_core::{LzDiff, LzVersion};
//! use garc_common::symbols_from_ascii;
//!
//! let reference = symbols_from_ascii(b"ACGTACGTACGTACGTACGTACGT");
//! let query = symbols_from_ascii(b"ACGTACGTACGTACGTACGTACGG");
//!
//! let mut lz = LzDiff::new(LzVersion::V2);
//! lz.set_min_match_len(12);
//! lz.prepare(&reference);
//!
//! let encoded = lz.encode(&query);
//! assert!(encoded.len() < query.len());
//! assert_eq!(lz.decode(&reference, &encoded).unwrap(), query);
//! ```

pub mod compressor;
pub mod decompressor;
pub mod genome_io;
pub mod lz_diff;
pub mod segment;
pub mod segment_compression;

pub use compressor::{Compressor, CompressorConfig};
pub use decompressor::Decompressor;
pub use genome_io::{GenomeIO, GenomeWriter, DEFAULT_LINE_WIDTH};
pub use lz_diff::{DecodeError, LzDiff, LzVersion, DEFAULT_MIN_MATCH_LEN, HASHING_STEP};
pub use segment::{segment_bounds, segments_for_range, DEFAULT_SEGMENT_SIZE};
pub use segment_compression::{compress_part, decompress_part, DEFAULT_ZSTD_LEVEL};

// Segment compression
// ZSTD wrap/unwrap for segment payloads and the serialized collection

use anyhow::{Context, Result};
use garc_common::types::PackedBlock;

/// Default ZSTD compression level for segment payloads
pub const DEFAULT_ZSTD_LEVEL: i32 = 17;

pub fn compress_part(data: &[u8], level: i32) -> Result<PackedBlock> {
    zstd::encode_all(data, level).context("zstd compression failed")
}

pub fn decompress_part(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).context("zstd decompression failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let original: Vec<u8> = (0..1000).map(|i| (i % 5) as u8).collect();
        let packed = compress_part(&original, DEFAULT_ZSTD_LEVEL).unwrap();
        assert!(packed.len() < original.len());
        assert_eq!(decompress_part(&packed).unwrap(), original);
    }

    #[test]
    fn test_empty() {
        let packed = compress_part(&[], DEFAULT_ZSTD_LEVEL).unwrap();
        assert_eq!(decompress_part(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decompress_part(b"definitely not zstd").is_err());
    }
}

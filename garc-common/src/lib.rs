// garc common library
// Shared types, hashing, varints, the stream container, and the collection
// directory used by both the compression and extraction sides.

pub mod archive;
pub mod collection;
pub mod hash;
pub mod types;
pub mod varint;

// Re-export commonly used types
pub use types::{Contig, PackedBlock};
pub use types::{
    ascii_from_symbol, ascii_from_symbols, garc_version, symbol_from_ascii, symbols_from_ascii,
    INVALID_SYMBOL, N_SYMBOL, PAD_SYMBOL,
};
pub use types::{GARC_FILE_MAJOR, GARC_FILE_MINOR, GARC_VER_BUGFIX, GARC_VER_MAJOR, GARC_VER_MINOR};

pub use hash::MurMur64Hash;

pub use varint::{
    decode_varint, encode_varint, read_fixed_u64, read_varint, write_fixed_u64, write_varint,
    zigzag_decode, zigzag_encode,
};

pub use archive::{seg_stream_name, Archive, COLLECTION_STREAM, FILE_INFO_STREAM, PARAMS_STREAM};

pub use collection::{Collection, ContigDesc, SampleDesc, SegmentDesc};

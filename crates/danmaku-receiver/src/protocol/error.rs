//! Malformed-input faults found while decoding

/// Codec faults; decoding never panics, it records these and moves on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Buffer of {len} bytes is too short for a frame header")]
    TooShort { len: usize },

    #[error("Invalid frame length {total_length} at offset {offset}")]
    InvalidLength { offset: usize, total_length: u32 },

    #[error("Frame at offset {offset} declares {total_length} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        total_length: u32,
        available: usize,
    },

    #[error("Invalid header length {header_length} at offset {offset}")]
    InvalidHeaderLength { offset: usize, header_length: u16 },

    #[error("Failed to decompress frame body: {0}")]
    Decompress(String),

    #[error("Compressed frames nested deeper than {0} levels")]
    DepthExceeded(usize),
}

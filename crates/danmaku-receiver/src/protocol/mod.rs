//! Live gateway binary protocol
//!
//! Every frame starts with a fixed 16-byte big-endian header followed by the
//! body. One socket message may carry several frames back to back, and a
//! compressed frame's body is itself a buffer of frames.

mod codec;
mod error;
mod header;
mod operation;

pub use codec::{decode, decode_bytes, encode, encode_with, Decoded, Frame, MAX_DECOMPRESSED_LEN, MAX_DEPTH};
pub use error::ProtocolError;
pub use header::{
    FrameHeader, DEFAULT_SEQUENCE, DEFAULT_VERSION, HEADER_LEN, VERSION_BROTLI, VERSION_BROTLI_V3,
    VERSION_CONTROL, VERSION_JSON,
};
pub use operation::Operation;

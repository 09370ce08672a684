//! Frame header
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | total length     |
//! | 4      | 2    | header length    |
//! | 6      | 2    | protocol version |
//! | 8      | 4    | operation        |
//! | 12     | 4    | sequence id      |
//!
//! All fields are big-endian.

use bytes::{Buf, BufMut};

use super::operation::Operation;

/// Size of the fixed header
pub const HEADER_LEN: usize = 16;

/// Plain JSON body
pub const VERSION_JSON: u16 = 0;
/// Control frame with a plain body
pub const VERSION_CONTROL: u16 = 1;
/// Brotli container holding nested frames
pub const VERSION_BROTLI: u16 = 2;
/// Brotli container as labelled by the gateway when auth requests `protover: 3`
pub const VERSION_BROTLI_V3: u16 = 3;

/// Version written by `encode` when the caller does not choose one
pub const DEFAULT_VERSION: u16 = VERSION_CONTROL;
/// Sequence id written by `encode` when the caller does not choose one
pub const DEFAULT_SEQUENCE: u32 = 1;

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Whole frame length, header included
    pub total_length: u32,
    pub header_length: u16,
    pub version: u16,
    pub operation: Operation,
    /// Advisory only
    pub sequence_id: u32,
}

impl FrameHeader {
    /// Read a header from the start of `buf`, `None` if fewer than 16 bytes
    #[must_use]
    pub fn parse(mut buf: &[u8]) -> Option<Self> {
        if buf.remaining() < HEADER_LEN {
            return None;
        }

        Some(Self {
            total_length: buf.get_u32(),
            header_length: buf.get_u16(),
            version: buf.get_u16(),
            operation: Operation::from_u32(buf.get_u32()),
            sequence_id: buf.get_u32(),
        })
    }

    /// Append the header to `dst`
    pub fn write<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32(self.total_length);
        dst.put_u16(self.header_length);
        dst.put_u16(self.version);
        dst.put_u32(self.operation.as_u32());
        dst.put_u32(self.sequence_id);
    }

    /// Whether the body is a compressed buffer of nested frames
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        matches!(self.version, VERSION_BROTLI | VERSION_BROTLI_V3)
    }
}

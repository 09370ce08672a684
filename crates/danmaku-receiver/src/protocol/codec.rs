//! Frame encoding and decoding (panic-free).
//!
//! Decoding rules:
//! - Never read past the buffer; every length is checked before slicing.
//! - A bad frame header stops the walk over the current buffer.
//! - A bad compressed container is skipped; its siblings are still decoded.

use std::borrow::Cow;
use std::io::Read;

use bytes::{Bytes, BytesMut};

use super::error::ProtocolError;
use super::header::{FrameHeader, DEFAULT_SEQUENCE, DEFAULT_VERSION, HEADER_LEN};
use super::operation::Operation;

/// Deepest nesting of compressed containers that will be expanded
pub const MAX_DEPTH: usize = 4;

/// Upper bound for one container's decompressed size (16 MiB)
pub const MAX_DECOMPRESSED_LEN: usize = 16 * 1024 * 1024;

const BROTLI_BUFFER_SIZE: usize = 4096;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    /// Body bytes (zero-copy slice of the input or of a decompressed buffer)
    pub body: Bytes,
}

impl Frame {
    /// Operation from the header
    #[inline]
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.header.operation
    }

    /// Body as UTF-8 text, invalid sequences replaced
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Popularity counter carried by a heartbeat reply
    #[must_use]
    pub fn popularity(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.body.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }
}

/// Frames and faults produced by one decode call
#[derive(Debug, Default)]
pub struct Decoded {
    pub frames: Vec<Frame>,
    pub faults: Vec<ProtocolError>,
}

impl Decoded {
    /// True if the input decoded without any fault
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    fn fault(&mut self, fault: ProtocolError) {
        tracing::warn!(error = %fault, "Malformed frame input");
        self.faults.push(fault);
    }
}

/// Encode a control frame with the default version and sequence id
#[must_use]
pub fn encode(operation: Operation, body: &str) -> Bytes {
    encode_with(operation, body, DEFAULT_VERSION, DEFAULT_SEQUENCE)
}

/// Encode a frame with an explicit version and sequence id
#[must_use]
pub fn encode_with(operation: Operation, body: &str, version: u16, sequence_id: u32) -> Bytes {
    let header = FrameHeader {
        total_length: (HEADER_LEN + body.len()) as u32,
        header_length: HEADER_LEN as u16,
        version,
        operation,
        sequence_id,
    };

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    header.write(&mut buf);
    buf.extend_from_slice(body.as_bytes());
    buf.freeze()
}

/// Decode a socket message into frames, expanding compressed containers
#[must_use]
pub fn decode(buf: &[u8]) -> Decoded {
    decode_bytes(Bytes::copy_from_slice(buf))
}

/// Decode an owned buffer; frame bodies share its allocation
#[must_use]
pub fn decode_bytes(buf: Bytes) -> Decoded {
    let mut out = Decoded::default();
    if buf.len() < HEADER_LEN {
        out.fault(ProtocolError::TooShort { len: buf.len() });
        return out;
    }
    decode_into(&buf, 0, &mut out);
    out
}

fn decode_into(buf: &Bytes, depth: usize, out: &mut Decoded) {
    let mut offset = 0;

    while buf.len() - offset >= HEADER_LEN {
        let Some(header) = FrameHeader::parse(&buf[offset..]) else {
            break;
        };

        let total = header.total_length as usize;
        if total < HEADER_LEN {
            out.fault(ProtocolError::InvalidLength {
                offset,
                total_length: header.total_length,
            });
            break;
        }

        let available = buf.len() - offset;
        if total > available {
            out.fault(ProtocolError::Truncated {
                offset,
                total_length: header.total_length,
                available,
            });
            break;
        }

        let header_len = usize::from(header.header_length);
        if header_len < HEADER_LEN || header_len > total {
            out.fault(ProtocolError::InvalidHeaderLength {
                offset,
                header_length: header.header_length,
            });
            break;
        }

        let body = buf.slice(offset + header_len..offset + total);

        if header.is_compressed() {
            if depth >= MAX_DEPTH {
                out.fault(ProtocolError::DepthExceeded(MAX_DEPTH));
            } else {
                match decompress(&body) {
                    Ok(inner) => decode_into(&inner, depth + 1, out),
                    Err(fault) => out.fault(fault),
                }
            }
        } else {
            out.frames.push(Frame { header, body });
        }

        offset += total;
    }
}

fn decompress(body: &[u8]) -> Result<Bytes, ProtocolError> {
    let decoder = brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE);
    let mut inflated = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_LEN as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| ProtocolError::Decompress(e.to_string()))?;

    if inflated.len() > MAX_DECOMPRESSED_LEN {
        return Err(ProtocolError::Decompress(format!(
            "output exceeds {MAX_DECOMPRESSED_LEN} bytes"
        )));
    }
    Ok(Bytes::from(inflated))
}

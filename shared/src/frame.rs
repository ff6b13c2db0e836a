//! Length-prefixed framing for a continuous byte stream
//!
//! TCP delivers bytes, not messages: one read may hold half a packet or
//! several packets. Every payload is therefore wrapped as
//!
//! ```text
//! [Length(4, u32 LE)] [Payload(Length)]
//! ```
//!
//! and the receiving side accumulates bytes until a whole frame is present
//! before handing the payload to the packet decoder.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, WireError, WireResult};
use crate::packet::Packet;

pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload a peer may announce
pub const MAX_FRAME_LEN: usize = 64 * 1024;

fn split_frame(buf: &mut BytesMut) -> WireResult<Option<BytesMut>> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let mut header = [0u8; FRAME_HEADER_LEN];
    header.copy_from_slice(&buf[..FRAME_HEADER_LEN]);
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let total = FRAME_HEADER_LEN + len;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_LEN);
    Ok(Some(buf.split_to(len)))
}

fn put_frame(payload: &[u8], dst: &mut BytesMut) -> WireResult<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    dst.reserve(FRAME_HEADER_LEN + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Wraps an already encoded payload in a frame header
pub fn frame_payload(payload: &[u8]) -> WireResult<Bytes> {
    let mut dst = BytesMut::new();
    put_frame(payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Encodes one packet as one complete frame
pub fn encode_frame<P: Packet>(packet: &P) -> WireResult<Bytes> {
    frame_payload(&packet.encode()?)
}

/// Per-connection buffer that yields payloads once they are complete
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: BytesMut,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns the next complete payload, or `None` while bytes are missing
    pub fn next_frame(&mut self) -> WireResult<Option<BytesMut>> {
        split_frame(&mut self.buf)
    }

    /// Bytes held for frames that have not completed yet
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Tokio codec applying the same framing rules to an async stream
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(split_frame(src)?)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Ok(put_frame(&payload, dst)?)
    }
}

//! Little-endian primitive encoding over fixed-capacity buffers
//!
//! `PacketWriter` owns a buffer sized up front and a cursor; it never grows,
//! so an oversized packet surfaces as `WireError::BufferFull` instead of a
//! silent reallocation. `PacketReader` walks a borrowed slice and reports how
//! many bytes are left so callers can keep decoding packets until the input
//! is exhausted.

use crate::error::{WireError, WireResult};

/// Fixed-capacity cursor writer for one or more packets
#[derive(Debug)]
pub struct PacketWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl PacketWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn reserve(&mut self, needed: usize) -> WireResult<&mut [u8]> {
        let available = self.buf.len() - self.pos;
        if needed > available {
            return Err(WireError::BufferFull { needed, available });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&mut self.buf[start..self.pos])
    }

    pub fn write_u8(&mut self, value: u8) -> WireResult<()> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> WireResult<()> {
        self.reserve(2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> WireResult<()> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> WireResult<()> {
        self.reserve(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a `u16` byte length followed by the raw UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> WireResult<()> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| WireError::StringTooLong(bytes.len()))?;
        self.write_u16(len)?;
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Returns only the bytes actually written, not the full capacity
    pub fn finish(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.pos);
        self.buf
    }
}

/// Cursor reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> WireResult<&'a [u8]> {
        let available = self.remaining();
        if needed > available {
            return Err(WireError::UnexpectedEof { needed, available });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&self.data[start..self.pos])
    }

    fn take_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> WireResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> WireResult<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_string(&mut self) -> WireResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }
}

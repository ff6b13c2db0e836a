use thiserror::Error;

/// Errors raised while encoding, decoding or framing packets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of packet: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("packet buffer full: needed {needed} bytes, {available} left")]
    BufferFull { needed: usize, available: usize },

    #[error("unknown packet tag 0x{0:02X}")]
    UnknownTag(u8),

    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("entity update holds {0} entries, at most 255 fit")]
    TooManyEntities(usize),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
}

pub type WireResult<T> = Result<T, WireError>;

/// Failures surfaced by [`crate::frame::FrameCodec`] on a byte stream
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),
}

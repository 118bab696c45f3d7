//! Length-prefixed messages over npipe channels.
//!
//! Each message is a 4-byte big-endian payload length followed by the
//! payload. Payloads are opaque bytes; nothing here interprets them.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod mock;

use bytes::Bytes;
use npipe_transport::{PipeIo, Timeout};

pub use codec::{decode_header, encode_header, MessageConfig, DEFAULT_MAX_MESSAGE, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::read_message;
pub use writer::write_message;

/// Message operations on any connected pipe end, using the default
/// [`MessageConfig`].
pub trait MessageExt: PipeIo {
    /// Read one message; see [`read_message`].
    fn read_message(&self, timeout: Timeout) -> Result<Bytes> {
        reader::read_message(self, timeout, &MessageConfig::default())
    }

    /// Write one message; see [`write_message`].
    fn write_message(&self, payload: &[u8]) -> Result<()> {
        writer::write_message(self, payload, &MessageConfig::default())
    }
}

impl<T: PipeIo + ?Sized> MessageExt for T {}

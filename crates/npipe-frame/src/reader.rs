use bytes::{Bytes, BytesMut};
use npipe_transport::{PipeIo, Timeout};

use crate::codec::{decode_header, MessageConfig, HEADER_SIZE};
use crate::error::Result;

/// Read one length-prefixed message.
///
/// The header and the payload are each read with the full `timeout`; a
/// message may therefore take up to twice `timeout` to arrive. A timeout after
/// the header was consumed leaves the stream mid-message.
pub fn read_message<T: PipeIo + ?Sized>(
    io: &T,
    timeout: Timeout,
    config: &MessageConfig,
) -> Result<Bytes> {
    let mut header = [0u8; HEADER_SIZE];
    io.read_exact(&mut header, timeout)?;
    let len = decode_header(header);

    // Checked before allocating so a corrupt header cannot exhaust memory.
    config.check(len)?;
    if len == 0 {
        return Ok(Bytes::new());
    }

    let mut payload = BytesMut::zeroed(len);
    io.read_exact(&mut payload, timeout)?;
    tracing::trace!(len, "read message");
    Ok(payload.freeze())
}

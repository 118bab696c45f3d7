use npipe_transport::PipeIo;

use crate::codec::{encode_header, MessageConfig};
use crate::error::Result;

/// Write one length-prefixed message.
///
/// The header and payload go out as two writes. Concurrent writers on one
/// handle may interleave them; use a single writer thread per handle.
pub fn write_message<T: PipeIo + ?Sized>(
    io: &T,
    payload: &[u8],
    config: &MessageConfig,
) -> Result<()> {
    config.check(payload.len())?;
    let header = encode_header(payload.len())?;
    io.write(&header)?;
    if !payload.is_empty() {
        io.write(payload)?;
    }
    tracing::trace!(len = payload.len(), "wrote message");
    Ok(())
}

use crate::error::{FrameError, Result};

/// Length prefix: 4 bytes, big-endian.
pub const HEADER_SIZE: usize = 4;

/// Default maximum message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Limits applied by the message reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageConfig {
    /// Largest payload accepted in either direction. Default: 16 MiB.
    pub max_message_size: usize,
}

impl MessageConfig {
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Fail with `MessageTooLarge` if `size` exceeds the limit or cannot be
    /// expressed in the length prefix.
    pub fn check(&self, size: usize) -> Result<()> {
        let max = self.max_message_size.min(u32::MAX as usize);
        if size > max {
            return Err(FrameError::MessageTooLarge { size, max });
        }
        Ok(())
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// Encode the length prefix for a payload of `len` bytes.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬─────────────────┐
/// │ Length (4B BE)   │ Payload         │
/// │                  │ (Length bytes)  │
/// └──────────────────┴─────────────────┘
/// ```
pub fn encode_header(len: usize) -> Result<[u8; HEADER_SIZE]> {
    let len = u32::try_from(len).map_err(|_| FrameError::MessageTooLarge {
        size: len,
        max: u32::MAX as usize,
    })?;
    Ok(len.to_be_bytes())
}

/// Decode a length prefix.
pub fn decode_header(header: [u8; HEADER_SIZE]) -> usize {
    u32::from_be_bytes(header) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian() {
        assert_eq!(encode_header(0).unwrap(), [0, 0, 0, 0]);
        assert_eq!(encode_header(2).unwrap(), [0, 0, 0, 2]);
        assert_eq!(encode_header(0x0102_0304).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn decode_reads_big_endian() {
        assert_eq!(decode_header([0, 0, 1, 0]), 256);
        assert_eq!(decode_header([0xFF, 0xFF, 0xFF, 0xFF]), u32::MAX as usize);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn encode_rejects_lengths_beyond_u32() {
        let err = encode_header(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { .. }));
    }

    #[test]
    fn config_check_enforces_limit() {
        let config = MessageConfig::with_max_message_size(8);
        assert!(config.check(0).is_ok());
        assert!(config.check(8).is_ok());
        assert!(matches!(
            config.check(9),
            Err(FrameError::MessageTooLarge { size: 9, max: 8 })
        ));
        assert_eq!(MessageConfig::default().max_message_size, DEFAULT_MAX_MESSAGE);
    }
}

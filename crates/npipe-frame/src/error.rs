use npipe_transport::{ErrorCode, ErrorKind, PipeError};

/// Errors that can occur while sending or receiving messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying pipe operation failed.
    #[error(transparent)]
    Transport(#[from] PipeError),

    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

impl FrameError {
    /// Taxonomy category; oversize messages count as I/O failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Transport(err) => err.kind(),
            FrameError::MessageTooLarge { .. } => ErrorKind::Io,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            FrameError::Transport(err) => err.code(),
            FrameError::MessageTooLarge { .. } => ErrorCode::Generic,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Transport(err) if err.is_timeout())
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, FrameError::Transport(err) if err.is_stopped())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

use std::fmt;
use std::path::PathBuf;

use crate::state::Role;
use crate::timeout::Timeout;

/// Errors that can occur in named-pipe operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// The short name cannot be turned into a pipe name.
    #[error("invalid pipe name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The resolved name is too long for the platform.
    #[error("pipe name too long ({len} bytes, max {max}): {path}")]
    NameTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The caller's identity could not be established.
    #[error("cannot determine caller identity: {0}")]
    Identity(String),

    /// Failed to create a listening endpoint.
    #[error("failed to create pipe {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a listening endpoint.
    #[error("failed to open pipe {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A bounded wait expired.
    #[error("operation timed out after {0}")]
    TimedOut(Timeout),

    /// The handle was stopped while (or before) waiting.
    #[error("operation stopped")]
    Stopped,

    /// The peer closed its end of the pipe.
    #[error("peer disconnected")]
    Disconnected,

    /// An I/O error occurred on the pipe.
    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handle has already been closed.
    #[error("pipe handle closed")]
    Closed,

    /// A negative timeout other than the infinite sentinel.
    #[error("invalid timeout {0} ms (use -1 for infinite)")]
    InvalidTimeout(i64),

    /// The operation is not available for the handle's role.
    #[error("{op} is not supported on a {role} handle")]
    WrongRole { op: &'static str, role: Role },

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, PipeError>;

/// Failure categories a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameResolution,
    Create,
    Open,
    Timeout,
    Stopped,
    Io,
    HandleClosed,
    InvalidArgument,
}

/// Coarse error code surfaced to foreign callers.
///
/// `Timeout` is reserved for expired waits and `Stopped` for cancellation;
/// everything else is `Generic`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    None = 0,
    Timeout = 1,
    Stopped = 2,
    Generic = 3,
}

impl PipeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipeError::InvalidName { .. } | PipeError::NameTooLong { .. } | PipeError::Identity(_) => {
                ErrorKind::NameResolution
            }
            PipeError::Create { .. } => ErrorKind::Create,
            PipeError::Open { .. } => ErrorKind::Open,
            PipeError::TimedOut(_) => ErrorKind::Timeout,
            PipeError::Stopped => ErrorKind::Stopped,
            PipeError::Disconnected | PipeError::Io(_) => ErrorKind::Io,
            PipeError::Closed => ErrorKind::HandleClosed,
            PipeError::InvalidTimeout(_)
            | PipeError::WrongRole { .. }
            | PipeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind() {
            ErrorKind::Timeout => ErrorCode::Timeout,
            ErrorKind::Stopped => ErrorCode::Stopped,
            _ => ErrorCode::Generic,
        }
    }

    /// True for an expired wait; the handle is still usable.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipeError::TimedOut(_))
    }

    /// True when the call was cancelled by `stop`; callers must not retry.
    pub fn is_stopped(&self) -> bool {
        matches!(self, PipeError::Stopped)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NameResolution => "name-resolution",
            ErrorKind::Create => "create",
            ErrorKind::Open => "open",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Stopped => "stopped",
            ErrorKind::Io => "io",
            ErrorKind::HandleClosed => "handle-closed",
            ErrorKind::InvalidArgument => "invalid-argument",
        };
        f.write_str(name)
    }
}

use std::fmt;
use std::io;

use npipe_frame::FrameError;
use npipe_transport::{ErrorKind, PipeError};

// Exit codes follow sysexits(3) where one applies.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// 128 + SIGINT: the command was interrupted and stopped its pipe.
pub const STOPPED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => {
            TRANSPORT_ERROR
        }
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn pipe_error(context: &str, err: PipeError) -> CliError {
    match err {
        PipeError::Create { ref source, .. } | PipeError::Open { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        PipeError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        other => {
            let code = match other.kind() {
                ErrorKind::Timeout => TIMEOUT,
                ErrorKind::Stopped => STOPPED,
                ErrorKind::NameResolution | ErrorKind::InvalidArgument => USAGE,
                ErrorKind::Create | ErrorKind::Open | ErrorKind::Io => TRANSPORT_ERROR,
                ErrorKind::HandleClosed => INTERNAL,
            };
            CliError::new(code, format!("{context}: {other}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => pipe_error(context, err),
        FrameError::MessageTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

//! Named-pipe IPC with cancellable, timeout-bounded blocking I/O.
//!
//! npipe gives two processes on one host a named, bidirectional byte channel
//! and a simple message layer on top of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: Name resolution, pipe handles, timeouts, cancellation
//! - [`frame`]: 4-byte big-endian length-prefixed messages
//!
//! ```no_run
//! use npipe::{MessageExt, PipeHandle, Timeout, Visibility};
//!
//! let listener = PipeHandle::create_named("chat", Visibility::Private)?;
//! let client = PipeHandle::open_named("chat", Visibility::Private)?;
//! let server = listener.accept(Timeout::Infinite)?;
//!
//! client.write_message(b"hi")?;
//! assert_eq!(server.read_message(Timeout::Infinite)?.as_ref(), b"hi");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use npipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use npipe_frame::*;
}

pub use npipe_frame::{FrameError, MessageConfig, MessageExt};
#[cfg(unix)]
pub use npipe_transport::PipeHandle;
pub use npipe_transport::{
    ErrorCode, ErrorKind, Namespace, PipeError, PipeName, Role, State, Timeout, Visibility,
};

//! Named-pipe channels for local IPC.
//!
//! A pipe is addressed by a short name plus a [`Visibility`]. The
//! [`Namespace`] resolves that pair to a platform endpoint; on Unix this is
//! a domain socket inside a per-user or shared directory.
//!
//! [`PipeHandle`] is the single handle type for both ends:
//! - `create` binds a listener, `open` connects to one
//! - `accept`, `read`, and `read_exact` block with a [`Timeout`] and can be
//!   cancelled from another thread with `stop`
//! - `close` releases the endpoint exactly once
//!
//! Message framing lives one layer up, in `npipe-frame`, built on the
//! [`PipeIo`] trait.

pub mod error;
pub mod name;
pub mod state;
pub mod timeout;
pub mod traits;

#[cfg(unix)]
mod cancel;
#[cfg(unix)]
pub mod handle;
#[cfg(unix)]
mod sys;
#[cfg(unix)]
mod wait;

pub use error::{ErrorCode, ErrorKind, PipeError, Result};
pub use name::{Namespace, PipeName, Visibility};
pub use state::{Role, State};
pub use timeout::Timeout;
pub use traits::PipeIo;

#[cfg(unix)]
pub use handle::PipeHandle;

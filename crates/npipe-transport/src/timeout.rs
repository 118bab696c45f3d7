//! Timeout encoding for blocking pipe operations.
//!
//! Foreign callers pass signed milliseconds where `-1` means "wait forever" and
//! `0` means "poll". Other negative values are rejected rather than silently
//! treated as infinite.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{PipeError, Result};

/// How long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until ready, stopped, or failed.
    Infinite,
    /// Check readiness once and return.
    Immediate,
    /// Wait at most this long.
    After(Duration),
}

impl Timeout {
    /// Sentinel value for an infinite wait.
    pub const INFINITE_MSECS: i64 = -1;

    /// Decode a signed millisecond timeout.
    pub fn from_msecs(msecs: i64) -> Result<Self> {
        match msecs {
            Self::INFINITE_MSECS => Ok(Timeout::Infinite),
            0 => Ok(Timeout::Immediate),
            ms if ms > 0 => Ok(Timeout::After(Duration::from_millis(ms as u64))),
            other => Err(PipeError::InvalidTimeout(other)),
        }
    }

    /// Start the clock for this timeout.
    pub(crate) fn deadline(self) -> Deadline {
        let expires = match self {
            Timeout::After(d) => Instant::now().checked_add(d),
            _ => None,
        };
        Deadline {
            timeout: self,
            expires,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        if value.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(value)
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => f.write_str("infinite wait"),
            Timeout::Immediate => f.write_str("0ms"),
            Timeout::After(d) => write!(f, "{}ms", d.as_millis()),
        }
    }
}

/// A timeout anchored at the moment an operation started.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    timeout: Timeout,
    expires: Option<Instant>,
}

impl Deadline {
    pub(crate) fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Remaining wait for `poll(2)`: `-1` blocks forever, otherwise whole
    /// milliseconds rounded up so we never wake before the deadline.
    pub(crate) fn poll_timeout_ms(&self) -> i32 {
        match self.timeout {
            Timeout::Infinite => -1,
            Timeout::Immediate => 0,
            Timeout::After(_) => match self.expires {
                // Overflowed `Instant`: effectively forever.
                None => -1,
                Some(expires) => {
                    let left = expires.saturating_duration_since(Instant::now());
                    let ms = left.as_nanos().div_ceil(1_000_000);
                    i32::try_from(ms).unwrap_or(i32::MAX)
                }
            },
        }
    }

    pub(crate) fn expired(&self) -> bool {
        match self.timeout {
            Timeout::Infinite => false,
            Timeout::Immediate => true,
            Timeout::After(_) => self.expires.is_some_and(|at| Instant::now() >= at),
        }
    }
}

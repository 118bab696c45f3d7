use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sys;

/// Self-pipe used to wake a thread parked in `poll(2)`.
///
/// Raising writes a single byte that is never drained, so the read end stays
/// readable and every later wait returns immediately.
#[derive(Debug)]
pub(crate) struct CancelSignal {
    raised: AtomicBool,
    read: OwnedFd,
    write: OwnedFd,
}

impl CancelSignal {
    pub(crate) fn new() -> io::Result<Self> {
        let (read, write) = sys::nonblocking_pipe()?;
        Ok(Self {
            raised: AtomicBool::new(false),
            read,
            write,
        })
    }

    /// Latch the signal. Returns `false` if it was already raised.
    pub(crate) fn raise(&self) -> io::Result<bool> {
        if self.raised.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let byte = [1u8];
        loop {
            // SAFETY: `byte` is valid for one byte and `write` is an open descriptor.
            let rc = unsafe { libc::write(self.write.as_raw_fd(), byte.as_ptr().cast(), 1) };
            if rc >= 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                // Pipe already holds a wake-up byte.
                io::ErrorKind::WouldBlock => return Ok(true),
                _ => return Err(err),
            }
        }
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl AsFd for CancelSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_is_latched_and_idempotent() {
        let signal = CancelSignal::new().unwrap();
        assert!(!signal.is_raised());
        assert!(signal.raise().unwrap());
        assert!(signal.is_raised());
        assert!(!signal.raise().unwrap());
        assert!(signal.is_raised());
    }

    #[test]
    fn raised_signal_makes_read_end_readable() {
        let signal = CancelSignal::new().unwrap();
        signal.raise().unwrap();

        let mut fds = [libc::pollfd {
            fd: signal.as_fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        // SAFETY: `fds` is a valid array of one pollfd.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, 0) };
        assert_eq!(rc, 1);
        assert_ne!(fds[0].revents & libc::POLLIN, 0);
    }
}

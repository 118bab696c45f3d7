use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use crate::cancel::CancelSignal;
use crate::timeout::Deadline;

/// Outcome of waiting for an endpoint to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    Ready,
    TimedOut,
    Stopped,
}

/// Block until `fd` is readable, `cancel` is raised, or `deadline` passes.
///
/// Hang-ups and socket errors count as readable; the following read or
/// accept reports them. Cancellation wins when both fire together.
pub(crate) fn wait_readable(
    fd: BorrowedFd<'_>,
    cancel: &CancelSignal,
    deadline: &Deadline,
) -> io::Result<Readiness> {
    loop {
        if cancel.is_raised() {
            return Ok(Readiness::Stopped);
        }

        let mut fds = [
            libc::pollfd {
                fd: fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: cancel.as_fd().as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        // SAFETY: `fds` is a valid array of two pollfd structs for the call duration.
        let rc = unsafe {
            libc::poll(
                fds.as_mut_ptr(),
                fds.len() as libc::nfds_t,
                deadline.poll_timeout_ms(),
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        if fds[1].revents != 0 {
            return Ok(Readiness::Stopped);
        }
        if fds[0].revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        if fds[0].revents != 0 {
            return Ok(Readiness::Ready);
        }
        // poll may wake early on some platforms; only report expiry once due.
        if deadline.expired() {
            return Ok(Readiness::TimedOut);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::timeout::Timeout;

    #[test]
    fn ready_when_data_pending() {
        let (mut left, right) = UnixStream::pair().unwrap();
        let cancel = CancelSignal::new().unwrap();
        left.write_all(b"x").unwrap();

        let outcome = wait_readable(right.as_fd(), &cancel, &Timeout::Infinite.deadline()).unwrap();
        assert_eq!(outcome, Readiness::Ready);
    }

    #[test]
    fn times_out_after_bounded_wait() {
        let (_left, right) = UnixStream::pair().unwrap();
        let cancel = CancelSignal::new().unwrap();

        let start = Instant::now();
        let deadline = Timeout::After(Duration::from_millis(50)).deadline();
        let outcome = wait_readable(right.as_fd(), &cancel, &deadline).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome, Readiness::TimedOut);
        assert!(elapsed >= Duration::from_millis(50), "woke early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "overran: {elapsed:?}");
    }

    #[test]
    fn immediate_poll_does_not_block() {
        let (_left, right) = UnixStream::pair().unwrap();
        let cancel = CancelSignal::new().unwrap();
        let outcome = wait_readable(right.as_fd(), &cancel, &Timeout::Immediate.deadline()).unwrap();
        assert_eq!(outcome, Readiness::TimedOut);
    }

    #[test]
    fn hangup_counts_as_ready() {
        let (left, right) = UnixStream::pair().unwrap();
        let cancel = CancelSignal::new().unwrap();
        drop(left);
        let outcome = wait_readable(right.as_fd(), &cancel, &Timeout::Infinite.deadline()).unwrap();
        assert_eq!(outcome, Readiness::Ready);
    }

    #[test]
    fn cancel_wakes_infinite_wait() {
        let (_left, right) = UnixStream::pair().unwrap();
        let cancel = Arc::new(CancelSignal::new().unwrap());

        let waker = {
            let cancel = Arc::clone(&cancel);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.raise().unwrap();
            })
        };

        let outcome = wait_readable(right.as_fd(), &cancel, &Timeout::Infinite.deadline()).unwrap();
        assert_eq!(outcome, Readiness::Stopped);
        waker.join().unwrap();
    }

    #[test]
    fn cancel_takes_priority_over_data() {
        let (mut left, right) = UnixStream::pair().unwrap();
        let cancel = CancelSignal::new().unwrap();
        left.write_all(b"x").unwrap();
        cancel.raise().unwrap();

        let outcome = wait_readable(right.as_fd(), &cancel, &Timeout::Infinite.deadline()).unwrap();
        assert_eq!(outcome, Readiness::Stopped);
    }
}

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::fd::AsFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{PipeError, Result};
use crate::name::{euid, prepare_namespace_dir, Namespace, PipeName, Visibility};
use crate::state::{AtomicState, Role, State};
use crate::sys;
use crate::timeout::{Deadline, Timeout};
use crate::wait::{wait_readable, Readiness};

/// Connection attempts made by [`PipeHandle::open`] while the listener's
/// backlog is full.
const OPEN_ATTEMPTS: u32 = 5;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One end of a named pipe: a listener or a connected stream.
///
/// All operations take `&self`, so a handle can be shared through an `Arc`:
/// one thread may block in [`accept`](Self::accept) or [`read`](Self::read)
/// while another calls [`write`](Self::write) or [`stop`](Self::stop).
///
/// The OS endpoint is released exactly once, by the first [`close`](Self::close)
/// or on drop. Blocking calls hold a shared lock on the endpoint; `close` marks
/// the handle closed and wakes them before taking the endpoint out under the
/// exclusive lock, so the descriptor is never released underneath a waiter.
pub struct PipeHandle {
    name: PipeName,
    role: Role,
    state: AtomicState,
    endpoint: RwLock<Option<Endpoint>>,
    cancel: CancelSignal,
}

enum Endpoint {
    Listener(Binding),
    Stream(UnixStream),
}

/// A bound listener plus the filesystem artifacts that name it.
struct Binding {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
    // Dropped last so the socket file is gone before the name is released.
    _lock: File,
}

/// Which lifecycle states an operation may run in.
#[derive(Clone, Copy)]
enum Access {
    /// Suspension points: refused once `stop` was requested.
    Blocking,
    /// Prompt operations: allowed until `close`.
    Prompt,
}

impl PipeHandle {
    /// Create a listening pipe for `short` in the default namespace.
    pub fn create_named(short: &str, visibility: Visibility) -> Result<Self> {
        Self::create(&Namespace::from_env().resolve(short, visibility)?)
    }

    /// Connect to a listening pipe for `short` in the default namespace.
    pub fn open_named(short: &str, visibility: Visibility) -> Result<Self> {
        Self::open(&Namespace::from_env().resolve(short, visibility)?)
    }

    /// Bind a new listener under `name`.
    ///
    /// Fails with [`PipeError::Create`] if a live listener already holds the
    /// name. A socket file left behind by a dead listener is replaced.
    pub fn create(name: &PipeName) -> Result<Self> {
        let path = name.path();
        let create_err = |source: io::Error| PipeError::Create {
            path: path.to_path_buf(),
            source,
        };

        prepare_namespace_dir(name).map_err(create_err)?;

        let lock = open_lock_file(&name.lock_path(), name.visibility()).map_err(create_err)?;
        if !sys::try_lock_exclusive(&lock).map_err(create_err)? {
            return Err(create_err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "name is bound by a live listener",
            )));
        }

        remove_stale_socket(path).map_err(create_err)?;

        let listener = UnixListener::bind(path).map_err(create_err)?;
        let pending = PendingSocket::new(path);
        std::fs::set_permissions(
            path,
            std::fs::Permissions::from_mode(name.visibility().socket_mode()),
        )
        .map_err(create_err)?;
        listener.set_nonblocking(true).map_err(create_err)?;
        let meta = std::fs::symlink_metadata(path).map_err(create_err)?;
        pending.commit();

        info!(pipe = %name, visibility = %name.visibility(), "listening on named pipe");

        let binding = Binding {
            listener,
            path: path.to_path_buf(),
            created_inode: (meta.dev(), meta.ino()),
            _lock: lock,
        };
        Self::from_endpoint(name.clone(), Role::Listener, Endpoint::Listener(binding))
    }

    /// Connect to the listener bound under `name`.
    ///
    /// Fails with [`PipeError::Open`] if nobody is listening.
    pub fn open(name: &PipeName) -> Result<Self> {
        let path = name.path();
        let mut attempt = 0;
        let stream = loop {
            attempt += 1;
            match UnixStream::connect(path) {
                Ok(stream) => break stream,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock && attempt < OPEN_ATTEMPTS => {
                    debug!(pipe = %name, attempt, "listener busy, retrying");
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
                Err(source) => {
                    return Err(PipeError::Open {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        };
        sys::disable_sigpipe(stream.as_fd()).map_err(|source| PipeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(pipe = %name, "connected to named pipe");
        Self::from_endpoint(name.clone(), Role::Connected, Endpoint::Stream(stream))
    }

    fn from_endpoint(name: PipeName, role: Role, endpoint: Endpoint) -> Result<Self> {
        Ok(Self {
            name,
            role,
            state: AtomicState::open(role),
            endpoint: RwLock::new(Some(endpoint)),
            cancel: CancelSignal::new()?,
        })
    }

    /// Wait for the next connection on a listener.
    ///
    /// The returned handle is `Connected` and carries the listener's name; the
    /// listener stays usable for further accepts, including after a timeout.
    pub fn accept(&self, timeout: Timeout) -> Result<PipeHandle> {
        let deadline = timeout.deadline();
        let guard = self.endpoint(Access::Blocking)?;
        let binding = match guard.as_ref() {
            Some(Endpoint::Listener(binding)) => binding,
            Some(Endpoint::Stream(_)) => return Err(self.wrong_role("accept")),
            None => return Err(PipeError::Closed),
        };

        loop {
            self.wait(binding.listener.as_fd(), &deadline)?;
            let stream = match binding.listener.accept() {
                Ok((stream, _addr)) => stream,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                            | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(PipeError::Io(err)),
            };

            // Accepted sockets may inherit O_NONBLOCK from the listener.
            stream.set_nonblocking(false)?;
            if !self.admit_peer(&stream) {
                continue;
            }
            sys::disable_sigpipe(stream.as_fd())?;

            debug!(pipe = %self.name, "accepted connection");
            return Self::from_endpoint(self.name.clone(), Role::Connected, Endpoint::Stream(stream));
        }
    }

    /// Read whatever is available, up to `buf.len()` bytes.
    ///
    /// Waits for data according to `timeout`. A closed peer is reported as
    /// [`PipeError::Disconnected`], never as `Ok(0)`; an empty `buf` returns
    /// `Ok(0)` without waiting.
    pub fn read(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        let deadline = timeout.deadline();
        let guard = self.endpoint(Access::Blocking)?;
        let stream = self.stream(&guard, "read")?;
        if buf.is_empty() {
            return Ok(0);
        }
        self.read_some(stream, buf, &deadline)
    }

    /// Fill `buf` completely, within one deadline for the whole call.
    ///
    /// On timeout, stop, or disconnect the call fails as a whole. Bytes
    /// consumed before the failure are left in the front of `buf` but are not
    /// replayed: the stream has moved past them and is no longer aligned to
    /// the caller's message boundaries.
    pub fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> Result<()> {
        let deadline = timeout.deadline();
        let guard = self.endpoint(Access::Blocking)?;
        let stream = self.stream(&guard, "read")?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.read_some(stream, &mut buf[filled..], &deadline) {
                Ok(n) => filled += n,
                Err(err) => {
                    if filled > 0 {
                        debug!(
                            pipe = %self.name,
                            consumed = filled,
                            expected = buf.len(),
                            error = %err,
                            "exact read failed part-way"
                        );
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Write all of `buf`. Not subject to a timeout.
    pub fn write(&self, buf: &[u8]) -> Result<()> {
        let guard = self.endpoint(Access::Prompt)?;
        let stream = self.stream(&guard, "write")?;
        sys::send_all(stream.as_fd(), buf).map_err(|err| {
            // `close` shuts the socket down under a blocked writer.
            if self.is_closed() {
                return PipeError::Closed;
            }
            match err.kind() {
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                    PipeError::Disconnected
                }
                _ => PipeError::Io(err),
            }
        })
    }

    /// Make any blocked or future `accept`/`read`/`read_exact` on this handle
    /// return [`PipeError::Stopped`].
    ///
    /// Does not release the endpoint; `close` is still required. Repeated
    /// calls succeed, but a closed handle fails with [`PipeError::Closed`].
    pub fn stop(&self) -> Result<()> {
        match self.state.begin_stop() {
            Ok(()) => {}
            Err(State::Closed) => return Err(PipeError::Closed),
            Err(_) => return Ok(()),
        }
        self.cancel.raise()?;
        debug!(pipe = %self.name, role = %self.role, "stop requested");
        Ok(())
    }

    /// Release the endpoint. Idempotent and safe after `stop`.
    pub fn close(&self) -> Result<()> {
        if self.state.close() == State::Closed {
            return Ok(());
        }

        if let Err(err) = self.cancel.raise() {
            warn!(pipe = %self.name, error = %err, "failed to wake waiters on close");
        }
        if let Some(Endpoint::Stream(stream)) = self.read_lock().as_ref() {
            // Unblocks a writer stuck on a full socket buffer.
            let _ = stream.shutdown(Shutdown::Both);
        }

        let endpoint = self
            .endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match endpoint {
            Some(Endpoint::Listener(_)) => info!(pipe = %self.name, "closed listener"),
            Some(Endpoint::Stream(_)) => debug!(pipe = %self.name, "closed connection"),
            None => {}
        }
        Ok(())
    }

    pub fn name(&self) -> &PipeName {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> State {
        self.state.load()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    /// Credentials of the connected peer as `(uid, gid, pid)`.
    ///
    /// Returns `None` for listeners, closed handles, and on platforms without
    /// `SO_PEERCRED`.
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        match self.read_lock().as_ref() {
            Some(Endpoint::Stream(stream)) => sys::peer_credentials(stream.as_fd()),
            _ => None,
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Option<Endpoint>> {
        self.endpoint.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, access: Access) -> Result<RwLockReadGuard<'_, Option<Endpoint>>> {
        match (self.state(), access) {
            (State::Closed, _) => return Err(PipeError::Closed),
            (State::Stopping, Access::Blocking) => return Err(PipeError::Stopped),
            _ => {}
        }
        let guard = self.read_lock();
        if guard.is_none() {
            return Err(PipeError::Closed);
        }
        Ok(guard)
    }

    fn stream<'a>(
        &self,
        guard: &'a RwLockReadGuard<'_, Option<Endpoint>>,
        op: &'static str,
    ) -> Result<&'a UnixStream> {
        match guard.as_ref() {
            Some(Endpoint::Stream(stream)) => Ok(stream),
            Some(Endpoint::Listener(_)) => Err(self.wrong_role(op)),
            None => Err(PipeError::Closed),
        }
    }

    fn wrong_role(&self, op: &'static str) -> PipeError {
        PipeError::WrongRole {
            op,
            role: self.role,
        }
    }

    fn wait(&self, fd: std::os::fd::BorrowedFd<'_>, deadline: &Deadline) -> Result<()> {
        match wait_readable(fd, &self.cancel, deadline)? {
            Readiness::Ready => Ok(()),
            Readiness::TimedOut => Err(PipeError::TimedOut(deadline.timeout())),
            Readiness::Stopped if self.is_closed() => Err(PipeError::Closed),
            Readiness::Stopped => Err(PipeError::Stopped),
        }
    }

    fn read_some(&self, stream: &UnixStream, buf: &mut [u8], deadline: &Deadline) -> Result<usize> {
        loop {
            self.wait(stream.as_fd(), deadline)?;
            let mut reader = stream;
            match reader.read(buf) {
                Ok(0) => return Err(PipeError::Disconnected),
                Ok(n) => return Ok(n),
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue
                }
                Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {
                    return Err(PipeError::Disconnected)
                }
                Err(err) => return Err(PipeError::Io(err)),
            }
        }
    }

    /// Private pipes only admit peers running as the listener's user.
    fn admit_peer(&self, stream: &UnixStream) -> bool {
        if self.name.visibility() != Visibility::Private {
            return true;
        }
        match sys::peer_credentials(stream.as_fd()) {
            Some((uid, _gid, pid)) if uid != euid() => {
                warn!(pipe = %self.name, peer_uid = uid, peer_pid = pid, "rejecting peer from another user");
                false
            }
            _ => true,
        }
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        let (expected_dev, expected_ino) = self.created_inode;
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "removing pipe socket");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "pipe path identity changed; skipping cleanup");
            }
        }
    }
}

impl std::fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeHandle")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

/// Removes a freshly bound socket file unless [`commit`](Self::commit) runs.
struct PendingSocket<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> PendingSocket<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    /// Hand ownership of the socket file to the [`Binding`].
    fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSocket<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(path = ?self.path, "removing socket from failed bind");
            let _ = std::fs::remove_file(self.path);
        }
    }
}

/// Open (creating if needed) the lock file guarding a pipe name.
///
/// Existing lock files are opened read-only: `flock` does not need write access
/// and shared lock files may belong to another user.
fn open_lock_file(path: &Path, visibility: Visibility) -> io::Result<File> {
    match File::open(path) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .mode(visibility.socket_mode())
                .open(path)?;
            file.set_permissions(std::fs::Permissions::from_mode(visibility.socket_mode()))?;
            Ok(file)
        }
        Err(err) => Err(err),
    }
}

/// Remove a socket file left by a listener that no longer holds the lock.
/// Never removes anything that is not a socket.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        ));
    }
    debug!(?path, "removing stale pipe socket");
    std::fs::remove_file(path)
}

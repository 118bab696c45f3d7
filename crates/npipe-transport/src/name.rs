//! Short name + visibility → fully-qualified pipe name.
//!
//! Pipes live as Unix domain sockets inside a namespace directory under a
//! common root:
//!
//! ```text
//! <root>/npipe-<euid>/<name>     private: 0700 dir, 0600 socket
//! <root>/npipe-shared/<name>     shared:  1777 dir, 0666 socket
//! ```
//!
//! Embedding the effective uid keeps private pipes of different users apart;
//! shared pipes with the same short name always meet at the same path.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PipeError, Result};

/// Environment variable overriding the namespace root.
pub const RUNTIME_DIR_ENV: &str = "NPIPE_RUNTIME_DIR";

/// Namespace root used when no override is configured.
pub const DEFAULT_RUNTIME_ROOT: &str = "/tmp";

const PRIVATE_DIR_PREFIX: &str = "npipe-";
const SHARED_DIR: &str = "npipe-shared";
const LOCK_SUFFIX: &str = ".lock";

/// Who may discover and open a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Scoped to the current user.
    Private,
    /// Visible to every user on the host, subject to file permissions.
    Shared,
}

impl Visibility {
    /// `true` maps to `Private`, as taken by the C ABI's `private_pipe` argument.
    pub fn from_private_flag(private: bool) -> Self {
        if private {
            Visibility::Private
        } else {
            Visibility::Shared
        }
    }

    #[cfg(unix)]
    pub(crate) fn dir_mode(self) -> u32 {
        match self {
            Visibility::Private => 0o700,
            Visibility::Shared => 0o1777,
        }
    }

    #[cfg(unix)]
    pub(crate) fn socket_mode(self) -> u32 {
        match self {
            Visibility::Private => 0o600,
            Visibility::Shared => 0o666,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => f.write_str("private"),
            Visibility::Shared => f.write_str("shared"),
        }
    }
}

/// A resolved, fully-qualified pipe name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeName {
    short: String,
    visibility: Visibility,
    path: PathBuf,
}

impl PipeName {
    pub fn short_name(&self) -> &str {
        &self.short
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Socket path of the pipe.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding this pipe and its siblings.
    pub fn namespace_dir(&self) -> &Path {
        // Resolved paths always have a namespace directory component.
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Sidecar file whose `flock` marks a live listener.
    pub(crate) fn lock_path(&self) -> PathBuf {
        self.namespace_dir()
            .join(format!(".{}{LOCK_SUFFIX}", self.short))
    }
}

impl fmt::Display for PipeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Root under which pipe namespaces are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: PathBuf,
}

impl Namespace {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    pub const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    pub const MAX_PATH_LEN: usize = 104;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `NPIPE_RUNTIME_DIR`, or `/tmp`.
    pub fn from_env() -> Self {
        match std::env::var_os(RUNTIME_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(DEFAULT_RUNTIME_ROOT),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a short name for the given visibility.
    pub fn resolve(&self, short: &str, visibility: Visibility) -> Result<PipeName> {
        validate_short_name(short)?;

        let dir = match visibility {
            Visibility::Private => format!("{PRIVATE_DIR_PREFIX}{}", current_uid()?),
            Visibility::Shared => SHARED_DIR.to_string(),
        };
        let path = self.root.join(dir).join(short);

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(PipeError::NameTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        Ok(PipeName {
            short: short.to_string(),
            visibility,
            path,
        })
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::from_env()
    }
}

fn validate_short_name(short: &str) -> Result<()> {
    let invalid = |reason| {
        Err(PipeError::InvalidName {
            name: short.to_string(),
            reason,
        })
    };

    if short.is_empty() {
        return invalid("name is empty");
    }
    // Leading dots are reserved for lock files and `.`/`..`.
    if short.starts_with('.') {
        return invalid("name must not start with '.'");
    }
    if short.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return invalid("name contains a reserved character");
    }
    Ok(())
}

/// Effective uid of the calling process.
#[cfg(unix)]
pub fn current_uid() -> Result<u32> {
    Ok(euid())
}

#[cfg(unix)]
pub(crate) fn euid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
pub fn current_uid() -> Result<u32> {
    Err(PipeError::Identity(
        "per-user namespaces require a Unix effective uid".to_string(),
    ))
}

/// Create the namespace directory for `name` if needed and check it is safe to
/// bind into.
#[cfg(unix)]
pub(crate) fn prepare_namespace_dir(name: &PipeName) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};

    let dir = name.namespace_dir();
    let mode = name.visibility().dir_mode();

    if let Some(root) = dir.parent() {
        std::fs::create_dir_all(root)?;
    }
    match std::fs::DirBuilder::new().mode(mode).create(dir) {
        Ok(()) => {
            // Creation mode is filtered by the umask; shared dirs must stay open.
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(mode))?;
            tracing::debug!(dir = %dir.display(), "created pipe namespace");
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(err) => return Err(err),
    }

    let meta = std::fs::symlink_metadata(dir)?;
    if !meta.file_type().is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "namespace path exists and is not a directory",
        ));
    }

    if name.visibility() == Visibility::Private {
        if meta.uid() != euid() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "private namespace directory is owned by another user",
            ));
        }
        if meta.mode() & 0o077 != 0 {
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

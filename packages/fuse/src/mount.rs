//! Mount point management.

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use fuser::{BackgroundSession, MountOption};
use thiserror::Error;
use tracing::{debug, info, warn};

use httpfs_http::RemoteFs;

use crate::adapter::{HttpFsAdapter, Owner};
use crate::worker::DEFAULT_WORKERS;

/// Filesystem name shown in the mount table.
pub const FS_NAME: &str = "httpfs";

/// Setuid helpers that unmount FUSE filesystems for unprivileged users.
const FUSERMOUNT: [&str; 2] = ["fusermount3", "fusermount"];

#[derive(Error, Debug)]
pub enum MountError {
    #[error("failed to prepare mount point {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to mount {path}: {source}")]
    Mount {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to unmount {path}: {source}")]
    Unmount {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is already mounted")]
    AlreadyMounted { path: PathBuf },
}

/// The three steps the orchestrator drives a mount through.
///
/// `unmount` may be called whether or not `mount` succeeded, and more than
/// once; implementations treat "not mounted" as success.
pub trait Mounter: Send + Sync {
    /// Clear a stale mount and make sure the directory exists.
    fn prepare(&self) -> Result<(), MountError>;

    /// Attach the filesystem. Returns once the kernel serves the mount.
    fn mount(&self) -> Result<(), MountError>;

    /// Detach the filesystem. On failure the mount stays attached and the
    /// call may be repeated.
    fn unmount(&self) -> Result<(), MountError>;
}

/// A live mount.
trait Attachment: Send {
    /// Ask the kernel to drop the mount. Fails while it is busy.
    fn detach(&self) -> io::Result<()>;

    /// Wait for the session to wind down after a successful detach.
    fn finish(self: Box<Self>);
}

struct Session {
    path: PathBuf,
    background: BackgroundSession,
}

impl Attachment for Session {
    fn detach(&self) -> io::Result<()> {
        detach(&self.path)
    }

    fn finish(self: Box<Self>) {
        let Session { path, background } = *self;
        // The kernel connection is gone, so the loop ends on its next read.
        match background.guard.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(path = %path.display(), %err, "session ended with error"),
            Err(_) => warn!(path = %path.display(), "session thread panicked"),
        }
    }
}

/// Read-only FUSE mount of a [`RemoteFs`] at a fixed directory.
pub struct FuseMount {
    path: PathBuf,
    fs: Arc<dyn RemoteFs>,
    owner: Owner,
    session: Mutex<Option<Box<dyn Attachment>>>,
}

impl FuseMount {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn RemoteFs>) -> Self {
        Self {
            path: path.into(),
            fs,
            owner: Owner::current(),
            session: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a session started by [`Mounter::mount`] is still attached.
    pub fn is_mounted(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn options() -> Vec<MountOption> {
        vec![MountOption::RO, MountOption::FSName(FS_NAME.to_string())]
    }

    #[cfg(test)]
    fn attach(&self, attachment: Box<dyn Attachment>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(attachment);
    }
}

/// Best-effort `umount`; output and exit status are ignored.
fn force_unmount(path: &Path) {
    let status = Command::new("umount")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    debug!(path = %path.display(), ?status, "umount");
}

/// Unmount `path`, leaving it mounted if it is in use.
///
/// Tries umount(2) first. Unprivileged users get EPERM there and go through
/// the fusermount helper instead.
fn detach(path: &Path) -> io::Result<()> {
    let target = CString::new(path.as_os_str().as_bytes())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    if unsafe { libc::umount(target.as_ptr()) } == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EPERM) {
        return Err(err);
    }

    let mut missing = None;
    for helper in FUSERMOUNT {
        let output = Command::new(helper)
            .arg("-u")
            .arg("--")
            .arg(path)
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                return Err(io::Error::other(format!(
                    "{} -u: {}",
                    helper,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => missing = Some(err),
            Err(err) => return Err(err),
        }
    }
    Err(missing.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
}

impl Mounter for FuseMount {
    fn prepare(&self) -> Result<(), MountError> {
        force_unmount(&self.path);
        fs::create_dir_all(&self.path).map_err(|source| MountError::Prepare {
            path: self.path.clone(),
            source,
        })
    }

    fn mount(&self) -> Result<(), MountError> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.is_some() {
            return Err(MountError::AlreadyMounted {
                path: self.path.clone(),
            });
        }

        let mount_error = |source: io::Error| MountError::Mount {
            path: self.path.clone(),
            source,
        };
        let adapter = HttpFsAdapter::new(Arc::clone(&self.fs), self.owner, DEFAULT_WORKERS)
            .map_err(mount_error)?;
        let background =
            fuser::spawn_mount2(adapter, &self.path, &Self::options()).map_err(mount_error)?;

        info!(path = %self.path.display(), "mounted");
        *session = Some(Box::new(Session {
            path: self.path.clone(),
            background,
        }));
        Ok(())
    }

    fn unmount(&self) -> Result<(), MountError> {
        let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(attachment) = slot.take() else {
            drop(slot);
            force_unmount(&self.path);
            return Ok(());
        };

        if let Err(source) = attachment.detach() {
            *slot = Some(attachment);
            return Err(MountError::Unmount {
                path: self.path.clone(),
                source,
            });
        }
        drop(slot);

        attachment.finish();
        info!(path = %self.path.display(), "unmounted");
        Ok(())
    }
}

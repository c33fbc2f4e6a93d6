//! Client errors to POSIX error numbers.

use libc::c_int;
use tracing::{debug, warn};

use httpfs_http::Error;

/// Map a client error to the errno handed back to the kernel.
///
/// `NotFound` is routine (every negative lookup produces one) and logged at
/// debug; everything else is logged at warn.
pub fn errno(err: &Error) -> c_int {
    let code = match err {
        Error::NotFound { .. } => libc::ENOENT,
        Error::PermissionDenied { .. } => libc::EPERM,
        Error::AlreadyExists { .. } => libc::EEXIST,
        Error::Invalid { .. } => libc::EINVAL,
        Error::Transport { .. } => libc::EIO,
    };

    if code == libc::ENOENT {
        debug!(error = %err, "remote entry missing");
    } else {
        warn!(error = %err, errno = code, "remote operation failed");
    }

    code
}

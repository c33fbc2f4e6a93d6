//! # httpfs
//!
//! Runs a backend that serves the httpfs v1 protocol and mounts its tree.
//!
//! The lifecycle of one run:
//!
//! 1. pick a free local port and start the backend in its own process
//!    group with `PORT` set
//! 2. poll `stat(".")` until the backend answers (see [`ReadinessPolicy`])
//! 3. clear any stale mount, mount the tree read-only
//! 4. relay signals to the backend until it exits; SIGINT unmounts and
//!    terminates the backend's group instead
//! 5. unmount and exit with the backend's status
//!
//! The mount is always released before the backend is signalled, since
//! filesystem calls against a dead backend would hang.

pub mod args;
pub mod backend;
pub mod error;
pub mod port;
pub mod readiness;
pub mod signals;
pub mod teardown;

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Arc;

use tracing::info;

use httpfs_fuse::{FuseMount, Mounter};
use httpfs_http::{HttpFs, RemoteFs};

pub use args::Args;
pub use backend::{Backend, ProcessGroup, Terminate};
pub use error::Error;
pub use readiness::{wait_ready, ReadinessPolicy};
pub use signals::Forwarder;
pub use teardown::Teardown;

/// Exit status reported when SIGINT ended the run.
pub const INTERRUPTED_EXIT: i32 = 130;

/// Run the backend named in `args` with a FUSE mount at `args.mount`.
///
/// Returns the process exit status.
pub fn run(args: &Args) -> Result<i32, Error> {
    let mount_path = args.mount.clone();
    supervise(args, &ReadinessPolicy::default(), move |fs| {
        Arc::new(FuseMount::new(mount_path, fs)) as Arc<dyn Mounter>
    })
}

/// [`run`] with the readiness policy and the mount supplied by the caller.
pub fn supervise<M>(args: &Args, policy: &ReadinessPolicy, make_mount: M) -> Result<i32, Error>
where
    M: FnOnce(Arc<dyn RemoteFs>) -> Arc<dyn Mounter>,
{
    let port = port::unused_port().map_err(Error::Port)?;
    let client = HttpFs::for_port(port).map_err(Error::Client)?;
    info!(url = %client.base_url(), "backend address");
    let fs: Arc<dyn RemoteFs> = Arc::new(client);

    let mut backend = Backend::spawn(&args.command, port)?;
    let mounter = make_mount(Arc::clone(&fs));
    let teardown = Arc::new(Teardown::new(Arc::clone(&mounter), backend.group()));

    if let Err(err) = wait_ready(fs.as_ref(), policy) {
        teardown.shutdown();
        return Err(err);
    }

    let mounted = mounter
        .prepare()
        .map_err(Error::Prepare)
        .and_then(|()| mounter.mount().map_err(Error::Mount));
    if let Err(err) = mounted {
        teardown.all();
        return Err(err);
    }
    info!(path = %args.mount.display(), "serving");

    let forwarder = match Forwarder::install(Arc::clone(&teardown), backend.group()) {
        Ok(forwarder) => forwarder,
        Err(err) => {
            teardown.all();
            return Err(err);
        }
    };

    let status = backend.wait();
    let interrupted = forwarder.close();
    teardown.unmount();

    exit_code(status.map_err(Error::Wait)?, interrupted)
}

/// Map the backend's exit to ours.
///
/// A normal exit passes its code through. Death by signal is an error,
/// unless we sent it ourselves in response to SIGINT.
pub fn exit_code(status: ExitStatus, interrupted: bool) -> Result<i32, Error> {
    if let Some(code) = status.code() {
        return Ok(code);
    }
    if interrupted {
        return Ok(INTERRUPTED_EXIT);
    }

    Err(Error::Terminated {
        signal: status.signal().unwrap_or_default(),
    })
}

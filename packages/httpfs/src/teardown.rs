//! Unmount and shutdown, each at most once.
//!
//! Both the signal thread and the main thread may tear down; whichever
//! arrives second waits for the first to finish and then does nothing.

use std::sync::{Arc, Once};

use tracing::warn;

use httpfs_fuse::Mounter;

use crate::backend::Terminate;

pub struct Teardown {
    mounter: Arc<dyn Mounter>,
    backend: Arc<dyn Terminate>,
    unmounted: Once,
    shut_down: Once,
}

impl Teardown {
    pub fn new(mounter: Arc<dyn Mounter>, backend: Arc<dyn Terminate>) -> Self {
        Self {
            mounter,
            backend,
            unmounted: Once::new(),
            shut_down: Once::new(),
        }
    }

    /// Detach the mount. Failure is logged and otherwise ignored.
    pub fn unmount(&self) {
        self.unmounted.call_once(|| {
            if let Err(err) = self.mounter.unmount() {
                warn!(error = %err, "unable to unmount");
            }
        });
    }

    /// Terminate the backend's process group. Failure is logged and
    /// otherwise ignored.
    pub fn shutdown(&self) {
        self.shut_down.call_once(|| {
            if let Err(err) = self.backend.terminate() {
                warn!(error = %err, "unable to terminate backend");
            }
        });
    }

    /// Unmount, then shut down. The mount is always released before the
    /// backend it depends on goes away.
    pub fn all(&self) {
        self.unmount();
        self.shutdown();
    }
}

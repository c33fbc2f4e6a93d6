//! Signal handling while the backend runs.
//!
//! SIGINT tears the mount and the backend down. The other handled signals
//! are passed on to the backend leader, not its whole group. The backend
//! runs in its own group, so terminal job control (SIGTSTP and friends)
//! only reaches it through here. SIGCHLD and SIGPIPE stay with us: one
//! reports on our own child, the other on our own broken pipes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use libc::c_int;
use signal_hook::consts::signal::{
    SIGALRM, SIGCONT, SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGTSTP, SIGTTIN, SIGTTOU, SIGUSR1,
    SIGUSR2, SIGWINCH,
};
use signal_hook::iterator::{Handle, Signals};
use tracing::{info, warn};

use crate::backend::ProcessGroup;
use crate::error::Error;
use crate::teardown::Teardown;

/// Signals relayed to the backend unchanged.
pub const FORWARDED: &[c_int] = &[
    SIGTERM, SIGHUP, SIGQUIT, SIGUSR1, SIGUSR2, SIGWINCH, SIGALRM, SIGCONT, SIGTSTP, SIGTTIN,
    SIGTTOU,
];

/// Background thread owning the process's signal dispositions.
pub struct Forwarder {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
    interrupted: Arc<AtomicBool>,
}

impl Forwarder {
    pub fn install(teardown: Arc<Teardown>, group: Arc<ProcessGroup>) -> Result<Self, Error> {
        let mut wanted = vec![SIGINT];
        wanted.extend_from_slice(FORWARDED);

        let mut signals = Signals::new(&wanted).map_err(Error::Signals)?;
        let handle = signals.handle();
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);

        let thread = thread::Builder::new()
            .name("httpfs-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if signal == SIGINT {
                        info!("interrupted, unmounting");
                        flag.store(true, Ordering::SeqCst);
                        teardown.all();
                        // Keep draining until close(): dropping the iterator
                        // closes the pipe close() writes to.
                        continue;
                    }
                    if let Err(err) = group.forward(signal) {
                        warn!(signal, error = %err, "unable to forward signal");
                    }
                }
            })
            .map_err(Error::Signals)?;

        Ok(Self {
            handle,
            thread: Some(thread),
            interrupted,
        })
    }

    /// Whether SIGINT has been received.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Stop the thread, waiting for a teardown in progress to finish.
    /// Returns whether the run was interrupted.
    pub fn close(mut self) -> bool {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("signal thread panicked");
            }
        }
        self.interrupted()
    }
}

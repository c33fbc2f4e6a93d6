//! Waiting for the backend to answer.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use httpfs_http::RemoteFs;

use crate::error::Error;

/// How long and how often to probe a starting backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(500),
        }
    }
}

/// Probe `stat(".")` until it succeeds or the policy's timeout passes.
///
/// Returns how long it took. The last probe error is carried in
/// [`Error::NotReady`].
pub fn wait_ready(fs: &dyn RemoteFs, policy: &ReadinessPolicy) -> Result<Duration, Error> {
    let started = Instant::now();

    loop {
        match fs.stat(".") {
            Ok(_) => {
                let waited = started.elapsed();
                info!(?waited, "backend ready");
                return Ok(waited);
            }
            Err(source) => {
                let waited = started.elapsed();
                if waited >= policy.timeout {
                    return Err(Error::NotReady { waited, source });
                }
                debug!(error = %source, "backend not ready yet");
                thread::sleep(policy.interval.min(policy.timeout - waited));
            }
        }
    }
}

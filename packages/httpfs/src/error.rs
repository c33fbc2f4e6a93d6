use std::io;
use std::time::Duration;

use httpfs_fuse::MountError;

/// Fatal orchestrator errors. Each one ends the run with status 1.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to find unused port: {0}")]
    Port(#[source] io::Error),

    #[error("unable to build client: {0}")]
    Client(#[source] httpfs_http::Error),

    #[error("unable to start backend {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("backend not reachable after {waited:?}: {source}")]
    NotReady {
        waited: Duration,
        #[source]
        source: httpfs_http::Error,
    },

    #[error("mount preparation failed: {0}")]
    Prepare(#[source] MountError),

    #[error("unable to mount: {0}")]
    Mount(#[source] MountError),

    #[error("error waiting for backend: {0}")]
    Wait(#[source] io::Error),

    #[error("unable to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error("backend terminated by signal {signal}")]
    Terminated { signal: i32 },
}

//! The supervised backend process.

use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libc::c_int;
use tracing::{debug, info};

use crate::error::Error;

/// Environment variable telling the backend which port to serve on.
pub const PORT_ENV: &str = "PORT";

/// Something that can stop the backend and everything it started.
pub trait Terminate: Send + Sync {
    fn terminate(&self) -> io::Result<()>;
}

/// Process group led by the backend; the group id equals the leader's pid.
#[derive(Debug)]
pub struct ProcessGroup {
    pid: i32,
    reaped: AtomicBool,
}

impl ProcessGroup {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::SeqCst)
    }

    fn mark_reaped(&self) {
        self.reaped.store(true, Ordering::SeqCst);
    }

    /// Send `signal` to the leader only. A no-op once the leader has been
    /// reaped, since its pid may already belong to another process.
    pub fn forward(&self, signal: c_int) -> io::Result<()> {
        if self.is_reaped() {
            debug!(signal, "backend gone, not forwarding");
            return Ok(());
        }
        debug!(signal, pid = self.pid, "forwarding signal");
        check(unsafe { libc::kill(self.pid, signal) })
    }
}

impl Terminate for ProcessGroup {
    /// SIGTERM to the whole group. A group with no members left is not an
    /// error.
    fn terminate(&self) -> io::Result<()> {
        info!(pgid = self.pid, "terminating backend process group");
        match check(unsafe { libc::killpg(self.pid, libc::SIGTERM) }) {
            Err(err) if err.raw_os_error() == Some(libc::ESRCH) => Ok(()),
            other => other,
        }
    }
}

fn check(ret: c_int) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// A running backend in its own process group.
pub struct Backend {
    child: Child,
    group: Arc<ProcessGroup>,
}

impl Backend {
    /// Start `command` with `PORT=<port>`, inheriting stdout and stderr.
    pub fn spawn(command: &[OsString], port: u16) -> Result<Self, Error> {
        let command_line = command
            .iter()
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        let (program, args) = command.split_first().ok_or_else(|| Error::Spawn {
            command: command_line.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let child = Command::new(program)
            .args(args)
            .env(PORT_ENV, port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let pid = child.id() as i32;
        info!(pid, port, command = %command_line, "backend started");

        Ok(Self {
            child,
            group: Arc::new(ProcessGroup {
                pid,
                reaped: AtomicBool::new(false),
            }),
        })
    }

    pub fn group(&self) -> Arc<ProcessGroup> {
        Arc::clone(&self.group)
    }

    /// Block until the backend exits and reap it.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.group.mark_reaped();
        info!(%status, "backend exited");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::process::ExitStatusExt;

    use super::*;

    fn sh(script: &str, extra: &[&str]) -> Vec<OsString> {
        let mut command: Vec<OsString> = vec!["sh".into(), "-c".into(), script.into(), "sh".into()];
        command.extend(extra.iter().map(OsString::from));
        command
    }

    #[test]
    fn port_is_passed_in_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("port");

        let mut backend =
            Backend::spawn(&sh(r#"echo "$PORT" > "$1""#, &[marker.to_str().unwrap()]), 4321)
                .unwrap();
        assert!(backend.wait().unwrap().success());

        assert_eq!(fs::read_to_string(&marker).unwrap().trim(), "4321");
    }

    #[test]
    fn backend_leads_its_own_group() {
        let mut backend = Backend::spawn(&sh("sleep 5", &[]), 1).unwrap();
        let pid = backend.group().pid();

        assert_eq!(unsafe { libc::getpgid(pid) }, pid);
        assert_ne!(unsafe { libc::getpgid(0) }, pid);

        backend.group().terminate().unwrap();
        let status = backend.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn terminate_reaches_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("child");

        // The grandchild records its pid, then the leader waits on it.
        let mut backend = Backend::spawn(
            &sh(r#"sleep 30 & echo $! > "$1"; wait"#, &[marker.to_str().unwrap()]),
            1,
        )
        .unwrap();

        let mut grandchild = None;
        for _ in 0..50 {
            if let Ok(text) = fs::read_to_string(&marker) {
                if let Ok(pid) = text.trim().parse::<i32>() {
                    grandchild = Some(pid);
                    break;
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        let grandchild = grandchild.unwrap();

        backend.group().terminate().unwrap();
        backend.wait().unwrap();

        let mut gone = false;
        for _ in 0..50 {
            if !alive(grandchild) {
                gone = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        assert!(gone);
    }

    /// Running and not a zombie; the orphan may never be reaped in a container.
    fn alive(pid: i32) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z'),
            Err(_) => false,
        }
    }

    #[test]
    fn exit_code_is_reported() {
        let mut backend = Backend::spawn(&sh("exit 3", &[]), 1).unwrap();
        assert_eq!(backend.wait().unwrap().code(), Some(3));
    }

    #[test]
    fn terminate_after_exit_is_ok() {
        let mut backend = Backend::spawn(&sh("exit 0", &[]), 1).unwrap();
        backend.wait().unwrap();
        backend.group().terminate().unwrap();
    }

    #[test]
    fn no_forwarding_after_reap() {
        let mut backend = Backend::spawn(&sh("exit 0", &[]), 1).unwrap();
        let group = backend.group();
        assert!(!group.is_reaped());

        backend.wait().unwrap();
        assert!(group.is_reaped());
        group.forward(libc::SIGUSR1).unwrap();
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let command = vec![OsString::from("/nonexistent/httpfs-backend")];
        assert!(matches!(
            Backend::spawn(&command, 1),
            Err(Error::Spawn { .. })
        ));
    }

    #[test]
    fn empty_command_fails_to_spawn() {
        assert!(matches!(Backend::spawn(&[], 1), Err(Error::Spawn { .. })));
    }
}

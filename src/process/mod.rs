//! Splitting the program into a collector and a consumer process.
//!
//! The two share nothing but the sink path. The collector is the forked
//! child; the parent consumes. Both react to SIGINT, SIGTERM and SIGHUP
//! through their own [`ShutdownFlag`]. The consumer also stops when the
//! collector exits, and on its way out interrupts the collector and waits
//! for it, so neither side outlives the other.


mod collector;
mod consumer;
mod shutdown;

use std::io;
use std::thread;
use std::time::{Duration, Instant};

pub use collector::*;
pub use consumer::*;
use log::{debug, warn};
pub use shutdown::*;

use crate::error::{Error, Result};
use crate::ffi::syscall;

/// Which side of the fork this process is on.
pub enum Role {
    Collector,
    Consumer(CollectorProcess),
}

/// Fork the collector.
///
/// Must run before any thread is spawned or signal handler installed.
/// In the child the collector is bound to the parent's lifetime: it gets
/// SIGTERM if the parent dies. A child whose parent is already gone by the
/// time the binding is in place fails with [`Error::Process`].
pub fn fork() -> Result<Role> {
    let parent = syscall::getpid();
    match syscall::fork().map_err(Error::Process)? {
        0 => {
            syscall::set_parent_death_signal(libc::SIGTERM).map_err(Error::Process)?;
            if orphaned(parent) {
                return Err(Error::Process(io::Error::other(format!(
                    "parent {} exited before the collector started",
                    parent
                ))));
            }
            Ok(Role::Collector)
        }
        pid => Ok(Role::Consumer(CollectorProcess { pid, code: None })),
    }
}

/// The forked collector, seen from the parent.
///
/// Dropping it interrupts the collector and reaps it.
pub struct CollectorProcess {
    pid: i32,
    code: Option<i32>,
}

impl CollectorProcess {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Exit code if the collector has terminated.
    pub fn try_wait(&mut self) -> Result<Option<i32>> {
        if self.code.is_none() {
            let status = syscall::waitpid(self.pid, true).map_err(Error::Process)?;
            self.code = status.map(exit_code);
        }
        Ok(self.code)
    }

    /// SIGINT, then SIGKILL if the collector is still alive after `grace`.
    /// Returns its exit code.
    pub fn stop(&mut self, grace: Duration) -> Result<i32> {
        if let Some(code) = self.try_wait()? {
            return Ok(code);
        }

        debug!("Interrupting collector {}", self.pid);
        // It may have exited since `try_wait`, it is not reaped yet so the
        // pid is still ours.
        syscall::kill(self.pid, libc::SIGINT).map_err(Error::Process)?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(code) = self.try_wait()? {
                return Ok(code);
            }
            thread::sleep(Duration::from_millis(10));
        }

        warn!("Collector {} ignored SIGINT, killing it", self.pid);
        syscall::kill(self.pid, libc::SIGKILL).map_err(Error::Process)?;
        let status = syscall::waitpid(self.pid, false).map_err(Error::Process)?;
        let code = status.map(exit_code).unwrap_or(1);
        self.code = Some(code);
        Ok(code)
    }
}

impl Drop for CollectorProcess {
    fn drop(&mut self) {
        if self.code.is_none() {
            if let Err(e) = self.stop(Duration::from_secs(2)) {
                warn!("Failed to stop collector {}: {}", self.pid, e);
            }
        }
    }
}

/// Whether the process that forked us is gone. The death signal set after
/// `fork` does not fire for a parent that exited before it.
fn orphaned(parent: i32) -> bool {
    syscall::getppid() != parent
}

fn exit_code(status: i32) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        1
    }
}

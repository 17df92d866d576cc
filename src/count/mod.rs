use std::fs::File;
use std::io::{self, ErrorKind, Result};

use crate::config::attr::from;
use crate::config::{Cpu, Target};
use crate::event::EventDefinition;
use crate::ffi::bindings as b;
use crate::ffi::syscall::{ioctl, online_cpus, perf_event_open, read, IocOp};

mod matrix;

pub use matrix::*;

/// Operations on one open counter.
///
/// Releasing the counter is dropping it.
pub trait Handle {
    fn enable(&self) -> Result<()>;
    fn disable(&self) -> Result<()>;
    fn clear_count(&self) -> Result<()>;
    /// Count accumulated since the last clear.
    fn count(&self) -> Result<u64>;
}

/// Source of counters, one per (event, core).
pub trait Pmu {
    type Handle: Handle;

    /// Number of cores currently online.
    fn online_cores(&self) -> usize;

    /// Open a disabled counter for `def` bound to `cpu`.
    fn open(&self, def: &EventDefinition, cpu: Cpu) -> Result<Self::Handle>;
}

/// A kernel performance counter.
pub struct Counter {
    perf: File,
}

impl Counter {
    pub fn new(def: &EventDefinition, target: impl Into<Target>) -> Result<Self> {
        let target = target.into();
        let attr = from(def);
        let flags = target.flags | b::PERF_FLAG_FD_CLOEXEC as u64;
        let perf = perf_event_open(&attr, target.pid, target.cpu, -1, flags)?;

        Ok(Self { perf })
    }
}

impl Handle for Counter {
    fn enable(&self) -> Result<()> {
        ioctl(&self.perf, IocOp::Enable)?;
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        ioctl(&self.perf, IocOp::Disable)?;
        Ok(())
    }

    fn clear_count(&self) -> Result<()> {
        ioctl(&self.perf, IocOp::Reset)?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        // With `read_format == 0` the kernel hands back exactly one u64.
        let mut buf = [0; size_of::<u64>()];
        let n = read(&self.perf, &mut buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("short counter read: {} of {} bytes", n, buf.len()),
            ));
        }
        Ok(u64::from_ne_bytes(buf))
    }
}

/// Counters backed by `perf_event_open`.
pub struct PerfPmu {
    online: usize,
}

impl PerfPmu {
    pub fn new() -> Result<Self> {
        Ok(Self {
            online: online_cpus()?,
        })
    }
}

impl Pmu for PerfPmu {
    type Handle = Counter;

    fn online_cores(&self) -> usize {
        self.online
    }

    fn open(&self, def: &EventDefinition, cpu: Cpu) -> Result<Counter> {
        Counter::new(def, cpu)
    }
}

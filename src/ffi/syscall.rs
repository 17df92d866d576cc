use std::fs::File;
use std::io::{Error, Result};
use std::os::fd::{AsRawFd, FromRawFd};

use perf_event_open_sys::ioctls;

use super::Attr;

pub fn perf_event_open(attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64) -> Result<File> {
    let num = libc::SYS_perf_event_open;
    let fd = unsafe { libc::syscall(num, attr as *const Attr, pid, cpu, group_fd, flags) };
    if fd != -1 {
        Ok(unsafe { File::from_raw_fd(fd as _) })
    } else {
        Err(Error::last_os_error())
    }
}

/// Counter control requests understood by `ioctl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IocOp {
    Enable,
    Disable,
    Reset,
}

pub fn ioctl(file: &File, op: IocOp) -> Result<i32> {
    let fd = file.as_raw_fd();
    let result = unsafe {
        match op {
            IocOp::Enable => ioctls::ENABLE(fd, 0),
            IocOp::Disable => ioctls::DISABLE(fd, 0),
            IocOp::Reset => ioctls::RESET(fd, 0),
        }
    };
    if result != -1 {
        Ok(result)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn read(file: &File, buf: &mut [u8]) -> Result<usize> {
    let fd = file.as_raw_fd();
    let count = buf.len();
    let buf = buf.as_mut_ptr() as _;
    let bytes = unsafe { libc::read(fd, buf, count) };
    if bytes != -1 {
        Ok(bytes as _)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn online_cpus() -> Result<usize> {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        Ok(n as _)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn fork() -> Result<i32> {
    let pid = unsafe { libc::fork() };
    if pid != -1 {
        Ok(pid)
    } else {
        Err(Error::last_os_error())
    }
}

// Returns the raw wait status, or `None` if `nohang` is set and the child
// is still running.
pub fn waitpid(pid: i32, nohang: bool) -> Result<Option<i32>> {
    let mut status = 0;
    let options = if nohang { libc::WNOHANG } else { 0 };
    loop {
        let ret = unsafe { libc::waitpid(pid, &mut status, options) };
        match ret {
            -1 => {
                let err = Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            0 => return Ok(None),
            _ => return Ok(Some(status)),
        }
    }
}

pub fn kill(pid: i32, sig: i32) -> Result<()> {
    let result = unsafe { libc::kill(pid, sig) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn set_parent_death_signal(sig: i32) -> Result<()> {
    let result = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, sig as libc::c_ulong) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn getpid() -> i32 {
    unsafe { libc::getpid() }
}

pub fn getppid() -> i32 {
    unsafe { libc::getppid() }
}

/// A CPU core, counted across every process running on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cpu(pub u32);

#[derive(Clone, Debug)]
pub struct Target {
    pub(crate) pid: i32,
    pub(crate) cpu: i32,
    pub(crate) flags: u64,
}

impl From<Cpu> for Target {
    fn from(Cpu(cpu): Cpu) -> Self {
        // pid == -1 together with a concrete cpu means system-wide on that cpu:
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L12835
        Target {
            pid: -1,
            cpu: cpu as _,
            flags: 0,
        }
    }
}

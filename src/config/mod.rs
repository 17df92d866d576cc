use std::time::Duration;

pub(crate) mod attr;
mod target;

pub use target::*;

/// Collector and consumer options.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Time between two sampling cycles.
    ///
    /// The loop sleeps for the full period after each row, so the real
    /// cadence is this period plus the cost of reading every counter.
    /// Drift accumulates over a session and is not compensated.
    pub period: Duration,

    /// Time between two consumer polls of the row sink.
    pub poll_interval: Duration,

    /// Stop after this many rows, `None` runs until shutdown is requested.
    pub cycles: Option<u64>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(1),
            poll_interval: Duration::from_millis(10),
            cycles: None,
        }
    }
}

/// Privilege levels excluded from counting.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Priv {
    /// Kernel space.
    pub kernel: bool,

    /// Hypervisor.
    pub hv: bool,
}

impl Default for Priv {
    fn default() -> Self {
        Self {
            kernel: true,
            hv: true,
        }
    }
}

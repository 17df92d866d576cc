use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Shutdown request shared between an interrupt handler and the loop that
/// owns the kernel resources.
///
/// The handler only stores to the flag; the loop checks it at the top of
/// each cycle and performs the teardown itself.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag on SIGINT, SIGTERM or SIGHUP. Once per process.
    pub fn install(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.request())
            .map_err(|e| Error::Process(std::io::Error::other(e.to_string())))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

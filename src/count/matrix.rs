use std::io::{self, ErrorKind};

use log::{debug, warn};

use super::{Handle, Pmu};
use crate::config::Cpu;
use crate::error::{Error, Result};
use crate::event::Catalog;

/// Counters for every (event, core) pair.
///
/// Either every slot holds a live handle (monitoring) or none does (torn
/// down). `open` never returns a partially filled matrix, and `close_all`
/// empties every slot.
pub struct CounterMatrix<H: Handle> {
    events: usize,
    cores: usize,
    // Row-major by event: slot `event * cores + core`. `None` is a released
    // or never opened counter.
    slots: Vec<Option<H>>,
}

impl<H: Handle> CounterMatrix<H> {
    /// Open one counter per event per core, in catalog order.
    ///
    /// If any open fails, everything opened so far is disabled and released
    /// before the error is returned.
    pub fn open<P>(pmu: &P, catalog: &Catalog, cores: usize) -> Result<Self>
    where
        P: Pmu<Handle = H>,
    {
        let online = pmu.online_cores();
        let mut matrix = Self {
            events: catalog.len(),
            cores,
            slots: Vec::with_capacity(catalog.len() * cores),
        };

        for (event, def) in catalog.iter().enumerate() {
            for core in 0..cores {
                let opened = if core < online {
                    pmu.open(def, Cpu(core as _))
                } else {
                    Err(io::Error::new(
                        ErrorKind::NotFound,
                        format!("core {} is not online ({} online)", core, online),
                    ))
                };
                match opened {
                    Ok(handle) => matrix.slots.push(Some(handle)),
                    Err(source) => {
                        let released = matrix.close_all();
                        warn!(
                            "Opening {:?} on core {} failed, released {} counters",
                            def.column, core, released
                        );
                        return Err(Error::ResourceExhausted {
                            event,
                            core,
                            source,
                        });
                    }
                }
            }
        }

        debug!("Opened {} x {} counters", matrix.events, matrix.cores);
        Ok(matrix)
    }

    pub fn events(&self) -> usize {
        self.events
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Number of live handles.
    pub fn valid_handles(&self) -> usize {
        self.slots.iter().filter(|it| it.is_some()).count()
    }

    /// Reset then enable every counter, so all of them start from zero.
    pub fn enable_all(&self) -> Result<()> {
        self.for_each(|h| {
            h.clear_count()?;
            h.enable()
        })
    }

    /// Reset every counter to zero.
    pub fn reset_all(&self) -> Result<()> {
        self.for_each(|h| h.clear_count())
    }

    /// Sum the counts of `event` over all cores, then reset those counters.
    ///
    /// A failed read leaves the matrix in an unknown state; callers tear it
    /// down with [`close_all`][Self::close_all].
    pub fn read_and_reset(&self, event: usize) -> Result<u64> {
        let row = self.row(event)?;
        let mut total = 0_u64;
        for (core, handle) in row.iter().enumerate() {
            let handle = handle.as_ref().ok_or_else(|| Self::released(event, core))?;
            let count = handle.count().map_err(|source| Error::ReadFailure {
                event,
                core,
                source,
            })?;
            total = total.saturating_add(count);
        }
        for (core, handle) in row.iter().enumerate() {
            if let Some(handle) = handle {
                handle.clear_count().map_err(|source| Error::CounterControl {
                    event,
                    core,
                    source,
                })?;
            }
        }
        Ok(total)
    }

    /// Disable and release every live counter, returning how many were released.
    ///
    /// Released slots are skipped, so calling this again is harmless.
    pub fn close_all(&mut self) -> usize {
        let cores = self.cores.max(1);
        let mut released = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let Some(handle) = slot.take() else {
                continue;
            };
            if let Err(e) = handle.disable() {
                // The descriptor is still closed below.
                warn!(
                    "Failed to disable counter for event {} on core {}: {}",
                    i / cores,
                    i % cores,
                    e
                );
            }
            drop(handle);
            released += 1;
        }
        released
    }

    fn row(&self, event: usize) -> Result<&[Option<H>]> {
        if event >= self.events {
            return Err(Error::ReadFailure {
                event,
                core: 0,
                source: io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("no event {} in a matrix of {}", event, self.events),
                ),
            });
        }
        let start = event * self.cores;
        Ok(&self.slots[start..start + self.cores])
    }

    fn for_each<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&H) -> io::Result<()>,
    {
        for (i, slot) in self.slots.iter().enumerate() {
            let (event, core) = (i / self.cores, i % self.cores);
            let handle = slot.as_ref().ok_or_else(|| Self::released(event, core))?;
            f(handle).map_err(|source| Error::CounterControl {
                event,
                core,
                source,
            })?;
        }
        Ok(())
    }

    fn released(event: usize, core: usize) -> Error {
        Error::ReadFailure {
            event,
            core,
            source: io::Error::new(ErrorKind::NotConnected, "counter already released"),
        }
    }
}

impl<H: Handle> Drop for CounterMatrix<H> {
    fn drop(&mut self) {
        self.close_all();
    }
}

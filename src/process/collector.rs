use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};

use super::ShutdownFlag;
use crate::config::Opts;
use crate::count::{CounterMatrix, Pmu};
use crate::error::Result;
use crate::event::Catalog;
use crate::monitor::Monitor;
use crate::sink::RowSink;

/// The producing side: owns the counter matrix, the sampling loop and the
/// sink writer.
pub struct Collector<P: Pmu> {
    pmu: P,
    catalog: Catalog,
    opts: Opts,
    sink: PathBuf,
}

impl<P: Pmu> Collector<P> {
    pub fn new(pmu: P, catalog: Catalog, opts: Opts, sink: impl AsRef<Path>) -> Self {
        Self {
            pmu,
            catalog,
            opts,
            sink: sink.as_ref().to_path_buf(),
        }
    }

    /// Open every counter on every online core, then sample until
    /// `shutdown` is requested. Returns the number of rows written.
    ///
    /// Every counter and the sink are released before this returns,
    /// whether it succeeds or not.
    pub fn run(&self, shutdown: &ShutdownFlag) -> Result<u64> {
        let cores = self.pmu.online_cores();
        info!("Number of cores: {}", cores);

        let mut matrix = CounterMatrix::open(&self.pmu, &self.catalog, cores)?;
        let mut sink = match RowSink::create(&self.sink, &self.catalog) {
            Ok(sink) => sink,
            Err(e) => {
                matrix.close_all();
                return Err(e);
            }
        };

        let result = matrix.enable_all().and_then(|_| {
            info!(
                "Monitoring {} events on {} cores every {:?} into {}",
                self.catalog.len(),
                cores,
                self.opts.period,
                sink.path().display()
            );
            Monitor::new(&self.opts).run(&matrix, &mut sink, shutdown)
        });
        if let Err(e) = &result {
            error!("Monitoring failed: {}", e);
        }

        let started = Instant::now();
        let released = matrix.close_all();
        let closed = sink.close();
        info!(
            "Released {} counters in {:?}",
            released,
            started.elapsed()
        );

        let rows = result?;
        closed?;
        Ok(rows)
    }
}

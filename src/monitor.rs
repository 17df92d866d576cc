use std::thread;
use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use log::{info, trace};

use crate::config::Opts;
use crate::count::{CounterMatrix, Handle};
use crate::error::Result;
use crate::event::MAX_EVENTS;
use crate::process::ShutdownFlag;
use crate::sink::RowSink;

/// Counts of one sampling cycle, in catalog order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Whole milliseconds since monitoring started.
    pub elapsed_ms: u64,
    /// Per-event totals over all cores since the previous cycle.
    pub counts: ArrayVec<u64, MAX_EVENTS>,
}

/// The fixed-cadence sampling loop.
#[derive(Clone, Debug)]
pub struct Monitor {
    period: Duration,
    cycles: Option<u64>,
}

impl Monitor {
    pub fn new(opts: &Opts) -> Self {
        Self {
            period: opts.period,
            cycles: opts.cycles,
        }
    }

    /// Read and reset every event, stamped relative to `start`.
    pub fn sample<H: Handle>(&self, matrix: &CounterMatrix<H>, start: Instant) -> Result<Sample> {
        let mut counts = ArrayVec::new();
        for event in 0..matrix.events().min(MAX_EVENTS) {
            counts.push(matrix.read_and_reset(event)?);
        }
        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(Sample { elapsed_ms, counts })
    }

    /// Append one row per period until `shutdown` is requested or the
    /// configured number of cycles is reached. Returns the rows written.
    ///
    /// The flag is checked at the top of every cycle; a read or write
    /// error ends the loop and is returned to the caller, which owns
    /// the teardown.
    pub fn run<H: Handle>(
        &self,
        matrix: &CounterMatrix<H>,
        sink: &mut RowSink,
        shutdown: &ShutdownFlag,
    ) -> Result<u64> {
        let start = Instant::now();
        let mut rows = 0;

        while !shutdown.is_requested() {
            if self.cycles.is_some_and(|n| rows >= n) {
                break;
            }

            let sample = self.sample(matrix, start)?;
            sink.append(&sample)?;
            rows += 1;
            trace!("{:?}", sample);

            thread::sleep(self.period);
        }

        info!("Sampling stopped after {} rows", rows);
        Ok(rows)
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::Monitor;
    use crate::config::Opts;
    use crate::count::test::MockPmu;
    use crate::count::CounterMatrix;
    use crate::event::Catalog;
    use crate::process::ShutdownFlag;
    use crate::sink::RowSink;

    #[test]
    fn test_sample_one_count_per_event() {
        let pmu = MockPmu::new(4);
        let catalog = Catalog::reference();
        let matrix = CounterMatrix::open(&pmu, &catalog, 4).unwrap();
        matrix.enable_all().unwrap();
        pmu.tick(2);

        let monitor = Monitor::new(&Opts::default());
        let sample = monitor.sample(&matrix, Instant::now()).unwrap();
        assert_eq!(sample.counts.as_slice(), [8; 5]);

        // Reading reset every counter.
        let sample = monitor.sample(&matrix, Instant::now()).unwrap();
        assert_eq!(sample.counts.as_slice(), [0; 5]);
    }

    #[test]
    fn test_rows_follow_period() {
        let path = std::env::temp_dir().join(format!("pmc-monitor-{}.csv", Uuid::new_v4()));
        let pmu = MockPmu::new(1);
        let catalog = Catalog::reference();
        let matrix = CounterMatrix::open(&pmu, &catalog, 1).unwrap();
        let mut sink = RowSink::create(&path, &catalog).unwrap();

        let opts = Opts {
            period: Duration::from_millis(5),
            cycles: Some(4),
            ..Default::default()
        };
        let rows = Monitor::new(&opts)
            .run(&matrix, &mut sink, &ShutdownFlag::new())
            .unwrap();
        assert_eq!(rows, 4);

        let text = fs::read_to_string(&path).unwrap();
        let stamps: Vec<u64> = text
            .lines()
            .skip(1)
            .map(|it| it.split(',').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            // Whole milliseconds, so a 5ms sleep can show up as 4.
            assert!(pair[1] >= pair[0] + 4, "{:?}", stamps);
        }

        let _ = fs::remove_file(&path);
    }
}

//! Continuous sampling of raw hardware performance counters on every CPU
//! core, aggregated into fixed-interval rows of a csv table that a second
//! process feeds to a classifier.
//!
//! ## Example
//!
//! Sample the built-in event set on all online cores for 100 cycles.
//!
//! ```rust,no_run
//! use pmc_monitor::config::Opts;
//! use pmc_monitor::count::PerfPmu;
//! use pmc_monitor::event::Catalog;
//! use pmc_monitor::process::{Collector, ShutdownFlag};
//!
//! let mut opts = Opts::default();
//! opts.cycles = Some(100); // One row per millisecond, 100 rows.
//!
//! let pmu = PerfPmu::new().unwrap();
//! let collector = Collector::new(pmu, Catalog::reference(), opts, "counts.csv");
//!
//! let shutdown = ShutdownFlag::new();
//! shutdown.install().unwrap(); // Ctrl-C stops sampling and releases every counter.
//!
//! let rows = collector.run(&shutdown).unwrap();
//! println!("{} rows written", rows);
//! ```
//!
//! ## Permissions
//!
//! System-wide counters need `CAP_PERFMON` (or `CAP_SYS_ADMIN`), or a
//! `/proc/sys/kernel/perf_event_paranoid` value of 0 or lower. Raw event
//! codes are vendor specific; the built-in catalog targets AMD Zen cores.

pub mod classify;
pub mod config;
pub mod count;
pub mod error;
pub mod event;
mod ffi;
pub mod monitor;
pub mod process;
pub mod sink;

pub use error::{Error, Result};

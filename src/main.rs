use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use pmc_monitor::classify::{CommandClassifier, REFERENCE_FEATURES};
use pmc_monitor::config::Opts;
use pmc_monitor::count::PerfPmu;
use pmc_monitor::event::Catalog;
use pmc_monitor::process::{self, Collector, CollectorProcess, Consumer, Role, ShutdownFlag};
use pmc_monitor::sink;

/// pmc-monitor: per-core hardware counter collector
///
/// A forked collector counts a fixed set of raw PMU events on every online
/// core, sums them across cores and appends one row per period to a csv
/// sink. The parent process polls the sink and hands the newest row to an
/// external classifier.
///
/// Ctrl-C stops both processes; the collector disables and closes every
/// counter before it exits.
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// Base name of the row sink, rows go to NAME.csv.
    name: Option<String>,

    /// Sampling period in microseconds.
    #[clap(short = 'p', long, default_value = "1000")]
    period_us: u64,

    /// Consumer poll interval in milliseconds.
    #[clap(short = 'i', long, default_value = "10")]
    poll_ms: u64,

    /// Stop the collector after this many rows.
    #[clap(short = 'n', long)]
    cycles: Option<u64>,

    /// Classifier command, fed one comma-separated feature line per row on
    /// stdin and answering one label line on stdout.
    #[clap(short = 'c', long)]
    classifier: Option<String>,

    /// Feature columns in the order the classifier expects.
    #[clap(short = 'f', long, value_delimiter = ',')]
    features: Vec<String>,

    /// Run only the collector, in the foreground.
    #[clap(long)]
    collect_only: bool,

    /// Enable verbose output. Specify multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbose: u8) -> Result<()> {
    let llv = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn collect(opts: &Opts, sink: &Path) -> Result<u64> {
    let shutdown = ShutdownFlag::new();
    shutdown.install().context("Error setting shutdown handler")?;

    let pmu = PerfPmu::new().context("Failed to count online cores")?;
    let collector = Collector::new(pmu, Catalog::reference(), opts.clone(), sink);
    let rows = collector.run(&shutdown)?;
    Ok(rows)
}

fn consume(args: &Args, opts: &Opts, sink: &Path, collector: &mut CollectorProcess) -> Result<()> {
    let shutdown = ShutdownFlag::new();
    shutdown.install().context("Error setting shutdown handler")?;

    let classifier = match args.classifier.as_deref() {
        Some(cmd) => {
            let argv: Vec<_> = cmd.split_whitespace().collect();
            if argv.is_empty() {
                bail!("Empty classifier command");
            }
            Some(CommandClassifier::spawn(&argv).context("Failed to start classifier")?)
        }
        None => {
            info!("No classifier given, reporting raw rows");
            None
        }
    };
    let features = match args.features.is_empty() {
        true => REFERENCE_FEATURES.iter().map(|it| it.to_string()).collect(),
        false => args.features.clone(),
    };

    let mut consumer = Consumer::new(sink, classifier, features, opts.poll_interval);
    consumer.run(&shutdown, Some(collector))?;
    Ok(())
}

fn run(args: Args) -> Result<i32> {
    let sink = sink::path_for(args.name.as_deref());
    let opts = Opts {
        period: Duration::from_micros(args.period_us),
        poll_interval: Duration::from_millis(args.poll_ms),
        cycles: args.cycles,
    };

    if args.collect_only {
        init_logger(args.verbose)?;
        if args.name.is_none() {
            info!("No output filename provided, using default: {}", sink.display());
        }
        let rows = collect(&opts, &sink)?;
        info!("Collector wrote {} rows", rows);
        return Ok(0);
    }

    // The consumer must not attach to an earlier run's rows.
    sink::discard(&sink)?;

    // Fork before the logger or any signal handler thread exists.
    match process::fork()? {
        Role::Collector => {
            init_logger(args.verbose)?;
            match collect(&opts, &sink) {
                Ok(rows) => {
                    info!("Collector wrote {} rows", rows);
                    Ok(0)
                }
                Err(e) => {
                    error!("Collector failed: {:#}", e);
                    Ok(1)
                }
            }
        }
        Role::Consumer(mut collector) => {
            init_logger(args.verbose)?;
            if args.name.is_none() {
                info!("No output filename provided, using default: {}", sink.display());
            }
            info!("Collector running as pid {}", collector.pid());

            let consumed = consume(&args, &opts, &sink, &mut collector);
            let code = collector.stop(Duration::from_secs(2))?;
            consumed?;
            Ok(code)
        }
    }
}

fn main() -> Result<()> {
    let code = run(Args::parse())?;
    std::process::exit(code);
}

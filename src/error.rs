use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The kernel refused a counter, or the core is not online.
    #[error("cannot open counter for event {event} on core {core}")]
    ResourceExhausted {
        event: usize,
        core: usize,
        #[source]
        source: io::Error,
    },

    #[error("cannot read counter for event {event} on core {core}")]
    ReadFailure {
        event: usize,
        core: usize,
        #[source]
        source: io::Error,
    },

    #[error("cannot control counter for event {event} on core {core}")]
    CounterControl {
        event: usize,
        core: usize,
        #[source]
        source: io::Error,
    },

    #[error("row sink unavailable: {}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot append row to sink")]
    SinkWrite(#[source] io::Error),

    /// Non-fatal: the consumer retries on its next cycle.
    #[error("stale or malformed row: {0}")]
    StaleOrMalformedRow(String),

    /// Non-fatal: logged by the consumer.
    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("feature column `{0}` is not in the row sink header")]
    MissingFeature(String),

    #[error("invalid event catalog: {0}")]
    Catalog(String),

    #[error("process control failed")]
    Process(#[source] io::Error),
}

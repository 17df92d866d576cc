use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::{CollectorProcess, ShutdownFlag};
use crate::classify::{Classifier, FeatureSchema};
use crate::error::{Error, Result};
use crate::sink::{Row, RowReader};

/// Outcome of one consumer cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    /// The sink does not exist yet or holds only its header.
    NoData,
    /// The newest row was already handled by an earlier cycle.
    Stale,
    /// The newest row, when no classifier is attached.
    Row(Row),
    Prediction { elapsed_ms: u64, label: String },
}

/// The polling side: reads the newest row and asks the classifier about it.
pub struct Consumer<C: Classifier> {
    sink: PathBuf,
    reader: Option<RowReader>,
    features: Vec<String>,
    schema: Option<FeatureSchema>,
    classifier: Option<C>,
    poll_interval: Duration,
    last: Option<Row>,
}

impl<C: Classifier> Consumer<C> {
    /// `features` is the classifier's expected column order; it is
    /// resolved against the sink header once the header is readable.
    pub fn new(
        sink: impl AsRef<Path>,
        classifier: Option<C>,
        features: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            sink: sink.as_ref().to_path_buf(),
            reader: None,
            features,
            schema: None,
            classifier,
            poll_interval,
            last: None,
        }
    }

    pub fn classifier(&self) -> Option<&C> {
        self.classifier.as_ref()
    }

    pub fn classifier_mut(&mut self) -> Option<&mut C> {
        self.classifier.as_mut()
    }

    /// One polling cycle.
    ///
    /// `StaleOrMalformedRow` and `Classifier` errors only concern this
    /// cycle. `MissingFeature` means the classifier can never be fed from
    /// this sink.
    pub fn step(&mut self) -> Result<Report> {
        if self.reader.is_none() {
            match RowReader::open(&self.sink) {
                Ok(reader) => self.attach(reader)?,
                Err(Error::SinkUnavailable { .. }) => return Ok(Report::NoData),
                Err(e) => return Err(e),
            }
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(Report::NoData);
        };

        let Some(row) = reader.latest()? else {
            return Ok(Report::NoData);
        };
        if self.last.as_ref() == Some(&row) {
            return Ok(Report::Stale);
        }
        self.last = Some(row.clone());

        match (self.classifier.as_mut(), self.schema.as_ref()) {
            (Some(classifier), Some(schema)) => {
                let features = schema.extract(&row)?;
                let label = classifier.classify(&features)?;
                Ok(Report::Prediction {
                    elapsed_ms: row.elapsed_ms,
                    label,
                })
            }
            _ => Ok(Report::Row(row)),
        }
    }

    /// Poll until `shutdown` is requested or `collector` exits.
    pub fn run(
        &mut self,
        shutdown: &ShutdownFlag,
        mut collector: Option<&mut CollectorProcess>,
    ) -> Result<()> {
        info!("Reading {} every {:?}", self.sink.display(), self.poll_interval);

        while !shutdown.is_requested() {
            if let Some(collector) = collector.as_deref_mut() {
                if let Some(code) = collector.try_wait()? {
                    info!("Collector exited with status {}, stopping", code);
                    break;
                }
            }

            let started = Instant::now();
            match self.step() {
                Ok(Report::Prediction { elapsed_ms, label }) => {
                    info!("Prediction for row at {} ms: {}", elapsed_ms, label)
                }
                Ok(Report::Row(row)) => info!("Latest row: {:?}", row),
                Ok(Report::NoData) => debug!("No data row yet"),
                Ok(Report::Stale) => debug!("No new row"),
                Err(e @ Error::MissingFeature(_)) => return Err(e),
                Err(e @ Error::Classifier(_)) => warn!("Error in prediction: {}", e),
                Err(e) => debug!("Skipping cycle: {}", e),
            }
            debug!("Cycle took {:?}", started.elapsed());

            thread::sleep(self.poll_interval);
        }

        Ok(())
    }

    fn attach(&mut self, reader: RowReader) -> Result<()> {
        if self.classifier.is_some() {
            self.schema = Some(FeatureSchema::resolve(reader.columns(), &self.features)?);
        }
        debug!("Attached to {} {:?}", reader.path().display(), reader.columns());
        self.reader = Some(reader);
        Ok(())
    }
}

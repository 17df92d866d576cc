//! Boundary to the external classification capability.
//!
//! The consumer hands the classifier the newest row's counts as a feature
//! vector, ordered the way the model was trained, and gets a label back.
//! Scaling and the model itself live on the other side of the boundary.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::sink::Row;

/// Feature order of the reference random forest model.
pub const REFERENCE_FEATURES: [&str; 5] = [
    "Tablewalker D-side",
    "LS MAB Alloc Stores",
    "Software Prefetch DC Hit",
    "LS DC Accesses",
    "L1 DTLB Misses",
];

pub trait Classifier {
    /// Predict a label for one feature vector.
    ///
    /// Errors are reported per call and never poison later calls.
    fn classify(&mut self, features: &[f64]) -> Result<String>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, features: &[f64]) -> Result<String> {
        (**self).classify(features)
    }
}

/// Maps classifier feature names onto row count positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureSchema {
    indices: Vec<usize>,
}

impl FeatureSchema {
    /// `columns` are the sink's count columns, `names` the classifier's
    /// expected feature order.
    pub fn resolve<S: AsRef<str>>(columns: &[String], names: &[S]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                columns
                    .iter()
                    .position(|it| it == name)
                    .ok_or_else(|| Error::MissingFeature(name.to_string()))
            })
            .collect::<Result<_>>()?;
        Ok(Self { indices })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn extract(&self, row: &Row) -> Result<Vec<f64>> {
        self.indices
            .iter()
            .map(|&i| {
                row.counts.get(i).map(|&it| it as f64).ok_or_else(|| {
                    Error::StaleOrMalformedRow(format!("row has no column {}", i))
                })
            })
            .collect()
    }
}

/// A classifier served by a long-running child process.
///
/// The process is spawned once. Each request is one line of
/// comma-separated features on its stdin, each response one label line
/// on its stdout.
pub struct CommandClassifier {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl CommandClassifier {
    pub fn spawn<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Classifier("empty classifier command".into()))?;

        let mut child = Command::new(program.as_ref())
            .args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Classifier(format!("cannot spawn {}: {}", program.as_ref(), e)))?;

        let missing = || Error::Classifier("classifier pipes unavailable".into());
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        info!("Classifier {} started (pid {})", program.as_ref(), child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl Classifier for CommandClassifier {
    fn classify(&mut self, features: &[f64]) -> Result<String> {
        let request = features
            .iter()
            .map(|it| it.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.stdin, "{}", request)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::Classifier(format!("cannot send features: {}", e)))?;

        self.line.clear();
        let n = self
            .stdout
            .read_line(&mut self.line)
            .map_err(|e| Error::Classifier(format!("cannot read label: {}", e)))?;
        if n == 0 {
            return Err(Error::Classifier("classifier exited".into()));
        }

        let label = self.line.trim();
        if let Some(reason) = label.strip_prefix("error:") {
            return Err(Error::Classifier(reason.trim().to_string()));
        }
        Ok(label.to_string())
    }
}

impl Drop for CommandClassifier {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        debug!("Classifier stopped");
    }
}

#[cfg(test)]
mod test {
    use super::{Classifier, CommandClassifier, FeatureSchema, REFERENCE_FEATURES};
    use crate::error::Error;
    use crate::event::Catalog;
    use crate::sink::Row;

    fn columns() -> Vec<String> {
        Catalog::reference().columns().map(String::from).collect()
    }

    #[test]
    fn test_reference_schema_order() {
        let schema = FeatureSchema::resolve(&columns(), &REFERENCE_FEATURES).unwrap();
        let row = Row {
            elapsed_ms: 7,
            counts: vec![10, 11, 12, 13, 14],
        };
        assert_eq!(
            schema.extract(&row).unwrap(),
            vec![11.0, 13.0, 12.0, 14.0, 10.0]
        );
    }

    #[test]
    fn test_missing_feature() {
        let err = FeatureSchema::resolve(&columns(), &["LLC Misses"]).unwrap_err();
        assert!(matches!(err, Error::MissingFeature(name) if name == "LLC Misses"));
    }

    #[test]
    fn test_command_classifier() {
        // Answers "benign" for the first request and then fails every later one.
        let script = "read l; echo benign; while read l; do echo 'error: bad input'; done";
        let mut classifier = CommandClassifier::spawn(&["sh", "-c", script]).unwrap();

        assert_eq!(classifier.classify(&[1.0, 2.0]).unwrap(), "benign");
        assert!(matches!(
            classifier.classify(&[1.0, 2.0]),
            Err(Error::Classifier(reason)) if reason == "bad input"
        ));
    }

    #[test]
    fn test_command_classifier_exit() {
        let mut classifier = CommandClassifier::spawn(&["true"]).unwrap();
        assert!(matches!(
            classifier.classify(&[1.0]),
            Err(Error::Classifier(_))
        ));
    }

    #[test]
    fn test_empty_command() {
        let argv: [&str; 0] = [];
        assert!(CommandClassifier::spawn(&argv).is_err());
    }
}

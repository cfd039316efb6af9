//! Per-subject signal types.
//!
//! A signal is one subject's chronologically ordered sequence of numeric
//! samples, nominally one per minute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a study subject (the file-name prefix, e.g. `101`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the subject id from a file name such as
    /// `101_minuteSteps_20141021_20141123.csv`.
    ///
    /// Everything before the first underscore is the id; a name without an
    /// underscore is used whole (minus its extension).
    pub fn from_file_name(name: &str) -> Self {
        let stem = match name.split_once('_') {
            Some((prefix, _)) => prefix,
            None => name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name),
        };
        Self(stem.to_string())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single timestamped measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Instant the measurement refers to
    pub timestamp: DateTime<Utc>,
    /// Measured value (steps per minute, METs, counts, ...)
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One subject's ordered samples.
///
/// Samples are expected to be sorted ascending by timestamp with no
/// duplicates. Segmentation relies on that order but never checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub subject: SubjectId,
    pub samples: Vec<Sample>,
}

impl Signal {
    pub fn new(subject: SubjectId, samples: Vec<Sample>) -> Self {
        Self { subject, samples }
    }

    /// Build a signal from raw values spaced one minute apart from `start`.
    pub fn from_minutes(subject: SubjectId, start: DateTime<Utc>, values: &[f64]) -> Self {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Sample::new(start + chrono::Duration::minutes(i as i64), value))
            .collect();
        Self { subject, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values in sample order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Check whether timestamps are strictly increasing.
    pub fn is_strictly_ordered(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }

    /// First and last timestamps, if any.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

/// Signals for a set of subjects, keyed and ordered by subject id.
pub type SignalSet = BTreeMap<SubjectId, Signal>;

//! Assembling per-subject signals from loaded samples.

use crate::signal::error::SignalError;
use crate::signal::types::{Sample, Signal, SignalSet, SubjectId};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Collects samples for any number of subjects and files, then produces
/// sorted, deduplicated signals.
#[derive(Debug, Default)]
pub struct SignalBuilder {
    samples: BTreeMap<SubjectId, Vec<Sample>>,
    dropped_values: usize,
}

impl SignalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample for a subject.
    pub fn push(&mut self, subject: &SubjectId, sample: Sample) {
        if let Some(samples) = self.samples.get_mut(subject) {
            samples.push(sample);
        } else {
            self.samples.insert(subject.clone(), vec![sample]);
        }
    }

    /// Record a cell that could not be turned into a value.
    pub fn record_dropped(&mut self) {
        self.dropped_values += 1;
    }

    /// Number of empty or non-numeric cells skipped so far.
    pub fn dropped_values(&self) -> usize {
        self.dropped_values
    }

    /// Number of subjects seen so far.
    pub fn subject_count(&self) -> usize {
        self.samples.len()
    }

    /// Sort every subject's samples by timestamp and drop duplicate
    /// timestamps, keeping the first sample added for each instant.
    pub fn finish(self) -> SignalSet {
        if self.dropped_values > 0 {
            tracing::warn!(
                dropped = self.dropped_values,
                "Skipped empty or non-numeric values"
            );
        }

        self.samples
            .into_iter()
            .map(|(subject, mut samples)| {
                let before = samples.len();
                samples.sort_by_key(|s| s.timestamp);
                samples.dedup_by_key(|s| s.timestamp);

                let duplicates = before - samples.len();
                if duplicates > 0 {
                    tracing::warn!(
                        subject = %subject,
                        duplicates,
                        "Dropped samples with duplicate timestamps"
                    );
                }

                let signal = Signal::new(subject.clone(), samples);
                (subject, signal)
            })
            .collect()
    }
}

/// Interpret a wall-clock time in `tz` and convert it to UTC.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, SignalError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| SignalError::Timestamp(format!("{naive} does not exist in {tz}")))
}

/// Parse a numeric cell. Empty, non-numeric and non-finite cells yield `None`.
pub(crate) fn parse_value(cell: &str) -> Option<f64> {
    let value = cell.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Files directly inside `dir` accepted by `filter`, sorted by path.
pub(crate) fn matching_files<F>(dir: &Path, filter: F) -> Result<Vec<PathBuf>, SignalError>
where
    F: Fn(&str) -> bool,
{
    let entries = std::fs::read_dir(dir).map_err(|e| SignalError::io(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).map(&filter).unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// File name component of a path as UTF-8, or an empty string.
pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

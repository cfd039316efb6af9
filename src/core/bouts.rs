//! Activity bout segmentation.
//!
//! A bout is a stretch of samples at or above a threshold that may absorb
//! short dips and lasts at least a minimum number of samples. Each subject's
//! signal is scanned independently:
//!
//! - An active sample opens a candidate.
//! - The candidate grows while runs of inactive samples stay within the
//!   tolerance. A run longer than the tolerance, or the end of the signal,
//!   stops it.
//! - The candidate ends at `j - inactive_run`, where `j` is the scan cursor
//!   when it stopped. The terminating inactive run is never part of a bout.
//! - Candidates of at least `min_duration` samples are committed and the scan
//!   resumes at their end. Shorter ones are dropped and the scan retries one
//!   sample after their start.
//!
//! The scan is index based: one sample is one time unit. Signals with missing
//! rows should be densified first (see [`crate::signal::densify`]).

use crate::signal::types::{Sample, Signal, SignalSet, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Segmentation settings as supplied by a caller or a config file.
///
/// Integer fields are signed so that out-of-range input can be represented
/// and rejected by [`BoutConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoutConfig {
    /// Minimum value (inclusive) for a sample to count as active
    pub threshold: f64,
    /// Minimum number of samples in a committed bout
    pub min_duration: i64,
    /// Maximum run of consecutive inactive samples absorbed into a bout
    pub tolerance: i64,
}

impl Default for BoutConfig {
    fn default() -> Self {
        Self {
            threshold: 10.0, // steps per minute
            min_duration: 5,
            tolerance: 2,
        }
    }
}

impl BoutConfig {
    pub fn new(threshold: f64, min_duration: i64, tolerance: i64) -> Self {
        Self {
            threshold,
            min_duration,
            tolerance,
        }
    }

    /// Check the settings and convert them to scan parameters.
    pub fn validate(&self) -> Result<BoutParams, BoutError> {
        if !self.threshold.is_finite() {
            return Err(BoutError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.min_duration < 1 {
            return Err(BoutError::InvalidConfig(format!(
                "min_duration must be at least 1, got {}",
                self.min_duration
            )));
        }
        if self.tolerance < 0 {
            return Err(BoutError::InvalidConfig(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }

        Ok(BoutParams {
            threshold: self.threshold,
            min_duration: self.min_duration as usize,
            tolerance: self.tolerance as usize,
        })
    }
}

/// Validated scan parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoutParams {
    pub threshold: f64,
    pub min_duration: usize,
    pub tolerance: usize,
}

impl BoutParams {
    /// Whether a value counts as active. NaN never does.
    #[inline]
    pub fn is_active(&self, value: f64) -> bool {
        value >= self.threshold
    }
}

/// Segmentation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BoutError {
    InvalidConfig(String),
}

impl std::fmt::Display for BoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoutError::InvalidConfig(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for BoutError {}

/// A committed bout over `[start_index, end_index)` of one subject's signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bout {
    pub subject: SubjectId,
    /// Index of the first included sample
    pub start_index: usize,
    /// Index one past the last included sample
    pub end_index: usize,
    /// Number of included samples (`end_index - start_index`)
    pub sample_count: usize,
    /// Sum of every included value, tolerated dips included
    pub aggregate_value: f64,
    /// Timestamp of the first included sample
    pub started_at: DateTime<Utc>,
    /// Timestamp of the last included sample
    pub ended_at: DateTime<Utc>,
}

impl Bout {
    fn over(signal: &Signal, start: usize, end: usize) -> Self {
        let included = &signal.samples[start..end];
        Self {
            subject: signal.subject.clone(),
            start_index: start,
            end_index: end,
            sample_count: end - start,
            aggregate_value: included.iter().map(|s| s.value).sum(),
            started_at: included[0].timestamp,
            ended_at: included[included.len() - 1].timestamp,
        }
    }
}

/// Counters gathered while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub samples_scanned: u64,
    pub candidates_opened: u64,
    pub candidates_rejected: u64,
}

impl ScanStats {
    pub fn merge(&mut self, other: &ScanStats) {
        self.samples_scanned += other.samples_scanned;
        self.candidates_opened += other.candidates_opened;
        self.candidates_rejected += other.candidates_rejected;
    }
}

/// Result of segmenting one subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectBouts {
    pub bouts: Vec<Bout>,
    /// Sample count of each bout, in bout order
    pub durations: Vec<usize>,
    pub stats: ScanStats,
}

/// Bouts and durations for every segmented subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoutCollection {
    pub bouts: BTreeMap<SubjectId, Vec<Bout>>,
    pub durations: BTreeMap<SubjectId, Vec<usize>>,
    pub stats: ScanStats,
}

impl BoutCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one subject's result. A later insert for the same subject replaces
    /// the earlier one.
    pub fn insert(&mut self, subject: SubjectId, result: SubjectBouts) {
        self.stats.merge(&result.stats);
        self.durations.insert(subject.clone(), result.durations);
        self.bouts.insert(subject, result.bouts);
    }

    pub fn subject_count(&self) -> usize {
        self.bouts.len()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &SubjectId> {
        self.bouts.keys()
    }

    pub fn bouts_for(&self, subject: &SubjectId) -> Option<&[Bout]> {
        self.bouts.get(subject).map(Vec::as_slice)
    }

    pub fn durations_for(&self, subject: &SubjectId) -> Option<&[usize]> {
        self.durations.get(subject).map(Vec::as_slice)
    }

    pub fn total_bouts(&self) -> usize {
        self.bouts.values().map(Vec::len).sum()
    }
}

/// Segment every subject's signal with the same configuration.
///
/// The configuration is validated before any signal is scanned. Subjects with
/// empty signals get empty bout and duration lists.
pub fn segment(signals: &SignalSet, config: &BoutConfig) -> Result<BoutCollection, BoutError> {
    let params = config.validate()?;

    let mut collection = BoutCollection::new();
    for (subject, signal) in signals {
        collection.insert(subject.clone(), segment_signal(signal, &params));
    }

    tracing::info!(
        subjects = collection.subject_count(),
        bouts = collection.total_bouts(),
        "Segmentation complete"
    );
    Ok(collection)
}

/// Segment a single subject's signal.
pub fn segment_signal(signal: &Signal, params: &BoutParams) -> SubjectBouts {
    let samples = &signal.samples;
    let n = samples.len();

    let mut bouts = Vec::new();
    let mut stats = ScanStats {
        samples_scanned: n as u64,
        ..ScanStats::default()
    };

    let mut i = 0;
    while i < n {
        if !params.is_active(samples[i].value) {
            i += 1;
            continue;
        }

        let start = i;
        let end = candidate_end(samples, start, params);
        stats.candidates_opened += 1;

        if end - start >= params.min_duration {
            bouts.push(Bout::over(signal, start, end));
            i = end;
        } else {
            stats.candidates_rejected += 1;
            i = start + 1;
        }
    }

    tracing::debug!(
        subject = %signal.subject,
        samples = n,
        bouts = bouts.len(),
        rejected = stats.candidates_rejected,
        "Segmented subject"
    );

    let durations = bouts.iter().map(|b| b.sample_count).collect();
    SubjectBouts {
        bouts,
        durations,
        stats,
    }
}

/// Scan forward from an active sample at `start` and return the exclusive end
/// of the candidate.
///
/// The cursor stops on the inactive sample that overruns the tolerance
/// without advancing past it, so the result is `cursor - inactive_run`.
fn candidate_end(samples: &[Sample], start: usize, params: &BoutParams) -> usize {
    let mut j = start + 1;
    let mut inactive_run = 0;

    while j < samples.len() {
        if params.is_active(samples[j].value) {
            inactive_run = 0;
        } else {
            inactive_run += 1;
            if inactive_run > params.tolerance {
                break;
            }
        }
        j += 1;
    }

    j - inactive_run
}

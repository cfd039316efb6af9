//! Persistent run counters.
//!
//! Each [`Counter`] is an atomic slot, so one log can be shared with worker
//! threads. Totals are persisted as JSON and picked up by the next run.

use crate::core::bouts::BoutCollection;
use crate::runner::BatchOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Quantities tracked by the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    SubjectsProcessed,
    SamplesScanned,
    BoutsCommitted,
    /// Candidates shorter than the minimum duration
    CandidatesRejected,
    ReportsExported,
    /// Runs stopped before every subject was segmented
    RunsCancelled,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::SubjectsProcessed,
        Counter::SamplesScanned,
        Counter::BoutsCommitted,
        Counter::CandidatesRejected,
        Counter::ReportsExported,
        Counter::RunsCancelled,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Counter::SubjectsProcessed => "Subjects processed",
            Counter::SamplesScanned => "Samples scanned",
            Counter::BoutsCommitted => "Bouts committed",
            Counter::CandidatesRejected => "Candidates rejected",
            Counter::ReportsExported => "Reports exported",
            Counter::RunsCancelled => "Cancelled runs",
        }
    }
}

/// Plain counter values, as persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunTotals {
    pub subjects_processed: u64,
    pub samples_scanned: u64,
    pub bouts_committed: u64,
    pub candidates_rejected: u64,
    pub reports_exported: u64,
    pub runs_cancelled: u64,
}

impl RunTotals {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::SubjectsProcessed => self.subjects_processed,
            Counter::SamplesScanned => self.samples_scanned,
            Counter::BoutsCommitted => self.bouts_committed,
            Counter::CandidatesRejected => self.candidates_rejected,
            Counter::ReportsExported => self.reports_exported,
            Counter::RunsCancelled => self.runs_cancelled,
        }
    }

    fn from_fn(mut value: impl FnMut(Counter) -> u64) -> Self {
        Self {
            subjects_processed: value(Counter::SubjectsProcessed),
            samples_scanned: value(Counter::SamplesScanned),
            bouts_committed: value(Counter::BoutsCommitted),
            candidates_rejected: value(Counter::CandidatesRejected),
            reports_exported: value(Counter::ReportsExported),
            runs_cancelled: value(Counter::RunsCancelled),
        }
    }
}

/// Snapshot of the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(flatten)]
    pub totals: RunTotals,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatsFile {
    #[serde(flatten)]
    totals: RunTotals,
    last_updated: DateTime<Utc>,
}

/// Counters for the current process, optionally carried over from disk.
#[derive(Debug)]
pub struct RunLog {
    counters: [AtomicU64; Counter::ALL.len()],
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a run log backed by `path`, picking up any totals saved there.
    pub fn with_persistence(path: PathBuf) -> Self {
        let log = Self {
            persist_path: Some(path),
            ..Self::new()
        };

        match log.read_totals() {
            Ok(Some(totals)) => log.restore(&totals),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not load previous run stats"),
        }

        log
    }

    pub fn add(&self, counter: Counter, amount: u64) {
        self.counters[counter.slot()].fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.slot()].load(Ordering::Relaxed)
    }

    /// Record the results of a segmentation.
    pub fn record_collection(&self, collection: &BoutCollection) {
        self.add(Counter::SubjectsProcessed, collection.subject_count() as u64);
        self.add(Counter::SamplesScanned, collection.stats.samples_scanned);
        self.add(Counter::BoutsCommitted, collection.total_bouts() as u64);
        self.add(Counter::CandidatesRejected, collection.stats.candidates_rejected);
    }

    /// Record a batch run, including whether it was cut short.
    pub fn record_batch(&self, outcome: &BatchOutcome) {
        self.record_collection(&outcome.collection);
        if outcome.is_partial() {
            self.add(Counter::RunsCancelled, 1);
        }
    }

    pub fn record_report_exported(&self) {
        self.add(Counter::ReportsExported, 1);
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals::from_fn(|counter| self.get(counter))
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            totals: self.totals(),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Multi-line text listing every counter.
    pub fn summary(&self) -> String {
        let totals = self.totals();
        let mut text = String::from("Run Statistics:");
        for counter in Counter::ALL {
            text.push_str(&format!("\n- {}: {}", counter.label(), totals.get(counter)));
        }
        text
    }

    /// Save totals to disk. Does nothing without a persistence path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = StatsFile {
            totals: self.totals(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(invalid_data)?;
        std::fs::write(path, json)
    }

    fn read_totals(&self) -> Result<Option<RunTotals>, std::io::Error> {
        let Some(path) = self.persist_path.as_ref().filter(|p| p.exists()) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)?;
        let file: StatsFile = serde_json::from_str(&content).map_err(invalid_data)?;
        Ok(Some(file.totals))
    }

    fn restore(&self, totals: &RunTotals) {
        for counter in Counter::ALL {
            self.counters[counter.slot()].store(totals.get(counter), Ordering::Relaxed);
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.restore(&RunTotals::default());
    }
}

fn invalid_data(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe shared run log.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedRunLog {
    Arc::new(RunLog::with_persistence(path))
}

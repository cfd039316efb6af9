//! Serializable bout reports and their export formats.
//!
//! A report bundles the configuration, per-subject bouts, durations and
//! summaries, and cohort statistics of one segmentation run.

use crate::core::bouts::{Bout, BoutCollection, BoutConfig};
use crate::core::summary::{summarize, BoutSummary, CohortSummary};
use crate::runner::BatchOutcome;
use crate::signal::source::SignalSource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "activity-bouts";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Unique instance identifier (UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// One subject's section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectReport {
    pub bouts: Vec<Bout>,
    /// Bout sample counts, in bout order
    pub durations: Vec<usize>,
    pub summary: BoutSummary,
}

/// Result of one segmentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoutReport {
    pub report_version: String,
    /// When the report was generated (RFC3339)
    pub generated_at_utc: String,
    pub producer: ReportProducer,
    pub config: BoutConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SignalSource>,
    /// Per-subject results keyed by subject id
    pub subjects: BTreeMap<String, SubjectReport>,
    pub cohort: CohortSummary,
    /// Whether some subjects were skipped because the run was cancelled
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

impl BoutReport {
    /// Per-subject summaries in subject order.
    pub fn summaries(&self) -> impl Iterator<Item = (&str, &BoutSummary)> {
        self.subjects
            .iter()
            .map(|(subject, report)| (subject.as_str(), &report.summary))
    }

    pub fn total_bouts(&self) -> usize {
        self.subjects.values().map(|s| s.bouts.len()).sum()
    }
}

/// Builder for bout reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    source: Option<SignalSource>,
}

impl ReportBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            source: None,
        }
    }

    /// Record which signal source the bouts were computed from.
    pub fn with_source(mut self, source: SignalSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a report from a complete collection.
    pub fn build(&self, collection: &BoutCollection, config: &BoutConfig) -> BoutReport {
        let summaries = summarize(collection);
        let cohort = CohortSummary::from_summaries(summaries.values());

        let subjects = collection
            .bouts
            .iter()
            .map(|(subject, bouts)| {
                let report = SubjectReport {
                    bouts: bouts.clone(),
                    durations: collection.durations_for(subject).unwrap_or_default().to_vec(),
                    summary: summaries.get(subject).cloned().unwrap_or_default(),
                };
                (subject.to_string(), report)
            })
            .collect();

        let mut meta = HashMap::new();
        meta.insert(
            "subject_count".to_string(),
            serde_json::Value::from(collection.subject_count()),
        );
        meta.insert(
            "samples_scanned".to_string(),
            serde_json::Value::from(collection.stats.samples_scanned),
        );
        meta.insert(
            "candidates_opened".to_string(),
            serde_json::Value::from(collection.stats.candidates_opened),
        );
        meta.insert(
            "candidates_rejected".to_string(),
            serde_json::Value::from(collection.stats.candidates_rejected),
        );

        BoutReport {
            report_version: REPORT_VERSION.to_string(),
            generated_at_utc: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: Some(self.instance_id.to_string()),
            },
            config: *config,
            source: self.source,
            subjects,
            cohort,
            partial: false,
            meta: Some(meta),
        }
    }

    /// Build a report from a batch run, marking it partial when subjects
    /// were skipped.
    pub fn build_from_outcome(&self, outcome: &BatchOutcome, config: &BoutConfig) -> BoutReport {
        let mut report = self.build(&outcome.collection, config);
        report.partial = outcome.is_partial();

        if report.partial {
            let skipped: Vec<serde_json::Value> = outcome
                .skipped
                .iter()
                .map(|s| serde_json::Value::String(s.to_string()))
                .collect();
            report
                .meta
                .get_or_insert_with(HashMap::new)
                .insert("skipped_subjects".to_string(), serde_json::Value::Array(skipped));
        }

        report
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Export format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Whole report as pretty JSON
    #[default]
    Json,
    /// One JSON object per subject
    Jsonl,
    /// One row per bout
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Jsonl => "jsonl",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "jsonl" => Ok(ReportFormat::Jsonl),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Report export errors.
#[derive(Debug)]
pub enum ReportError {
    Io(String),
    Serialize(String),
    Csv(String),
    UnknownFormat(String),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "IO error: {e}"),
            ReportError::Serialize(e) => write!(f, "Serialize error: {e}"),
            ReportError::Csv(e) => write!(f, "CSV error: {e}"),
            ReportError::UnknownFormat(e) => write!(f, "Unknown report format: {e}"),
        }
    }
}

impl std::error::Error for ReportError {}

#[derive(Serialize)]
struct SubjectLine<'a> {
    subject: &'a str,
    #[serde(flatten)]
    report: &'a SubjectReport,
}

/// Column order of CSV exports, matching the fields of [`Bout`].
pub const CSV_COLUMNS: [&str; 7] = [
    "subject",
    "start_index",
    "end_index",
    "sample_count",
    "aggregate_value",
    "started_at",
    "ended_at",
];

/// Write a report to `path` in the given format.
pub fn write_report(report: &BoutReport, path: &Path, format: ReportFormat) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::Io(e.to_string()))?;
    }

    match format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| ReportError::Serialize(e.to_string()))?;
            std::fs::write(path, json).map_err(|e| ReportError::Io(e.to_string()))
        }
        ReportFormat::Jsonl => {
            let lines = report
                .subjects
                .iter()
                .map(|(subject, report)| serde_json::to_string(&SubjectLine { subject, report }))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ReportError::Serialize(e.to_string()))?;
            std::fs::write(path, lines.join("\n")).map_err(|e| ReportError::Io(e.to_string()))
        }
        ReportFormat::Csv => {
            // Header written by hand so reports without bouts still carry it.
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(path)
                .map_err(|e| ReportError::Csv(e.to_string()))?;
            writer
                .write_record(CSV_COLUMNS)
                .map_err(|e| ReportError::Csv(e.to_string()))?;
            for bout in report.subjects.values().flat_map(|s| s.bouts.iter()) {
                writer
                    .serialize(bout)
                    .map_err(|e| ReportError::Csv(e.to_string()))?;
            }
            writer.flush().map_err(|e| ReportError::Io(e.to_string()))
        }
    }
}

/// Read a report previously written as JSON.
pub fn read_report(path: &Path) -> Result<BoutReport, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ReportError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bouts::segment;
    use crate::signal::types::{Signal, SignalSet, SubjectId};
    use chrono::TimeZone;

    fn collection() -> (BoutCollection, BoutConfig) {
        let start = Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap();
        let values = [
            0.0, 0.0, 15.0, 20.0, 25.0, 18.0, 5.0, 22.0, 19.0, 16.0, 0.0, 0.0, 0.0, 30.0, 25.0,
            20.0, 18.0, 22.0, 15.0, 0.0,
        ];
        let mut signals = SignalSet::new();
        signals.insert(
            SubjectId::new("101"),
            Signal::from_minutes("101".into(), start, &values),
        );
        signals.insert(SubjectId::new("102"), Signal::new("102".into(), Vec::new()));

        let config = BoutConfig::new(10.0, 3, 1);
        (segment(&signals, &config).unwrap(), config)
    }

    #[test]
    fn test_builder_instance_id() {
        assert_ne!(ReportBuilder::new().instance_id(), ReportBuilder::new().instance_id());
    }

    #[test]
    fn test_report_contents() {
        let (collection, config) = collection();
        let report = ReportBuilder::new().build(&collection, &config);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.config, config);
        assert!(!report.partial);
        assert_eq!(report.total_bouts(), 2);

        let first = &report.subjects["101"];
        assert_eq!(first.durations, vec![7, 6]);
        assert_eq!(first.summary.total_aggregate_value, 254.0);

        let empty = &report.subjects["102"];
        assert!(empty.bouts.is_empty());
        assert_eq!(empty.summary.total_bouts, 0);

        assert_eq!(report.cohort.subjects, 2);
        let meta = report.meta.as_ref().unwrap();
        assert_eq!(meta["candidates_rejected"], serde_json::json!(1));
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let (collection, config) = collection();
        let report = ReportBuilder::new()
            .with_source("fitbit:steps".parse().unwrap())
            .build(&collection, &config);

        write_report(&report, &path, ReportFormat::Json).unwrap();
        let loaded = read_report(&path).unwrap();

        assert_eq!(loaded.report_version, report.report_version);
        assert_eq!(loaded.producer, report.producer);
        assert_eq!(loaded.config, report.config);
        assert_eq!(loaded.source, report.source);
        assert_eq!(loaded.subjects["101"].bouts, report.subjects["101"].bouts);
        assert_eq!(loaded.subjects["101"].durations, vec![7, 6]);
        assert_eq!(loaded.cohort.subjects, 2);
    }

    #[test]
    fn test_csv_one_row_per_bout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bouts.csv");
        let (collection, config) = collection();
        let report = ReportBuilder::new().build(&collection, &config);

        write_report(&report, &path, ReportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("subject,start_index,end_index,sample_count"));
        assert!(lines[1].starts_with("101,2,9,7,124"));
    }

    #[test]
    fn test_csv_without_bouts_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let config = BoutConfig::default();
        let report = ReportBuilder::new().build(&BoutCollection::new(), &config);

        write_report(&report, &path, ReportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec![CSV_COLUMNS.join(",")]);
    }

    #[test]
    fn test_jsonl_one_line_per_subject() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bouts.jsonl");
        let (collection, config) = collection();
        let report = ReportBuilder::new().build(&collection, &config);

        write_report(&report, &path, ReportFormat::Jsonl).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["subject"], "101");
        assert_eq!(lines[0]["durations"], serde_json::json!([7, 6]));
    }

    #[test]
    fn test_cancelled_outcome_is_partial() {
        use crate::runner::BatchRunner;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let start = Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap();
        let mut signals = SignalSet::new();
        for id in ["101", "102", "103"] {
            signals.insert(
                SubjectId::new(id),
                Signal::from_minutes(id.into(), start, &[20.0; 10]),
            );
        }
        let config = BoutConfig::default();
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = flag.clone();
        let outcome = BatchRunner::new(1)
            .with_cancel_flag(flag)
            .with_progress(move |_| trigger.store(true, Ordering::SeqCst))
            .run(&signals, &config)
            .unwrap();

        let report = ReportBuilder::new().build_from_outcome(&outcome, &config);

        assert!(report.partial);
        assert_eq!(report.subjects.keys().collect::<Vec<_>>(), vec!["101"]);
        assert_eq!(report.subjects["101"].durations, vec![10]);
        let meta = report.meta.unwrap();
        assert_eq!(meta["skipped_subjects"], serde_json::json!(["102", "103"]));
    }

    #[test]
    fn test_complete_outcome_is_not_partial() {
        use crate::runner::BatchRunner;

        let config = BoutConfig::new(10.0, 3, 1);
        let start = Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap();
        let mut signals = SignalSet::new();
        signals.insert(
            SubjectId::new("101"),
            Signal::from_minutes("101".into(), start, &[20.0; 10]),
        );
        let outcome = BatchRunner::new(2).run(&signals, &config).unwrap();

        let report = ReportBuilder::new().build_from_outcome(&outcome, &config);
        assert!(!report.partial);
        assert!(!report.meta.unwrap().contains_key("skipped_subjects"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("csv".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert!("xml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Jsonl.extension(), "jsonl");
    }
}

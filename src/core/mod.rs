//! Core functionality for activity bout analysis.
//!
//! This module contains:
//! - Bout segmentation over per-subject signals
//! - Per-subject and cohort summaries
//! - Report building and export

pub mod bouts;
pub mod report;
pub mod summary;

// Re-export commonly used types
pub use bouts::{
    segment, segment_signal, Bout, BoutCollection, BoutConfig, BoutError, BoutParams, ScanStats,
    SubjectBouts,
};
pub use report::{
    read_report, write_report, BoutReport, ReportBuilder, ReportError, ReportFormat,
    PRODUCER_NAME, REPORT_VERSION,
};
pub use summary::{
    clinical_correlation, pearson, summarize, BoutSummary, ClinicalCorrelation, CohortSummary,
    SummaryMetric,
};

//! Signal preparation for the Activity Bouts engine.
//!
//! This module turns wearable exports into per-subject signals:
//! - Fitbit hourly-wide minute exports and ActiGraph epoch exports
//! - Per-subject clinical key/value records
//! - Sorting, deduplication and optional densification onto a fixed grid

pub mod actigraph;
pub mod builder;
pub mod clinical;
pub mod densify;
pub mod error;
pub mod fitbit;
pub mod source;
pub mod types;

use chrono_tz::Tz;
use std::path::Path;

// Re-export commonly used types
pub use actigraph::load_actigraph;
pub use builder::{localize, SignalBuilder};
pub use clinical::{load_clinical, ClinicalRecord, ClinicalSet, ClinicalValue};
pub use densify::densify;
pub use error::SignalError;
pub use fitbit::load_fitbit;
pub use source::{ActigraphColumn, FitbitMeasure, SignalSource};
pub use types::{Sample, Signal, SignalSet, SubjectId};

/// Load per-subject signals for `source` from a file or directory.
pub fn load_signals(source: SignalSource, path: &Path, tz: Tz) -> Result<SignalSet, SignalError> {
    match source {
        SignalSource::Fitbit(measure) => load_fitbit(path, measure, tz),
        SignalSource::Actigraph(column) => load_actigraph(path, column, tz),
    }
}

//! Activity Bouts - segmentation of wearable activity signals into bouts.
//!
//! A bout is a sustained stretch of samples at or above an activity
//! threshold. Short dips are tolerated and bouts shorter than a minimum
//! duration are discarded. Each subject's signal is processed independently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Activity Bouts                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Signal    │──▶│   Runner    │──▶│   Summary   │       │
//! │  │  (loaders)  │   │ (segmenter) │   │  (cohort)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                  │              │
//! │                           ▼                  ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │   Run Log   │   │   Report    │       │
//! │                    │  (counters) │   │ (json/csv)  │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use activity_bouts::core::{segment, BoutConfig};
//! use activity_bouts::signal::{Signal, SignalSet, SubjectId};
//! use chrono::{TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap();
//! let mut signals = SignalSet::new();
//! signals.insert(
//!     SubjectId::new("101"),
//!     Signal::from_minutes("101".into(), start, &[0.0, 20.0, 25.0, 30.0, 22.0, 0.0, 0.0]),
//! );
//!
//! let bouts = segment(&signals, &BoutConfig::new(10.0, 3, 1)).unwrap();
//! assert_eq!(bouts.total_bouts(), 1);
//! ```

pub mod config;
pub mod core;
pub mod runner;
pub mod signal;
pub mod runlog;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use self::core::{
    segment, segment_signal, Bout, BoutCollection, BoutConfig, BoutError, BoutReport,
    ReportBuilder, ReportFormat,
};
pub use runner::{BatchOutcome, BatchRunner};
pub use signal::{load_signals, Sample, Signal, SignalError, SignalSet, SignalSource, SubjectId};
pub use runlog::{Counter, RunLog, RunStats, SharedRunLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! The closed set of supported signal sources.
//!
//! Each source names a file format and the column within it that becomes the
//! segmented value.

use crate::signal::error::SignalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-minute measures exported by Fitbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitbitMeasure {
    Mets,
    Steps,
    Calories,
    Intensities,
}

impl FitbitMeasure {
    pub const ALL: [FitbitMeasure; 4] = [
        FitbitMeasure::Mets,
        FitbitMeasure::Steps,
        FitbitMeasure::Calories,
        FitbitMeasure::Intensities,
    ];

    /// Token identifying the measure in export file names.
    pub fn file_token(&self) -> &'static str {
        match self {
            FitbitMeasure::Mets => "METs",
            FitbitMeasure::Steps => "Steps",
            FitbitMeasure::Calories => "Calories",
            FitbitMeasure::Intensities => "Intensities",
        }
    }

    /// Prefix of the sixty per-minute columns (`Steps00` .. `Steps59`).
    pub fn column_prefix(&self) -> &'static str {
        match self {
            FitbitMeasure::Mets => "MET",
            FitbitMeasure::Steps => "Steps",
            FitbitMeasure::Calories => "Calories",
            FitbitMeasure::Intensities => "Intensity",
        }
    }

    /// Find the measure whose token appears in a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| name.contains(m.file_token()))
    }
}

/// Columns of an ActiGraph minute-epoch export, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActigraphColumn {
    Axis1,
    Axis2,
    Axis3,
    Steps,
    Lux,
    InclinometerOff,
    InclinometerStanding,
    InclinometerSitting,
    InclinometerLying,
}

impl ActigraphColumn {
    pub const ALL: [ActigraphColumn; 9] = [
        ActigraphColumn::Axis1,
        ActigraphColumn::Axis2,
        ActigraphColumn::Axis3,
        ActigraphColumn::Steps,
        ActigraphColumn::Lux,
        ActigraphColumn::InclinometerOff,
        ActigraphColumn::InclinometerStanding,
        ActigraphColumn::InclinometerSitting,
        ActigraphColumn::InclinometerLying,
    ];

    /// Zero-based position of the column in a data row.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActigraphColumn::Axis1 => "Axis1",
            ActigraphColumn::Axis2 => "Axis2",
            ActigraphColumn::Axis3 => "Axis3",
            ActigraphColumn::Steps => "Steps",
            ActigraphColumn::Lux => "Lux",
            ActigraphColumn::InclinometerOff => "InclinometerOff",
            ActigraphColumn::InclinometerStanding => "InclinometerStanding",
            ActigraphColumn::InclinometerSitting => "InclinometerSitting",
            ActigraphColumn::InclinometerLying => "InclinometerLying",
        }
    }
}

/// Which file format and column feed the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "column", rename_all = "snake_case")]
pub enum SignalSource {
    Fitbit(FitbitMeasure),
    Actigraph(ActigraphColumn),
}

impl Default for SignalSource {
    fn default() -> Self {
        SignalSource::Fitbit(FitbitMeasure::Steps)
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Fitbit(m) => write!(f, "fitbit:{}", m.file_token().to_lowercase()),
            SignalSource::Actigraph(c) => write!(f, "actigraph:{}", c.name().to_lowercase()),
        }
    }
}

impl FromStr for SignalSource {
    type Err = SignalError;

    /// Parse `fitbit:<measure>` or `actigraph:<column>` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let (format, column) = normalized
            .split_once(':')
            .ok_or_else(|| SignalError::UnknownMeasure(s.to_string()))?;

        match format {
            "fitbit" => FitbitMeasure::ALL
                .into_iter()
                .find(|m| {
                    m.file_token().eq_ignore_ascii_case(column)
                        || m.column_prefix().eq_ignore_ascii_case(column)
                })
                .map(SignalSource::Fitbit)
                .ok_or_else(|| SignalError::UnknownMeasure(s.to_string())),
            "actigraph" => ActigraphColumn::ALL
                .into_iter()
                .find(|c| c.name().eq_ignore_ascii_case(column))
                .map(SignalSource::Actigraph)
                .ok_or_else(|| SignalError::UnknownMeasure(s.to_string())),
            _ => Err(SignalError::UnknownMeasure(s.to_string())),
        }
    }
}

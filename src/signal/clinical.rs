//! Per-subject clinical records (`101_clinical.txt` with `key: value` lines).

use crate::signal::builder::{file_name, matching_files};
use crate::signal::error::SignalError;
use crate::signal::types::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A typed clinical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClinicalValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ClinicalValue {
    /// Values containing a `.` are read as floats, others as integers;
    /// anything that fails both stays text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let number = if raw.contains('.') {
            raw.parse::<f64>().ok().map(ClinicalValue::Float)
        } else {
            raw.parse::<i64>().ok().map(ClinicalValue::Int)
        };
        number.unwrap_or_else(|| ClinicalValue::Text(raw.to_string()))
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ClinicalValue::Int(v) => Some(*v as f64),
            ClinicalValue::Float(v) => Some(*v),
            ClinicalValue::Text(_) => None,
        }
    }
}

/// All fields recorded for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub subject: SubjectId,
    pub fields: BTreeMap<String, ClinicalValue>,
}

impl ClinicalRecord {
    pub fn get(&self, field: &str) -> Option<&ClinicalValue> {
        self.fields.get(field)
    }
}

/// Clinical records keyed by subject.
pub type ClinicalSet = BTreeMap<SubjectId, ClinicalRecord>;

/// Load a single clinical file or every `.txt` file in a directory.
pub fn load_clinical(path: &Path) -> Result<ClinicalSet, SignalError> {
    if !path.exists() {
        return Err(SignalError::NotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        let files = matching_files(path, |name| name.ends_with(".txt"))?;
        if files.is_empty() {
            return Err(SignalError::NoFiles {
                path: path.to_path_buf(),
                kind: ".txt".to_string(),
            });
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut records = ClinicalSet::new();
    for file in &files {
        let record = load_clinical_file(file)?;
        records.insert(record.subject.clone(), record);
    }
    Ok(records)
}

/// Parse one clinical file. Lines without a `:` are ignored.
pub fn load_clinical_file(path: &Path) -> Result<ClinicalRecord, SignalError> {
    let content = std::fs::read_to_string(path).map_err(|e| SignalError::io(path, e))?;

    let fields = content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), ClinicalValue::parse(value)))
        .collect();

    Ok(ClinicalRecord {
        subject: SubjectId::from_file_name(file_name(path)),
        fields,
    })
}

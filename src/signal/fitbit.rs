//! Fitbit hourly-wide minute exports.
//!
//! Each row holds one hour: an `ActivityHour` timestamp followed by sixty
//! per-minute columns (`Steps00` .. `Steps59`). Rows are expanded into one
//! sample per minute.

use crate::signal::builder::{file_name, localize, matching_files, parse_value, SignalBuilder};
use crate::signal::error::SignalError;
use crate::signal::source::FitbitMeasure;
use crate::signal::types::{Sample, SignalSet, SubjectId};
use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;
use std::path::Path;

/// Timestamp format of the `ActivityHour` column.
pub const ACTIVITY_HOUR_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

const HOUR_COLUMN: &str = "ActivityHour";
const MINUTES_PER_HOUR: usize = 60;

/// Load one measure from a single file or from every matching file in a
/// directory.
///
/// For a single file the measure must also appear in its name; a mismatch is
/// reported as [`SignalError::UnknownMeasure`].
pub fn load_fitbit(path: &Path, measure: FitbitMeasure, tz: Tz) -> Result<SignalSet, SignalError> {
    if !path.exists() {
        return Err(SignalError::NotFound(path.to_path_buf()));
    }

    let mut builder = SignalBuilder::new();

    if path.is_dir() {
        let files = matching_files(path, |name| name.contains(measure.file_token()))?;
        if files.is_empty() {
            return Err(SignalError::NoFiles {
                path: path.to_path_buf(),
                kind: measure.file_token().to_string(),
            });
        }
        tracing::info!(
            measure = measure.file_token(),
            files = files.len(),
            "Loading Fitbit directory"
        );
        for file in &files {
            load_fitbit_file(file, measure, tz, &mut builder)?;
        }
    } else {
        let name = file_name(path);
        if FitbitMeasure::from_file_name(name) != Some(measure) {
            return Err(SignalError::UnknownMeasure(format!(
                "cannot find {} in file name {name}",
                measure.file_token()
            )));
        }
        load_fitbit_file(path, measure, tz, &mut builder)?;
    }

    Ok(builder.finish())
}

/// Append the samples of one export file to `builder`.
///
/// Returns the number of samples added.
pub fn load_fitbit_file(
    path: &Path,
    measure: FitbitMeasure,
    tz: Tz,
    builder: &mut SignalBuilder,
) -> Result<usize, SignalError> {
    let subject = SubjectId::from_file_name(file_name(path));

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SignalError::io(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| SignalError::parse(path, e.to_string()))?
        .clone();

    let hour_index = headers
        .iter()
        .position(|h| h == HOUR_COLUMN)
        .ok_or_else(|| SignalError::parse(path, format!("missing {HOUR_COLUMN} column")))?;

    let minute_indices = (0..MINUTES_PER_HOUR)
        .map(|minute| {
            let column = format!("{}{minute:02}", measure.column_prefix());
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| SignalError::parse(path, format!("missing {column} column")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut added = 0;
    for (row, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = row + 2;
        let record = record.map_err(|e| SignalError::parse(path, format!("line {line}: {e}")))?;

        let hour_text = record.get(hour_index).unwrap_or_default();
        let hour = NaiveDateTime::parse_from_str(hour_text, ACTIVITY_HOUR_FORMAT).map_err(|e| {
            SignalError::parse(path, format!("line {line}: bad {HOUR_COLUMN} '{hour_text}': {e}"))
        })?;

        for (minute, &index) in minute_indices.iter().enumerate() {
            match record.get(index).and_then(parse_value) {
                Some(value) => {
                    let timestamp = localize(hour + Duration::minutes(minute as i64), tz)?;
                    builder.push(&subject, Sample::new(timestamp, value));
                    added += 1;
                }
                None => builder.record_dropped(),
            }
        }
    }

    tracing::debug!(subject = %subject, file = ?path, samples = added, "Loaded Fitbit file");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn header(prefix: &str) -> String {
        let minutes: Vec<String> = (0..60).map(|m| format!("{prefix}{m:02}")).collect();
        format!("ActivityHour,{}", minutes.join(","))
    }

    fn row(hour: &str, values: impl Fn(usize) -> String) -> String {
        let cells: Vec<String> = (0..60).map(values).collect();
        format!("{hour},{}", cells.join(","))
    }

    #[test]
    fn test_load_single_file_expands_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101_minuteSteps_20141021_20141123.csv");
        let content = format!(
            "{}\n{}\n{}\n",
            header("Steps"),
            row("10/21/2014 10:00:00 AM", |m| m.to_string()),
            row("10/21/2014 11:00:00 AM", |_| "0".to_string()),
        );
        std::fs::write(&path, content).unwrap();

        let signals = load_fitbit(&path, FitbitMeasure::Steps, Tz::UTC).unwrap();
        let signal = &signals[&SubjectId::new("101")];

        assert_eq!(signal.len(), 120);
        assert_eq!(
            signal.samples[0].timestamp,
            Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap()
        );
        assert_eq!(signal.samples[59].value, 59.0);
        assert_eq!(
            signal.samples[60].timestamp,
            Utc.with_ymd_and_hms(2014, 10, 21, 11, 0, 0).unwrap()
        );
        assert!(signal.is_strictly_ordered());
    }

    #[test]
    fn test_pm_hours_and_mets_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("102_minuteMETs_20141021.csv");
        let content = format!(
            "{}\n{}\n",
            header("MET"),
            row("10/21/2014 1:00:00 PM", |_| "10".to_string()),
        );
        std::fs::write(&path, content).unwrap();

        let signals = load_fitbit(&path, FitbitMeasure::Mets, Tz::UTC).unwrap();
        let signal = &signals[&SubjectId::new("102")];
        assert_eq!(
            signal.samples[0].timestamp,
            Utc.with_ymd_and_hms(2014, 10, 21, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_cells_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("103_minuteSteps.csv");
        let content = format!(
            "{}\n{}\n",
            header("Steps"),
            row("10/21/2014 10:00:00 AM", |m| if m % 2 == 0 {
                "5".to_string()
            } else {
                String::new()
            }),
        );
        std::fs::write(&path, content).unwrap();

        let signals = load_fitbit(&path, FitbitMeasure::Steps, Tz::UTC).unwrap();
        assert_eq!(signals[&SubjectId::new("103")].len(), 30);
    }

    #[test]
    fn test_measure_must_match_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101_minuteCalories.csv");
        std::fs::write(&path, header("Calories")).unwrap();

        let err = load_fitbit(&path, FitbitMeasure::Steps, Tz::UTC).unwrap_err();
        assert!(matches!(err, SignalError::UnknownMeasure(_)));
    }

    #[test]
    fn test_missing_minute_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101_minuteSteps.csv");
        std::fs::write(&path, "ActivityHour,Steps00\n10/21/2014 10:00:00 AM,1\n").unwrap();

        let err = load_fitbit(&path, FitbitMeasure::Steps, Tz::UTC).unwrap_err();
        assert!(matches!(err, SignalError::Parse { .. }));
    }

    #[test]
    fn test_missing_path() {
        let err = load_fitbit(
            Path::new("/nonexistent/101_minuteSteps.csv"),
            FitbitMeasure::Steps,
            Tz::UTC,
        )
        .unwrap_err();
        assert!(matches!(err, SignalError::NotFound(_)));
    }
}

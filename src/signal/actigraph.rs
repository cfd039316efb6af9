//! ActiGraph minute-epoch exports.
//!
//! A file starts with a fixed ten-line header carrying `Start Time` and
//! `Start Date`, followed by header-less rows in [`ActigraphColumn`] order.
//! Row `k` is the epoch starting `k` minutes after the recorded start.

use crate::signal::builder::{file_name, localize, matching_files, parse_value, SignalBuilder};
use crate::signal::error::SignalError;
use crate::signal::source::ActigraphColumn;
use crate::signal::types::{Sample, SignalSet, SubjectId};
use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;
use std::path::Path;

/// Number of header lines preceding the epoch rows.
pub const HEADER_LINES: usize = 10;

/// Format of the combined `Start Date` and `Start Time` header values.
pub const START_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Load one column from a single file or every `.csv` file in a directory.
pub fn load_actigraph(
    path: &Path,
    column: ActigraphColumn,
    tz: Tz,
) -> Result<SignalSet, SignalError> {
    if !path.exists() {
        return Err(SignalError::NotFound(path.to_path_buf()));
    }

    let mut builder = SignalBuilder::new();

    if path.is_dir() {
        let files = matching_files(path, |name| name.ends_with(".csv"))?;
        if files.is_empty() {
            return Err(SignalError::NoFiles {
                path: path.to_path_buf(),
                kind: "CSV".to_string(),
            });
        }
        tracing::info!(column = column.name(), files = files.len(), "Loading ActiGraph directory");
        for file in &files {
            load_actigraph_file(file, column, tz, &mut builder)?;
        }
    } else {
        load_actigraph_file(path, column, tz, &mut builder)?;
    }

    Ok(builder.finish())
}

/// Append the samples of one ActiGraph file to `builder`.
///
/// Returns the number of samples added.
pub fn load_actigraph_file(
    path: &Path,
    column: ActigraphColumn,
    tz: Tz,
    builder: &mut SignalBuilder,
) -> Result<usize, SignalError> {
    let subject = SubjectId::from_file_name(file_name(path));
    let content = std::fs::read_to_string(path).map_err(|e| SignalError::io(path, e))?;

    let mut sections = content.splitn(HEADER_LINES + 1, '\n');
    let header: Vec<&str> = sections.by_ref().take(HEADER_LINES).collect();
    if header.len() < HEADER_LINES {
        return Err(SignalError::parse(
            path,
            format!("expected {HEADER_LINES} header lines, found {}", header.len()),
        ));
    }
    let body = sections.next().unwrap_or_default();

    let start = parse_start(&header).ok_or_else(|| {
        SignalError::parse(path, "missing or malformed Start Date / Start Time header")
    })?;
    // Epochs are elapsed minutes, so the zone applies to the start only.
    let start = localize(start, tz)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut added = 0;
    for (epoch, record) in reader.records().enumerate() {
        let line = HEADER_LINES + epoch + 1;
        let record = record.map_err(|e| SignalError::parse(path, format!("line {line}: {e}")))?;

        match record.get(column.index()).and_then(parse_value) {
            Some(value) => {
                let timestamp = start + Duration::minutes(epoch as i64);
                builder.push(&subject, Sample::new(timestamp, value));
                added += 1;
            }
            None => builder.record_dropped(),
        }
    }

    tracing::debug!(subject = %subject, file = ?path, samples = added, "Loaded ActiGraph file");
    Ok(added)
}

/// Combine the `Start Date` and `Start Time` header values.
fn parse_start(header: &[&str]) -> Option<NaiveDateTime> {
    let mut date = None;
    let mut time = None;

    for line in header {
        let line = line.trim();
        // "Start Time 10:00:00" -> third space-separated field onwards
        let value = line.splitn(3, ' ').nth(2).map(str::trim);
        if line.starts_with("Start Time") {
            time = value;
        } else if line.starts_with("Start Date") {
            date = value;
        }
    }

    let combined = format!("{} {}", date?, time?);
    NaiveDateTime::parse_from_str(&combined, START_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const HEADER: &str = "------------ Data File Created By ActiGraph -----------\n\
Serial Number: MOS2E22180349\n\
Start Time 10:00:00\n\
Start Date 10/21/2014\n\
Epoch Period (hh:mm:ss) 00:01:00\n\
Download Time 12:00:00\n\
Download Date 10/28/2014\n\
Current Memory Address: 0\n\
Current Battery Voltage: 4.19     Mode = 61\n\
--------------------------------------------------\n";

    #[test]
    fn test_parse_start() {
        let header: Vec<&str> = HEADER.lines().collect();
        let start = parse_start(&header).unwrap();
        assert_eq!(start.to_string(), "2014-10-21 10:00:00");
    }

    #[test]
    fn test_load_file_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101_week1.csv");
        let content = format!(
            "{HEADER}120,80,40,12,0,0,60,0,0\n0,0,0,0,5,0,0,60,0\n300,200,100,30,10,0,60,0,0\n"
        );
        std::fs::write(&path, content).unwrap();

        let signals = load_actigraph(&path, ActigraphColumn::Steps, Tz::UTC).unwrap();
        let signal = &signals[&SubjectId::new("101")];

        assert_eq!(signal.values().collect::<Vec<_>>(), vec![12.0, 0.0, 30.0]);
        assert_eq!(
            signal.samples[2].timestamp,
            Utc.with_ymd_and_hms(2014, 10, 21, 10, 2, 0).unwrap()
        );
    }

    #[test]
    fn test_epoch_timing_survives_dropped_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("102_week1.csv");
        let content = format!("{HEADER}1,0,0,5,0,0,0,0,0\n2,0,0,,0,0,0,0,0\n3,0,0,7,0,0,0,0,0\n");
        std::fs::write(&path, content).unwrap();

        let signals = load_actigraph(&path, ActigraphColumn::Steps, Tz::UTC).unwrap();
        let signal = &signals[&SubjectId::new("102")];

        assert_eq!(signal.len(), 2);
        assert_eq!(
            signal.samples[1].timestamp,
            Utc.with_ymd_and_hms(2014, 10, 21, 10, 2, 0).unwrap()
        );
    }

    #[test]
    fn test_directory_concatenates_weeks() {
        let dir = tempfile::tempdir().unwrap();
        let week2_header = HEADER.replace("10/21/2014", "10/28/2014");
        std::fs::write(
            dir.path().join("101_week2.csv"),
            format!("{week2_header}9,0,0,0,0,0,0,0,0\n"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("101_week1.csv"),
            format!("{HEADER}4,0,0,0,0,0,0,0,0\n"),
        )
        .unwrap();
        std::fs::write(dir.path().join("dataDictionary.txt"), "ignored").unwrap();

        let signals = load_actigraph(dir.path(), ActigraphColumn::Axis1, Tz::UTC).unwrap();
        let signal = &signals[&SubjectId::new("101")];
        assert_eq!(signal.values().collect::<Vec<_>>(), vec![4.0, 9.0]);
    }

    fn write_rows(dir: &Path, name: &str, date: &str, time: &str, rows: usize) -> std::path::PathBuf {
        let header = HEADER
            .replace("10/21/2014", date)
            .replace("Start Time 10:00:00", &format!("Start Time {time}"));
        let body: String = (0..rows).map(|_| "0,0,0,20,0,0,60,0,0\n").collect();
        let path = dir.join(name);
        std::fs::write(&path, format!("{header}{body}")).unwrap();
        path
    }

    fn assert_minute_spaced(signal: &crate::signal::types::Signal) {
        for pair in signal.samples.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(1));
        }
    }

    #[test]
    fn test_epochs_cross_spring_forward() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rows(dir.path(), "101_week1.csv", "03/08/2015", "01:00:00", 180);

        let signals = load_actigraph(&path, ActigraphColumn::Steps, chrono_tz::America::New_York)
            .unwrap();
        let signal = &signals[&SubjectId::new("101")];

        assert_eq!(signal.len(), 180);
        assert_minute_spaced(signal);
        assert_eq!(
            signal.samples[0].timestamp,
            Utc.with_ymd_and_hms(2015, 3, 8, 6, 0, 0).unwrap()
        );
        assert_eq!(
            signal.samples[179].timestamp,
            Utc.with_ymd_and_hms(2015, 3, 8, 8, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_epochs_cross_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rows(dir.path(), "101_week1.csv", "11/01/2015", "01:00:00", 180);

        let signals = load_actigraph(&path, ActigraphColumn::Steps, chrono_tz::America::New_York)
            .unwrap();
        let signal = &signals[&SubjectId::new("101")];

        assert_eq!(signal.len(), 180);
        assert_minute_spaced(signal);
        // 01:00 is ambiguous; the earlier (daylight) instant is used.
        assert_eq!(
            signal.samples[0].timestamp,
            Utc.with_ymd_and_hms(2015, 11, 1, 5, 0, 0).unwrap()
        );
        assert_eq!(
            signal.samples[179].timestamp,
            Utc.with_ymd_and_hms(2015, 11, 1, 7, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_short_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("101_week1.csv");
        std::fs::write(&path, "Start Time 10:00:00\nStart Date 10/21/2014\n").unwrap();

        let err = load_actigraph(&path, ActigraphColumn::Steps, Tz::UTC).unwrap_err();
        assert!(matches!(err, SignalError::Parse { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_actigraph(dir.path(), ActigraphColumn::Steps, Tz::UTC).unwrap_err();
        assert!(matches!(err, SignalError::NoFiles { .. }));
    }
}

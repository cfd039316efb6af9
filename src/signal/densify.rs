//! Filling time gaps so that sample adjacency matches time adjacency.
//!
//! Bout segmentation counts samples, not minutes. A signal with missing rows
//! would let a bout span a real gap, so callers that cannot guarantee a dense
//! grid can densify first.

use crate::signal::types::{Sample, Signal};
use chrono::Duration;

/// Insert `fill_value` placeholders wherever consecutive samples are more
/// than `step` apart.
///
/// Placeholders are placed at `previous + k * step` strictly before the next
/// real sample. Pick a `fill_value` below the segmentation threshold so the
/// placeholders count as inactive. Out-of-order or duplicate timestamps are
/// passed through untouched. A non-positive `step` returns the signal as is.
pub fn densify(signal: &Signal, step: Duration, fill_value: f64) -> Signal {
    if step <= Duration::zero() || signal.samples.len() < 2 {
        return signal.clone();
    }

    let mut samples = Vec::with_capacity(signal.samples.len());
    let mut inserted = 0usize;

    let mut previous: Option<&Sample> = None;
    for sample in &signal.samples {
        if let Some(previous) = previous {
            let mut cursor = previous.timestamp + step;
            while cursor < sample.timestamp {
                samples.push(Sample::new(cursor, fill_value));
                inserted += 1;
                cursor = cursor + step;
            }
        }
        samples.push(*sample);
        previous = Some(sample);
    }

    if inserted > 0 {
        tracing::debug!(subject = %signal.subject, inserted, "Densified signal");
    }

    Signal::new(signal.subject.clone(), samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 10, 21, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_gap_is_filled() {
        let signal = Signal::new(
            "101".into(),
            vec![Sample::new(at(0), 20.0), Sample::new(at(4), 30.0)],
        );

        let dense = densify(&signal, Duration::minutes(1), 0.0);

        assert_eq!(dense.len(), 5);
        assert_eq!(
            dense.values().collect::<Vec<_>>(),
            vec![20.0, 0.0, 0.0, 0.0, 30.0]
        );
        assert_eq!(dense.samples[2].timestamp, at(2));
        assert!(dense.is_strictly_ordered());
    }

    #[test]
    fn test_dense_signal_unchanged() {
        let signal = Signal::from_minutes("101".into(), at(0), &[1.0, 2.0, 3.0]);
        assert_eq!(densify(&signal, Duration::minutes(1), 0.0), signal);
    }

    #[test]
    fn test_unaligned_gap() {
        let signal = Signal::new(
            "101".into(),
            vec![
                Sample::new(at(0), 1.0),
                Sample::new(at(2) + Duration::seconds(30), 1.0),
            ],
        );

        let dense = densify(&signal, Duration::minutes(1), -1.0);
        assert_eq!(dense.len(), 4);
        assert_eq!(dense.samples[2].timestamp, at(2));
        assert_eq!(dense.samples[2].value, -1.0);
    }

    #[test]
    fn test_unordered_passthrough() {
        let signal = Signal::new(
            "101".into(),
            vec![Sample::new(at(5), 1.0), Sample::new(at(0), 1.0)],
        );
        assert_eq!(densify(&signal, Duration::minutes(1), 0.0).len(), 2);
    }
}

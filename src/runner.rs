//! Parallel batch segmentation.
//!
//! Subjects are independent, so each one becomes a job for a small pool of
//! scoped worker threads. Workers return owned per-subject results over a
//! channel and the calling thread merges them, so no result map is shared.
//!
//! Cancellation lives here rather than in the engine: when the cancel flag is
//! raised, no new subjects are started and the subjects already finished are
//! returned as a partial result.

use crate::core::bouts::{segment_signal, BoutCollection, BoutConfig, BoutError, SubjectBouts};
use crate::signal::types::{Signal, SignalSet, SubjectId};
use crossbeam_channel::{bounded, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub collection: BoutCollection,
    /// Subjects that were segmented
    pub completed: usize,
    /// Subjects never segmented because the run was cancelled
    pub skipped: Vec<SubjectId>,
    /// Whether the cancel flag was raised during the run
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Callback invoked on a worker thread after each subject is segmented.
pub type ProgressFn = dyn Fn(&SubjectId) + Send + Sync;

/// Runs segmentation over many subjects on a worker pool.
#[derive(Clone, Default)]
pub struct BatchRunner {
    workers: usize,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<Arc<ProgressFn>>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("workers", &self.workers)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl BatchRunner {
    /// Create a runner with `workers` threads; `0` uses the available
    /// parallelism.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            cancel: None,
            progress: None,
        }
    }

    /// Stop starting new subjects once `flag` becomes true.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Call `progress` after each subject finishes, before the worker takes
    /// its next job.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&SubjectId) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Number of threads used for `subjects` jobs.
    pub fn worker_count(&self, subjects: usize) -> usize {
        let requested = if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        };
        requested.min(subjects).max(1)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Segment every signal. The configuration is validated once, before any
    /// worker starts.
    pub fn run(&self, signals: &SignalSet, config: &BoutConfig) -> Result<BatchOutcome, BoutError> {
        let params = config.validate()?;
        let workers = self.worker_count(signals.len());

        let (job_tx, job_rx) = bounded::<(&SubjectId, &Signal)>(workers * 2);
        let (result_tx, result_rx) = unbounded::<(SubjectId, SubjectBouts)>();
        let cancel = self.cancel.as_deref();
        let progress = self.progress.as_deref();

        let mut collection = BoutCollection::new();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (subject, signal) in job_rx.iter() {
                        if cancel.map(|c| c.load(Ordering::SeqCst)).unwrap_or(false) {
                            continue;
                        }
                        let result = segment_signal(signal, &params);
                        if let Some(progress) = progress {
                            progress(subject);
                        }
                        if result_tx.send((subject.clone(), result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            for job in signals.iter() {
                if self.is_cancelled() || job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);

            for (subject, result) in result_rx.iter() {
                collection.insert(subject, result);
            }
        });

        let skipped: Vec<SubjectId> = signals
            .keys()
            .filter(|s| !collection.bouts.contains_key(*s))
            .cloned()
            .collect();
        let cancelled = self.is_cancelled();

        if cancelled {
            tracing::warn!(
                completed = collection.subject_count(),
                skipped = skipped.len(),
                "Batch cancelled; keeping completed subjects"
            );
        } else {
            tracing::info!(
                subjects = collection.subject_count(),
                bouts = collection.total_bouts(),
                workers,
                "Batch segmentation complete"
            );
        }

        Ok(BatchOutcome {
            completed: collection.subject_count(),
            collection,
            skipped,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bouts::segment;
    use chrono::{TimeZone, Utc};

    fn signals(count: usize) -> SignalSet {
        let start = Utc.with_ymd_and_hms(2014, 10, 21, 10, 0, 0).unwrap();
        (0..count)
            .map(|n| {
                let subject = SubjectId::new(format!("{}", 100 + n));
                let values: Vec<f64> = (0..240)
                    .map(|i| if (i / (3 + n % 5)) % 3 == 0 { 0.0 } else { 15.0 })
                    .collect();
                let signal = Signal::from_minutes(subject.clone(), start, &values);
                (subject, signal)
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let signals = signals(12);
        let config = BoutConfig::new(10.0, 3, 1);

        let sequential = segment(&signals, &config).unwrap();
        let outcome = BatchRunner::new(4).run(&signals, &config).unwrap();

        assert_eq!(outcome.collection, sequential);
        assert_eq!(outcome.completed, 12);
        assert!(!outcome.cancelled);
        assert!(!outcome.is_partial());
    }

    #[test]
    fn test_cancelled_before_start() {
        let flag = Arc::new(AtomicBool::new(true));
        let outcome = BatchRunner::new(2)
            .with_cancel_flag(flag)
            .run(&signals(5), &BoutConfig::new(10.0, 3, 1))
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.completed, 0);
        assert_eq!(outcome.skipped.len(), 5);
        assert!(outcome.is_partial());
    }

    #[test]
    fn test_cancel_keeps_completed_subjects() {
        let signals = signals(5);
        let config = BoutConfig::new(10.0, 3, 1);
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = flag.clone();

        // One worker raises the flag after its first subject.
        let outcome = BatchRunner::new(1)
            .with_cancel_flag(flag)
            .with_progress(move |_| trigger.store(true, Ordering::SeqCst))
            .run(&signals, &config)
            .unwrap();

        let ids: Vec<SubjectId> = signals.keys().cloned().collect();
        assert!(outcome.cancelled);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.collection.subjects().collect::<Vec<_>>(), vec![&ids[0]]);
        assert_eq!(outcome.skipped, ids[1..].to_vec());

        let sequential = segment(&signals, &config).unwrap();
        assert_eq!(
            outcome.collection.bouts_for(&ids[0]),
            sequential.bouts_for(&ids[0])
        );
    }

    #[test]
    fn test_progress_sees_every_subject() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let signals = signals(6);

        BatchRunner::new(3)
            .with_progress(move |s| sink.lock().unwrap().push(s.clone()))
            .run(&signals, &BoutConfig::default())
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, signals.keys().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = BatchRunner::new(2)
            .run(&signals(3), &BoutConfig::new(10.0, 3, -1))
            .unwrap_err();
        assert!(matches!(err, BoutError::InvalidConfig(_)));
    }

    #[test]
    fn test_no_subjects() {
        let outcome = BatchRunner::new(0)
            .run(&SignalSet::new(), &BoutConfig::default())
            .unwrap();
        assert_eq!(outcome.completed, 0);
        assert!(outcome.collection.bouts.is_empty());
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(BatchRunner::new(8).worker_count(3), 3);
        assert_eq!(BatchRunner::new(2).worker_count(10), 2);
        assert_eq!(BatchRunner::new(4).worker_count(0), 1);
        assert!(BatchRunner::new(0).worker_count(64) >= 1);
    }
}

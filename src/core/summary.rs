//! Bout statistics per subject and across a cohort.

use crate::core::bouts::{Bout, BoutCollection};
use crate::signal::clinical::ClinicalSet;
use crate::signal::types::SubjectId;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Summary of one subject's bouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoutSummary {
    /// Number of committed bouts
    pub total_bouts: usize,
    /// Samples spent in bouts (minutes for a per-minute signal)
    pub total_bout_time: usize,
    /// Sum of bout aggregate values
    pub total_aggregate_value: f64,
    /// Mean bout duration in samples, 0 without bouts
    pub avg_bout_duration: f64,
    /// Sample standard deviation of bout durations (needs two bouts)
    pub std_bout_duration: Option<f64>,
}

impl BoutSummary {
    pub fn from_bouts(bouts: &[Bout]) -> Self {
        let durations: Vec<f64> = bouts.iter().map(|b| b.sample_count as f64).collect();

        let avg_bout_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().mean()
        };
        let std_bout_duration = if durations.len() < 2 {
            None
        } else {
            Some(durations.iter().std_dev())
        };

        Self {
            total_bouts: bouts.len(),
            total_bout_time: bouts.iter().map(|b| b.sample_count).sum(),
            total_aggregate_value: bouts.iter().map(|b| b.aggregate_value).sum(),
            avg_bout_duration,
            std_bout_duration,
        }
    }

    /// Aggregate value per bout, if there is at least one bout.
    pub fn aggregate_per_bout(&self) -> Option<f64> {
        (self.total_bouts > 0).then(|| self.total_aggregate_value / self.total_bouts as f64)
    }
}

/// Summaries for every subject of a collection.
pub fn summarize(collection: &BoutCollection) -> BTreeMap<SubjectId, BoutSummary> {
    collection
        .bouts
        .iter()
        .map(|(subject, bouts)| (subject.clone(), BoutSummary::from_bouts(bouts)))
        .collect()
}

/// Statistics across subjects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub subjects: usize,
    pub mean_bouts: Option<f64>,
    pub std_bouts: Option<f64>,
    pub mean_avg_duration: Option<f64>,
    pub std_avg_duration: Option<f64>,
    /// Mean over subjects with bouts of their aggregate value per bout
    pub mean_aggregate_per_bout: Option<f64>,
}

impl CohortSummary {
    pub fn from_summaries<'a, I>(summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a BoutSummary>,
    {
        let summaries: Vec<&BoutSummary> = summaries.into_iter().collect();
        let bouts: Vec<f64> = summaries.iter().map(|s| s.total_bouts as f64).collect();
        let durations: Vec<f64> = summaries.iter().map(|s| s.avg_bout_duration).collect();
        let per_bout: Vec<f64> = summaries
            .iter()
            .filter_map(|s| s.aggregate_per_bout())
            .collect();

        Self {
            subjects: summaries.len(),
            mean_bouts: mean(&bouts),
            std_bouts: std_dev(&bouts),
            mean_avg_duration: mean(&durations),
            std_avg_duration: std_dev(&durations),
            mean_aggregate_per_bout: mean(&per_bout),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().mean())
}

fn std_dev(values: &[f64]) -> Option<f64> {
    (values.len() >= 2).then(|| values.iter().std_dev())
}

/// Pearson correlation coefficient.
///
/// `None` when the slices differ in length, hold fewer than two points, or
/// either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let sx = xs.iter().std_dev();
    let sy = ys.iter().std_dev();
    if sx == 0.0 || sy == 0.0 {
        return None;
    }

    let r = xs.iter().covariance(ys.iter()) / (sx * sy);
    r.is_finite().then_some(r)
}

/// Per-subject bout metric that can be related to clinical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMetric {
    TotalBouts,
    TotalBoutTime,
    TotalAggregateValue,
    AvgBoutDuration,
}

impl SummaryMetric {
    pub const ALL: [SummaryMetric; 4] = [
        SummaryMetric::TotalBouts,
        SummaryMetric::TotalBoutTime,
        SummaryMetric::TotalAggregateValue,
        SummaryMetric::AvgBoutDuration,
    ];

    pub fn value(&self, summary: &BoutSummary) -> f64 {
        match self {
            SummaryMetric::TotalBouts => summary.total_bouts as f64,
            SummaryMetric::TotalBoutTime => summary.total_bout_time as f64,
            SummaryMetric::TotalAggregateValue => summary.total_aggregate_value,
            SummaryMetric::AvgBoutDuration => summary.avg_bout_duration,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SummaryMetric::TotalBouts => "total_bouts",
            SummaryMetric::TotalBoutTime => "total_bout_time",
            SummaryMetric::TotalAggregateValue => "total_aggregate_value",
            SummaryMetric::AvgBoutDuration => "avg_bout_duration",
        }
    }
}

/// Correlation between a clinical field and a bout metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCorrelation {
    pub field: String,
    pub metric: SummaryMetric,
    /// Subjects with both a summary and a numeric value for the field
    pub subjects: usize,
    pub r: Option<f64>,
}

/// Join summaries with clinical records on subject id and correlate `field`
/// against `metric`. Subjects lacking a numeric value for the field are left
/// out.
pub fn clinical_correlation(
    summaries: &BTreeMap<SubjectId, BoutSummary>,
    clinical: &ClinicalSet,
    field: &str,
    metric: SummaryMetric,
) -> ClinicalCorrelation {
    let (xs, ys): (Vec<f64>, Vec<f64>) = summaries
        .iter()
        .filter_map(|(subject, summary)| {
            let x = clinical.get(subject)?.get(field)?.as_f64()?;
            Some((x, metric.value(summary)))
        })
        .unzip();

    ClinicalCorrelation {
        field: field.to_string(),
        metric,
        subjects: xs.len(),
        r: pearson(&xs, &ys),
    }
}

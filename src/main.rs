//! Activity Bouts CLI
//!
//! Segments wearable activity exports into bouts and summarizes them.

use activity_bouts::{
    config::Config,
    core::{
        clinical_correlation, read_report, write_report, BoutConfig, BoutSummary, ReportBuilder,
        ReportFormat, SummaryMetric,
    },
    runlog::create_shared_log_with_persistence,
    runner::BatchRunner,
    signal::{densify, load_clinical, load_signals, SignalSource, SubjectId},
    VERSION,
};
use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "activity-bouts")]
#[command(version = VERSION)]
#[command(about = "Segment wearable activity signals into bouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset, segment every subject and export a report
    Segment {
        /// Signal source, e.g. fitbit:steps or actigraph:axis1
        #[arg(long, default_value = "fitbit:steps")]
        source: String,

        /// Export file or directory to load
        #[arg(long, short)]
        input: PathBuf,

        /// Minimum value for a sample to count as active
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,

        /// Minimum number of samples in a bout
        #[arg(long, allow_hyphen_values = true)]
        min_duration: Option<i64>,

        /// Longest run of inactive samples absorbed into a bout
        #[arg(long, allow_hyphen_values = true)]
        tolerance: Option<i64>,

        /// Worker threads (0 = all cores)
        #[arg(long)]
        workers: Option<usize>,

        /// Fill missing minutes with inactive samples before segmenting
        #[arg(long)]
        densify: bool,

        /// IANA time zone of the device timestamps
        #[arg(long)]
        timezone: Option<String>,

        /// Report file to write
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Report format (json, jsonl or csv)
        #[arg(long)]
        format: Option<String>,
    },

    /// Summarize an exported JSON report
    Summary {
        /// Report written by `segment --format json`
        report: PathBuf,

        /// Clinical record file or directory to correlate against
        #[arg(long)]
        clinical: Option<PathBuf>,

        /// Clinical fields to correlate (repeatable)
        #[arg(long, default_value = "age")]
        field: Vec<String>,
    },

    /// Show cumulative run statistics
    Status,

    /// Show configuration, or update it when settings are given
    Config {
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        min_duration: Option<i64>,

        #[arg(long, allow_hyphen_values = true)]
        tolerance: Option<i64>,

        #[arg(long)]
        workers: Option<usize>,

        #[arg(long)]
        timezone: Option<String>,

        #[arg(long)]
        densify: Option<bool>,

        #[arg(long)]
        format: Option<String>,

        /// Restore defaults
        #[arg(long)]
        reset: bool,
    },
}

/// Segmentation options gathered from the command line.
struct SegmentArgs {
    source: String,
    input: PathBuf,
    threshold: Option<f64>,
    min_duration: Option<i64>,
    tolerance: Option<i64>,
    workers: Option<usize>,
    densify: bool,
    timezone: Option<String>,
    output: Option<PathBuf>,
    format: Option<String>,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Segment {
            source,
            input,
            threshold,
            min_duration,
            tolerance,
            workers,
            densify,
            timezone,
            output,
            format,
        } => cmd_segment(SegmentArgs {
            source,
            input,
            threshold,
            min_duration,
            tolerance,
            workers,
            densify,
            timezone,
            output,
            format,
        }),
        Commands::Summary {
            report,
            clinical,
            field,
        } => cmd_summary(report, clinical, &field),
        Commands::Status => cmd_status(),
        Commands::Config {
            threshold,
            min_duration,
            tolerance,
            workers,
            timezone,
            densify,
            format,
            reset,
        } => cmd_config(
            BoutOverrides {
                threshold,
                min_duration,
                tolerance,
            },
            workers,
            timezone,
            densify,
            format,
            reset,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[derive(Default)]
struct BoutOverrides {
    threshold: Option<f64>,
    min_duration: Option<i64>,
    tolerance: Option<i64>,
}

impl BoutOverrides {
    fn is_empty(&self) -> bool {
        self.threshold.is_none() && self.min_duration.is_none() && self.tolerance.is_none()
    }

    fn apply(&self, base: BoutConfig) -> BoutConfig {
        BoutConfig {
            threshold: self.threshold.unwrap_or(base.threshold),
            min_duration: self.min_duration.unwrap_or(base.min_duration),
            tolerance: self.tolerance.unwrap_or(base.tolerance),
        }
    }
}

/// Load the saved configuration, falling back to defaults with a warning
/// when the file is unreadable.
fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Ignoring {:?} ({e}); using default settings",
            Config::config_path()
        );
        Config::default()
    })
}

fn cmd_segment(args: SegmentArgs) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(tz) = args.timezone {
        config.timezone = tz;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.densify |= args.densify;

    let bout_config = BoutOverrides {
        threshold: args.threshold,
        min_duration: args.min_duration,
        tolerance: args.tolerance,
    }
    .apply(config.bouts);
    bout_config.validate()?;

    let source: SignalSource = args.source.parse()?;
    let format = match args.format {
        Some(f) => f.parse::<ReportFormat>()?,
        None => config.export_format,
    };
    let tz = config.time_zone()?;

    println!("Activity Bouts v{VERSION}");
    println!();
    println!("  Source: {source}");
    println!("  Input: {:?}", args.input);
    println!(
        "  Threshold: {} | Min duration: {} | Tolerance: {}",
        bout_config.threshold, bout_config.min_duration, bout_config.tolerance
    );
    println!("  Time zone: {tz}");
    println!();

    let mut signals = load_signals(source, &args.input, tz)
        .with_context(|| format!("Could not load signals from {:?}", args.input))?;

    if config.densify {
        if bout_config.threshold <= 0.0 {
            eprintln!("Warning: filled minutes count as active with a threshold of 0 or less");
        }
        for signal in signals.values_mut() {
            *signal = densify(signal, chrono::Duration::minutes(1), 0.0);
        }
    }

    let run_log = create_shared_log_with_persistence(config.run_log_path());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    println!(
        "Segmenting {} subject(s) (press Ctrl+C to stop early)...",
        signals.len()
    );
    let runner = BatchRunner::new(config.workers)
        .with_cancel_flag(cancel)
        .with_progress(|subject| tracing::debug!(%subject, "Subject finished"));
    let outcome = runner.run(&signals, &bout_config)?;
    run_log.record_batch(&outcome);

    println!();
    for (subject, bouts) in &outcome.collection.bouts {
        let summary = BoutSummary::from_bouts(bouts);
        println!(
            "  {subject}: {} bout(s), {} samples in bouts, aggregate {:.1}",
            summary.total_bouts, summary.total_bout_time, summary.total_aggregate_value
        );
    }
    if outcome.is_partial() {
        println!();
        println!(
            "Stopped early: {} of {} subject(s) segmented",
            outcome.completed,
            signals.len()
        );
    }

    let report = ReportBuilder::new()
        .with_source(source)
        .build_from_outcome(&outcome, &bout_config);

    let output = args.output.unwrap_or_else(|| {
        config.export_path.join(format!(
            "bouts_{}.{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        ))
    });
    write_report(&report, &output, format)
        .with_context(|| format!("Could not write report to {output:?}"))?;
    run_log.record_report_exported();
    println!();
    println!("Exported {} bout(s) to {:?}", report.total_bouts(), output);

    if let Err(e) = run_log.save() {
        eprintln!("Warning: Could not save run log: {e}");
    }

    Ok(())
}

fn cmd_summary(path: PathBuf, clinical: Option<PathBuf>, fields: &[String]) -> anyhow::Result<()> {
    let report =
        read_report(&path).with_context(|| format!("Could not read report {path:?}"))?;

    println!("Bout Summary");
    println!("============");
    println!();
    println!("Report: {path:?}");
    println!("Generated: {}", report.generated_at_utc);
    if let Some(source) = report.source {
        println!("Source: {source}");
    }
    if report.partial {
        println!("Partial: yes (run was stopped early)");
    }
    println!();

    for (subject, summary) in report.summaries() {
        let spread = summary
            .std_bout_duration
            .map(|s| format!(" (sd {s:.2})"))
            .unwrap_or_default();
        println!(
            "  {subject}: {} bout(s), avg duration {:.2}{spread}, aggregate {:.1}",
            summary.total_bouts, summary.avg_bout_duration, summary.total_aggregate_value
        );
    }

    let cohort = &report.cohort;
    println!();
    println!("Cohort ({} subjects):", cohort.subjects);
    println!("  Bouts per subject: {}", format_stat(cohort.mean_bouts, cohort.std_bouts));
    println!(
        "  Avg bout duration: {}",
        format_stat(cohort.mean_avg_duration, cohort.std_avg_duration)
    );
    println!(
        "  Aggregate per bout: {}",
        format_stat(cohort.mean_aggregate_per_bout, None)
    );

    if let Some(clinical_path) = clinical {
        let clinical = load_clinical(&clinical_path)
            .with_context(|| format!("Could not load clinical data from {clinical_path:?}"))?;
        let summaries: BTreeMap<SubjectId, BoutSummary> = report
            .summaries()
            .map(|(subject, summary)| (SubjectId::new(subject), summary.clone()))
            .collect();

        println!();
        println!("Clinical correlations (Pearson r):");
        for field in fields {
            for metric in SummaryMetric::ALL {
                let corr = clinical_correlation(&summaries, &clinical, field, metric);
                let r = corr
                    .r
                    .map(|r| format!("{r:.3}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "  {} vs {}: {r} ({} subjects)",
                    corr.field,
                    metric.name(),
                    corr.subjects
                );
            }
        }
    }

    Ok(())
}

fn format_stat(mean: Option<f64>, std: Option<f64>) -> String {
    match (mean, std) {
        (Some(m), Some(s)) => format!("{m:.2} ± {s:.2}"),
        (Some(m), None) => format!("{m:.2}"),
        _ => "n/a".to_string(),
    }
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("Activity Bouts Status");
    println!("=====================");
    println!();
    println!("Configuration:");
    println!(
        "  Threshold: {} | Min duration: {} | Tolerance: {}",
        config.bouts.threshold, config.bouts.min_duration, config.bouts.tolerance
    );
    println!("  Time zone: {}", config.timezone);
    println!("  Densify: {}", config.densify);
    println!("  Reports: {:?}", config.export_path);
    println!();

    let stats_path = config.run_log_path();
    if stats_path.exists() {
        let log = create_shared_log_with_persistence(stats_path);
        println!("{}", log.summary());
    } else {
        println!("No previous runs found.");
    }

    Ok(())
}

fn cmd_config(
    overrides: BoutOverrides,
    workers: Option<usize>,
    timezone: Option<String>,
    densify: Option<bool>,
    format: Option<String>,
    reset: bool,
) -> anyhow::Result<()> {
    let mut config = if reset {
        Config::default()
    } else {
        Config::load()?
    };

    let changed = reset
        || !overrides.is_empty()
        || workers.is_some()
        || timezone.is_some()
        || densify.is_some()
        || format.is_some();

    config.bouts = overrides.apply(config.bouts);
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(tz) = timezone {
        config.timezone = tz;
    }
    if let Some(densify) = densify {
        config.densify = densify;
    }
    if let Some(format) = format {
        config.export_format = format.parse()?;
    }

    if changed {
        if let Err(e) = config.bouts.validate() {
            bail!("Refusing to save configuration: {e}");
        }
        config.time_zone()?;
        config.save()?;
        println!("Configuration saved.");
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

//! CLI entry point for the traffic studies tool.
//!
//! Provides subcommands for inspecting the structure of a counter export,
//! computing metrics for a filter window, and listing the study locations in a
//! directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_studies::{
    config::{AnalysisConfig, RecordFilter},
    loader::{self, LoadedData},
    output::{MetricsRecord, append_record, print_json, print_pretty},
    parser::detect_file_structure,
};

#[derive(Parser)]
#[command(name = "traffic_studies")]
#[command(about = "A tool to analyze traffic counter exports", long_about = None)]
struct Cli {
    /// JSON file with analysis settings
    #[arg(long, global = true, value_name = "JSON")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and print the structure of an export
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Load an export and compute its core metrics
    Metrics {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Speed limit to evaluate compliance against (defaults to the posted speed)
        #[arg(short, long)]
        speed_limit: Option<u32>,

        #[arg(long, value_name = "YYYY-MM-DD")]
        start_date: Option<NaiveDate>,

        #[arg(long, value_name = "YYYY-MM-DD")]
        end_date: Option<NaiveDate>,

        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=23))]
        start_hour: u32,

        #[arg(long, default_value_t = 23, value_parser = clap::value_parser!(u32).range(0..=23))]
        end_hour: u32,

        /// Print metrics and breakdowns as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append a metrics summary row to
        #[arg(short, long, value_name = "CSV")]
        append: Option<PathBuf>,
    },
    /// List the study locations (`*-ALL.csv` exports) in a directory
    Locations {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/traffic_studies.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_studies.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Inspect { file } => {
            let structure = detect_file_structure(&file)
                .with_context(|| format!("inspecting {}", file.display()))?;
            print_json(&structure)?;
        }
        Commands::Metrics {
            file,
            speed_limit,
            start_date,
            end_date,
            start_hour,
            end_hour,
            json,
            append,
        } => {
            let data = open(&file, &config)?;
            let filter = RecordFilter::default()
                .dates(start_date, end_date)
                .hours(start_hour, end_hour);

            let hours_analyzed = data.filtered(&filter).len();
            let metrics = data.metrics(&filter, speed_limit, &config);
            let summary = data.summary(&filter, speed_limit);

            if json {
                print_json(&serde_json::json!({
                    "location": data.location,
                    "filtering": data.filtering_stats,
                    "metrics": metrics,
                    "summary": summary,
                }))?;
            } else {
                print_pretty(&summary);
                info!(
                    location = %data.location,
                    hours_analyzed,
                    total_vehicles = metrics.total_vehicles,
                    adt = format!("{:.0}", metrics.average_daily_traffic),
                    posted_speed = metrics.posted_speed,
                    average_speed = format!("{:.1}", metrics.combined_average_speed),
                    compliance = format!("{:.1}%", metrics.compliance_rate),
                    p85 = format!("{:.1}", metrics.percentile_85th_speed),
                    peak_hour = %metrics.peak_hour_label(),
                    peak_vehicles = metrics.peak_vehicles,
                    dominant = %metrics.dominant_direction,
                    dominant_pct = format!("{:.1}%", metrics.dominant_pct),
                    high_speeders = metrics.high_speeders,
                    "Core metrics"
                );
            }

            if let Some(path) = append {
                let record = MetricsRecord::new(&data.location, &filter, hours_analyzed, &metrics);
                append_record(&path, &record)
                    .with_context(|| format!("appending to {}", path.display()))?;
            }
        }
        Commands::Locations { dir } => {
            let locations = loader::get_available_locations(&dir)
                .with_context(|| format!("listing {}", dir.display()))?;
            info!(total = locations.len(), "Locations found");
            for (location, path) in &locations {
                info!(location = %location, file = %path.display(), "Location");
            }
        }
    }

    Ok(())
}

/// Loads an export, logging each failed validation check before bailing.
fn open(file: &Path, config: &AnalysisConfig) -> Result<LoadedData> {
    loader::open(file, config)
        .inspect_err(|e| {
            for err in e.report().map(|r| r.errors.as_slice()).unwrap_or_default() {
                error!(%err, "Validation error");
            }
        })
        .with_context(|| format!("loading {}", file.display()))
}

//! Output formatting and persistence for traffic metrics.
//!
//! Supports pretty-printing, JSON serialization, and appending flat metric
//! summaries to a CSV file.

use std::fmt::Debug;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RecordFilter;
use crate::metrics::CoreMetrics;

/// One CSV row summarizing the metrics of a location for a filter window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub timestamp: i64,
    pub location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_hour: u32,
    pub end_hour: u32,
    pub hours_analyzed: usize,
    pub total_vehicles: i64,
    pub average_daily_traffic: f64,
    pub posted_speed: u32,
    pub combined_average_speed: f64,
    pub compliance_rate: f64,
    pub percentile_85th_speed: f64,
    pub peak_hour: String,
    pub peak_vehicles: i64,
    pub dominant_direction: String,
    pub dominant_pct: f64,
    pub high_speeders: i64,
}

impl MetricsRecord {
    pub fn new(
        location: &str,
        filter: &RecordFilter,
        hours_analyzed: usize,
        metrics: &CoreMetrics,
    ) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            location: location.to_string(),
            start_date: filter.start_date,
            end_date: filter.end_date,
            start_hour: filter.start_hour,
            end_hour: filter.end_hour,
            hours_analyzed,
            total_vehicles: metrics.total_vehicles,
            average_daily_traffic: metrics.average_daily_traffic,
            posted_speed: metrics.posted_speed,
            combined_average_speed: metrics.combined_average_speed,
            compliance_rate: metrics.compliance_rate,
            percentile_85th_speed: metrics.percentile_85th_speed,
            peak_hour: metrics.peak_hour_label(),
            peak_vehicles: metrics.peak_vehicles,
            dominant_direction: metrics.dominant_direction.to_string(),
            dominant_pct: metrics.dominant_pct,
            high_speeders: metrics.high_speeders,
        }
    }
}

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`MetricsRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &MetricsRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

//! Sanity checks over an enriched table.
//!
//! Errors (negative counts, `Total` mismatches) invalidate the dataset.
//! Warnings (implausible volumes, irregular spacing) are reported but do not.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::parser::FileStructure;
use crate::table::{DateRange, TrafficTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Per-column `<col>_max` / `<col>_mean` values.
    pub stats: BTreeMap<String, f64>,
    pub date_range: Option<DateRange>,
    pub total_hours: usize,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            stats: BTreeMap::new(),
            date_range: None,
            total_hours: 0,
        }
    }
}

impl ValidationReport {
    fn error(&mut self, message: String) {
        self.errors.push(message);
        self.is_valid = false;
    }
}

fn check_negative(report: &mut ValidationReport, table: &TrafficTable, col: &str, kind: &str) {
    let negative = table.column_values(col).filter(|v| *v < 0).count();
    if negative > 0 {
        report.error(format!("Found {negative} negative values in {kind}{col}"));
    }
}

pub fn validate_traffic_data(
    table: &TrafficTable,
    structure: &FileStructure,
    config: &AnalysisConfig,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for col in structure.volume_cols() {
        if !table.has_column(&col) {
            continue;
        }
        check_negative(&mut report, table, &col, "");

        let Some(max) = table.column_values(&col).max() else {
            continue;
        };
        if max > config.high_volume_threshold {
            report
                .warnings
                .push(format!("Unusually high traffic volume in {col}: {max} vehicles/hour"));
        }
        let mean = table.column_sum(&col) as f64 / table.len() as f64;
        report.stats.insert(format!("{col}_max"), max as f64);
        report.stats.insert(format!("{col}_mean"), mean);
    }

    let total_diff: i64 = table
        .records()
        .iter()
        .map(|r| (r.total - (r.dir1_volume + r.dir2_volume)).abs())
        .sum();
    if total_diff > 0 {
        report.error(format!(
            "Total column doesn't match sum of directional volumes (difference: {total_diff})"
        ));
    }

    for col in structure.speed_cols() {
        check_negative(&mut report, table, &col, "speed column ");
    }

    let expected = Duration::minutes(config.expected_interval_minutes);
    let irregular = table
        .records()
        .windows(2)
        .filter(|w| w[1].timestamp - w[0].timestamp != expected)
        .count();
    if irregular > 0 {
        report
            .warnings
            .push(format!("Found {irregular} irregular time intervals"));
    }
    report.date_range = table.date_range();
    report.total_hours = table.len();

    for col in structure.class_cols() {
        check_negative(&mut report, table, &col, "classification column ");
    }

    report
}

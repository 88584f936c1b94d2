//! Analysis configuration and record filters.
//!
//! [`AnalysisConfig`] is stored as a plain JSON object on disk; every field is
//! optional and falls back to the named defaults below:
//! ```json
//! {
//!   "default_speed_limit": 25,
//!   "high_volume_threshold": 1200
//! }
//! ```

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Speed limit assumed when no posted speed is known.
pub const DEFAULT_SPEED_LIMIT: u32 = 30;

/// Number of leading lines inspected when detecting a file's structure.
pub const HEADER_SCAN_LINES: usize = 15;

/// Placeholder used when no location can be resolved.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub default_speed_limit: u32,
    /// Hourly directional volume above which a warning is raised.
    pub high_volume_threshold: i64,
    pub expected_interval_minutes: i64,
    /// Days with fewer hourly records are treated as partial for ADT.
    pub complete_day_min_hours: usize,
    /// Vehicles at or above `speed_limit + high_speed_margin` are high-speed violators.
    pub high_speed_margin: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_speed_limit: DEFAULT_SPEED_LIMIT,
            high_volume_threshold: 1000,
            expected_interval_minutes: 60,
            complete_day_min_hours: 20,
            high_speed_margin: 15,
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TrafficError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| TrafficError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// Date and hour-of-day window applied to enriched records before metrics.
///
/// Both ranges are inclusive. Missing dates leave that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            start_hour: 0,
            end_hour: 23,
        }
    }
}

impl RecordFilter {
    pub fn dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn hours(mut self, start: u32, end: u32) -> Self {
        self.start_hour = start;
        self.end_hour = end;
        self
    }

    pub fn matches(&self, timestamp: NaiveDateTime, hour: u32) -> bool {
        let date = timestamp.date();
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
            && (self.start_hour..=self.end_hour).contains(&hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(name)
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let path = temp_path("traffic_studies_test_config.json");
        fs::write(&path, r#"{ "default_speed_limit": 25 }"#).unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.default_speed_limit, 25);
        assert_eq!(config.high_volume_threshold, 1000);
        assert_eq!(config.complete_day_min_hours, 20);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_invalid_config() {
        let path = temp_path("traffic_studies_test_bad_config.json");
        fs::write(&path, "not json").unwrap();

        let err = AnalysisConfig::load(&path).unwrap_err();
        assert!(matches!(err, TrafficError::Config { .. }));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_config_is_io_error() {
        let err = AnalysisConfig::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, TrafficError::Io { .. }));
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = RecordFilter::default();
        assert!(filter.matches(at(2024, 6, 11, 0), 0));
        assert!(filter.matches(at(2024, 6, 11, 23), 23));
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 12);
        let filter = RecordFilter::default().dates(day, day).hours(7, 9);

        assert!(filter.matches(at(2024, 6, 12, 7), 7));
        assert!(filter.matches(at(2024, 6, 12, 9), 9));
        assert!(!filter.matches(at(2024, 6, 12, 10), 10));
        assert!(!filter.matches(at(2024, 6, 11, 8), 8));
        assert!(!filter.matches(at(2024, 6, 13, 8), 8));
    }
}

//! In-memory table of enriched hourly records.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::debug;

use crate::columns::SpeedRange;
use crate::config::RecordFilter;

/// Header token identifying the timestamp column and the header row itself.
pub const TIMESTAMP_COLUMN: &str = "Date/Time";

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Permissive timestamp parse; `None` when no known format matches.
///
/// Interval stamps such as `11/04/2024 14:00 - 14:59` resolve to the start of
/// the interval.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_matches('"').trim();
    let raw = raw.split_once(" - ").map_or(raw, |(start, _)| start.trim());

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One interval row: the raw numeric cells plus derived columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EnrichedRecord {
    pub timestamp: NaiveDateTime,
    pub hour: u32,
    /// Raw cells aligned with [`TrafficTable::columns`]; `None` for cells that
    /// are empty or not integers.
    pub values: Vec<Option<i64>>,
    pub dir1_volume: i64,
    pub dir2_volume: i64,
    /// Always `dir1_volume + dir2_volume`.
    pub total: i64,
    pub dir1_compliant: i64,
    pub dir1_non_compliant: i64,
    pub dir2_compliant: i64,
    pub dir2_non_compliant: i64,
}

impl EnrichedRecord {
    pub fn new(timestamp: NaiveDateTime, values: Vec<Option<i64>>) -> Self {
        Self {
            timestamp,
            hour: timestamp.hour(),
            values,
            dir1_volume: 0,
            dir2_volume: 0,
            total: 0,
            dir1_compliant: 0,
            dir1_non_compliant: 0,
            dir2_compliant: 0,
            dir2_non_compliant: 0,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A speed-bin column resolved against a table.
#[derive(Debug, Clone, PartialEq)]
pub struct BinColumn {
    pub name: String,
    pub index: usize,
    pub range: SpeedRange,
}

impl BinColumn {
    pub fn count(&self, record: &EnrichedRecord) -> i64 {
        record.values.get(self.index).copied().flatten().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    records: Vec<EnrichedRecord>,
}

impl TrafficTable {
    pub fn new(columns: Vec<String>, records: Vec<EnrichedRecord>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            index,
            records,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [EnrichedRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Numeric value of `name` in `record`, 0 when absent.
    pub fn value(&self, record: &EnrichedRecord, name: &str) -> i64 {
        self.column_index(name)
            .and_then(|i| record.values.get(i).copied().flatten())
            .unwrap_or(0)
    }

    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = i64> + 'a {
        let index = self.column_index(name);
        self.records.iter().filter_map(move |r| {
            let i = index?;
            Some(r.values.get(i).copied().flatten().unwrap_or(0))
        })
    }

    pub fn column_sum(&self, name: &str) -> i64 {
        self.column_values(name).sum()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&EnrichedRecord) -> bool) {
        self.records.retain(keep);
    }

    /// Records inside the filter window, as a new table.
    pub fn filtered(&self, filter: &RecordFilter) -> TrafficTable {
        TrafficTable {
            columns: self.columns.clone(),
            index: self.index.clone(),
            records: self
                .records
                .iter()
                .filter(|r| filter.matches(r.timestamp, r.hour))
                .cloned()
                .collect(),
        }
    }

    /// Resolves speed-bin columns, skipping names that are not in the table or
    /// do not parse as a speed range.
    pub fn speed_bins(&self, cols: &[String]) -> Vec<BinColumn> {
        cols.iter()
            .filter_map(|name| {
                let resolved = self
                    .column_index(name)
                    .zip(SpeedRange::parse(name))
                    .map(|(index, range)| BinColumn {
                        name: name.clone(),
                        index,
                        range,
                    });
                if resolved.is_none() {
                    debug!(column = %name, "Skipping unparseable speed column");
                }
                resolved
            })
            .collect()
    }

    pub fn timestamps(&self) -> HashSet<NaiveDateTime> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let start = self.records.iter().map(|r| r.timestamp).min()?;
        let end = self.records.iter().map(|r| r.timestamp).max()?;
        Some(DateRange { start, end })
    }

    /// Content hash used as a memoization key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.columns.hash(&mut hasher);
        self.records.hash(&mut hasher);
        hasher.finish()
    }
}

//! Vendor reference files ("SPD" exports) that sit next to a main export.
//!
//! For a main file `<base>-ALL.csv` the counter software also writes
//! `<base>-Total-SPD.csv` and one `<base>-<Direction>-SPD.csv` per direction.
//! The Total file carries the posted speed in its metadata and vendor-computed
//! mean and 85th-percentile speeds per interval.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::columns::Direction;
use crate::config::HEADER_SCAN_LINES;
use crate::error::{Result, TrafficError};
use crate::parser::{base_name, find_column_header_row, parent_dir, read_header_lines};
use crate::table::parse_timestamp;

const POSTED_SPEED_MARKER: &str = "Posted Speed:";
const MEAN_SPEED_COLUMN: &str = "Mean Speed";
const PERCENTILE_COLUMN: &str = "85th Percentile";

/// Sibling reference files, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceFiles {
    pub total: Option<PathBuf>,
    pub northbound: Option<PathBuf>,
    pub southbound: Option<PathBuf>,
    pub eastbound: Option<PathBuf>,
    pub westbound: Option<PathBuf>,
}

impl ReferenceFiles {
    /// Scans the directory of `path` for `<base>*SPD*.csv` siblings.
    ///
    /// Entries are visited in file-name order and the first match per role is
    /// kept. An unreadable directory yields no reference files.
    pub fn discover(path: &Path) -> Self {
        let mut found = ReferenceFiles::default();
        let Some(base) = base_name(path) else {
            return found;
        };

        let Ok(entries) = fs::read_dir(parent_dir(path)) else {
            debug!(path = %path.display(), "Reference directory unreadable");
            return found;
        };
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
            })
            .collect();
        candidates.sort();

        for candidate in candidates {
            let (Some(stem), Some(name)) = (
                candidate.file_stem().and_then(|s| s.to_str()),
                candidate.file_name().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if !stem.starts_with(&base) {
                continue;
            }
            let upper = name.to_uppercase();
            if !upper.contains("SPD") {
                continue;
            }

            let slot = if upper.contains("TOTAL") {
                &mut found.total
            } else if let Some(dir) = Direction::ALL
                .iter()
                .find(|d| upper.contains(&d.as_str().to_uppercase()))
            {
                found.slot_mut(*dir)
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(candidate.clone());
            }
        }

        found
    }

    fn slot_mut(&mut self, dir: Direction) -> &mut Option<PathBuf> {
        match dir {
            Direction::Northbound => &mut self.northbound,
            Direction::Southbound => &mut self.southbound,
            Direction::Eastbound => &mut self.eastbound,
            Direction::Westbound => &mut self.westbound,
        }
    }

    pub fn for_direction(&self, dir: Direction) -> Option<&Path> {
        match dir {
            Direction::Northbound => self.northbound.as_deref(),
            Direction::Southbound => self.southbound.as_deref(),
            Direction::Eastbound => self.eastbound.as_deref(),
            Direction::Westbound => self.westbound.as_deref(),
        }
    }

    pub fn count(&self) -> usize {
        [
            &self.total,
            &self.northbound,
            &self.southbound,
            &self.eastbound,
            &self.westbound,
        ]
        .iter()
        .filter(|p| p.is_some())
        .count()
    }
}

/// Reads the `"Posted Speed:","35"` metadata field of a reference file.
///
/// Returns `None` when the file is unreadable, has no such field, or the value
/// is not an integer.
pub fn extract_posted_speed(path: &Path) -> Option<u32> {
    let lines = read_header_lines(path, HEADER_SCAN_LINES).ok()?;
    lines.iter().find_map(|line| {
        let (_, rest) = line.split_once(POSTED_SPEED_MARKER)?;
        rest.split(|c: char| c == '"' || c == ',' || c.is_whitespace())
            .find(|token| !token.is_empty())?
            .parse()
            .ok()
    })
}

/// Vendor-computed speeds for one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSpeedRow {
    pub timestamp: NaiveDateTime,
    pub mean_speed: Option<f64>,
    pub percentile_85th: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceSpeedSeries {
    pub rows: Vec<ReferenceSpeedRow>,
}

impl ReferenceSpeedSeries {
    /// Mean of the positive vendor mean speeds for the given intervals.
    pub fn mean_speed_for(&self, timestamps: &HashSet<NaiveDateTime>) -> Option<f64> {
        self.average_for(timestamps, |r| r.mean_speed)
    }

    /// Mean of the positive vendor 85th-percentile speeds for the given intervals.
    pub fn percentile_85th_for(&self, timestamps: &HashSet<NaiveDateTime>) -> Option<f64> {
        self.average_for(timestamps, |r| r.percentile_85th)
    }

    fn average_for(
        &self,
        timestamps: &HashSet<NaiveDateTime>,
        value: impl Fn(&ReferenceSpeedRow) -> Option<f64>,
    ) -> Option<f64> {
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter(|r| timestamps.contains(&r.timestamp))
            .filter_map(&value)
            .filter(|v| *v > 0.0)
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Stable hash input for memoization.
    pub(crate) fn fingerprint_bits(&self) -> Vec<(i64, u64, u64)> {
        self.rows
            .iter()
            .map(|r| {
                (
                    r.timestamp.and_utc().timestamp(),
                    r.mean_speed.map_or(u64::MAX, f64::to_bits),
                    r.percentile_85th.map_or(u64::MAX, f64::to_bits),
                )
            })
            .collect()
    }
}

/// The vendor sometimes drops the separator between two header fields,
/// producing `"Total""Mean Speed"`.
fn repair_header(line: &str) -> String {
    line.replace("\"\"", "\",\"")
}

fn parse_speed(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim).filter(|c| !c.is_empty())?.parse().ok()
}

/// Loads the per-interval vendor speeds from a Total reference file.
///
/// Rows whose timestamp does not parse are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has no `Date/Time` header row,
/// or the CSV body is malformed.
pub fn load_reference_speed_data(path: &Path) -> Result<ReferenceSpeedSeries> {
    let lines = read_header_lines(path, HEADER_SCAN_LINES)?;
    let Some((header, header_row)) = find_column_header_row(&lines) else {
        return Err(TrafficError::unrecognized(path, "no 'Date/Time' header row"));
    };
    let header = repair_header(header);

    let content = fs::read(path).map_err(|e| TrafficError::io(path, e))?;
    let content = String::from_utf8_lossy(&content);
    let body: String = content
        .lines()
        .skip(header_row + 1)
        .collect::<Vec<_>>()
        .join("\n");

    let text = format!("{header}\n{body}");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let columns = match records.next() {
        Some(header) => header.map_err(|e| TrafficError::parse(path, e))?,
        None => return Ok(ReferenceSpeedSeries::default()),
    };
    let position = |name: &str| columns.iter().position(|c| c == name);
    let mean_idx = position(MEAN_SPEED_COLUMN);
    let pct_idx = position(PERCENTILE_COLUMN);

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| TrafficError::parse(path, e))?;
        let Some(timestamp) = record.get(0).and_then(parse_timestamp) else {
            continue;
        };
        rows.push(ReferenceSpeedRow {
            timestamp,
            mean_speed: mean_idx.and_then(|i| parse_speed(record.get(i))),
            percentile_85th: pct_idx.and_then(|i| parse_speed(record.get(i))),
        });
    }

    debug!(path = %path.display(), rows = rows.len(), "Reference speeds loaded");
    Ok(ReferenceSpeedSeries { rows })
}

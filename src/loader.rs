//! Loading a counter export end to end: structure detection, CSV body parsing,
//! enrichment and validation.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{AnalysisConfig, RecordFilter, UNKNOWN_LOCATION};
use crate::error::{Result, TrafficError};
use crate::fallback::{Source, resolve_or};
use crate::metrics::{CoreMetrics, get_core_metrics};
use crate::parser::{
    FileStructure, UTF8_BOM, detect_file_structure, location_from_metadata, location_from_stem,
};
use crate::reference::{ReferenceSpeedSeries, load_reference_speed_data};
use crate::summary::{TrafficSummary, summarize};
use crate::table::{EnrichedRecord, TIMESTAMP_COLUMN, TrafficTable, parse_timestamp};
use crate::transform::{
    FilteringStats, add_basic_enrichments, calculate_speed_compliance, filter_zero_traffic,
};
use crate::validator::{ValidationReport, validate_traffic_data};

/// Suffix of the main (all-data) export of a study location.
pub const MAIN_EXPORT_SUFFIX: &str = "-ALL.csv";

/// A loaded, enriched and validated export.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub table: TrafficTable,
    pub location: String,
    /// Detected structure with `posted_speed` resolved.
    pub structure: FileStructure,
    pub filtering_stats: FilteringStats,
    pub data_quality: ValidationReport,
    pub reference_speeds: Option<ReferenceSpeedSeries>,
    /// Limit used for the compliance columns of `table`.
    pub speed_limit: u32,
}

impl LoadedData {
    pub fn filtered(&self, filter: &RecordFilter) -> TrafficTable {
        self.table.filtered(filter)
    }

    pub fn metrics(
        &self,
        filter: &RecordFilter,
        speed_limit: Option<u32>,
        config: &AnalysisConfig,
    ) -> CoreMetrics {
        get_core_metrics(
            &self.filtered(filter),
            &self.structure,
            self.reference_speeds.as_ref(),
            speed_limit,
            config,
        )
    }

    pub fn summary(&self, filter: &RecordFilter, speed_limit: Option<u32>) -> TrafficSummary {
        let speed_limit = speed_limit.unwrap_or(self.speed_limit);
        summarize(&self.filtered(filter), &self.structure, speed_limit)
    }
}

/// Posted speed: reference file, then the configured default.
pub fn resolve_posted_speed(structure: &FileStructure, config: &AnalysisConfig) -> u32 {
    let sources: [Source<'_, u32>; 1] = [("reference file", &|| structure.posted_speed)];
    resolve_or("posted_speed", &sources, config.default_speed_limit)
}

/// Location name: file metadata, then the file name, then a placeholder.
pub fn resolve_location(path: &Path, metadata_location: Option<&str>) -> String {
    let sources: [Source<'_, String>; 2] = [
        ("metadata", &|| metadata_location.map(str::to_string)),
        ("file name", &|| location_from_stem(path)),
    ];
    resolve_or("location", &sources, UNKNOWN_LOCATION.to_string())
}

/// Detects the structure of `path` and loads it using the posted speed as the
/// compliance limit.
#[tracing::instrument(skip(path, config), fields(path = %path.display()))]
pub fn open(path: &Path, config: &AnalysisConfig) -> Result<LoadedData> {
    let structure = detect_file_structure(path)?;
    let speed_limit = resolve_posted_speed(&structure, config);
    load_data(path, structure, speed_limit, config)
}

/// Loads and enriches the tabular body of `path` using a detected structure.
///
/// # Errors
///
/// Fails with [`TrafficError::Parse`] on a malformed body,
/// [`TrafficError::EmptyData`] when there are no data rows,
/// [`TrafficError::MissingColumns`] when the timestamp or a volume column is
/// absent, [`TrafficError::InvalidTimestamps`] when any timestamp does not
/// parse, and [`TrafficError::Validation`] when a consistency check fails.
#[tracing::instrument(skip(path, structure, config), fields(path = %path.display()))]
pub fn load_data(
    path: &Path,
    mut structure: FileStructure,
    speed_limit: u32,
    config: &AnalysisConfig,
) -> Result<LoadedData> {
    let location = resolve_location(path, structure.location.as_deref());

    let mut table = read_table(path, &structure)?;
    add_basic_enrichments(&mut table, &structure).map_err(|row| {
        TrafficError::parse(
            path,
            format!("directional volumes of data row {} overflow the total", row + 1),
        )
    })?;
    calculate_speed_compliance(&mut table, &structure, speed_limit);
    let filtering_stats = filter_zero_traffic(&mut table);

    structure.posted_speed = Some(resolve_posted_speed(&structure, config));
    let reference_speeds =
        structure
            .reference_files
            .total
            .as_deref()
            .and_then(|p| match load_reference_speed_data(p) {
                Ok(series) => Some(series),
                Err(e) => {
                    warn!(reference = %p.display(), error = %e, "Reference speeds unavailable");
                    None
                }
            });

    let data_quality = validate_traffic_data(&table, &structure, config);
    for warning in &data_quality.warnings {
        warn!(%warning, "Data validation warning");
    }
    if !data_quality.is_valid {
        return Err(TrafficError::Validation {
            path: path.to_path_buf(),
            report: Box::new(data_quality),
        });
    }

    info!(
        location = %location,
        rows = table.len(),
        removed = filtering_stats.removed_rows,
        posted_speed = structure.posted_speed,
        speed_limit,
        "Traffic data loaded"
    );

    Ok(LoadedData {
        table,
        location,
        structure,
        filtering_stats,
        data_quality,
        reference_speeds,
        speed_limit,
    })
}

fn skip_lines(content: &str, n: usize) -> &str {
    let mut rest = content;
    for _ in 0..n {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}

fn parse_count(cell: &str) -> Option<std::result::Result<i64, ()>> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Some(Ok(v));
    }
    match cell.parse::<f64>() {
        // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
        Ok(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            Some(Ok(v as i64))
        }
        _ => Some(Err(())),
    }
}

fn read_table(path: &Path, structure: &FileStructure) -> Result<TrafficTable> {
    let content = fs::read(path).map_err(|e| TrafficError::io(path, e))?;
    let content = String::from_utf8_lossy(&content);
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);
    let body = skip_lines(content, structure.metadata_rows);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| TrafficError::parse(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.iter().all(|c| c.is_empty()) {
        return Err(TrafficError::EmptyData {
            path: path.to_path_buf(),
        });
    }

    let required = [
        Some(TIMESTAMP_COLUMN.to_string()),
        structure.dir1_volume_col.clone(),
        structure.dir2_volume_col.clone(),
    ];
    let fallback_names = [
        TIMESTAMP_COLUMN.to_string(),
        format!("{} volume", structure.dir1_name),
        format!("{} volume", structure.dir2_name),
    ];
    let missing: Vec<String> = required
        .into_iter()
        .zip(fallback_names)
        .filter_map(|(col, name)| match col {
            Some(col) if columns.contains(&col) => None,
            Some(col) => Some(col),
            None => Some(name),
        })
        .collect();
    if !missing.is_empty() {
        return Err(TrafficError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    let timestamp_idx = columns
        .iter()
        .position(|c| c == TIMESTAMP_COLUMN)
        .unwrap_or_default();
    let count_cols: HashSet<String> = structure
        .volume_cols()
        .into_iter()
        .chain(structure.speed_cols())
        .chain(structure.class_cols())
        .collect();

    let mut records = Vec::new();
    let mut invalid_timestamps = 0;
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| TrafficError::parse(path, e))?;

        let mut values = Vec::with_capacity(columns.len());
        for (i, cell) in record.iter().enumerate() {
            if i == timestamp_idx {
                values.push(None);
                continue;
            }
            let value = match parse_count(cell) {
                Some(Ok(v)) => Some(v),
                Some(Err(())) if count_cols.contains(&columns[i]) => {
                    return Err(TrafficError::parse(
                        path,
                        format!(
                            "invalid count value '{cell}' in column '{}' (data row {})",
                            columns[i],
                            row + 1
                        ),
                    ));
                }
                _ => None,
            };
            values.push(value);
        }

        match record.get(timestamp_idx).and_then(parse_timestamp) {
            Some(timestamp) => records.push(EnrichedRecord::new(timestamp, values)),
            None => invalid_timestamps += 1,
        }
    }

    if invalid_timestamps > 0 {
        return Err(TrafficError::InvalidTimestamps {
            path: path.to_path_buf(),
            count: invalid_timestamps,
        });
    }
    if records.is_empty() {
        return Err(TrafficError::EmptyData {
            path: path.to_path_buf(),
        });
    }

    Ok(TrafficTable::new(columns, records))
}

/// Lists the main exports in `dir`, keyed by resolved location name.
pub fn get_available_locations(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut locations = BTreeMap::new();

    let entries = fs::read_dir(dir).map_err(|e| TrafficError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MAIN_EXPORT_SUFFIX))
        })
        .collect();
    files.sort();

    for file in files {
        let metadata_location = location_from_metadata(&file);
        let location = resolve_location(&file, metadata_location.as_deref());
        locations.insert(location, file);
    }

    Ok(locations)
}

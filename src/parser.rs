//! Structure detection for counter export files.
//!
//! An export starts with a handful of `Key,Value` or `"Key:","Value"` metadata
//! lines, followed by a header row containing `Date/Time`, followed by one row
//! per interval. [`detect_file_structure`] reads only the leading window of the
//! file and classifies every header column by role.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::columns::{self, Direction, MAX_VEHICLE_CLASS};
use crate::config::HEADER_SCAN_LINES;
use crate::error::{Result, TrafficError};
use crate::reference::{ReferenceFiles, extract_posted_speed};
use crate::table::TIMESTAMP_COLUMN;

static METADATA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"?(Location|Comments|Title)(?::"?\s*,?|"?\s*,)\s*(.*)$"#)
        .expect("metadata pattern is valid")
});

/// How to interpret a given export file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileStructure {
    /// Index of the header row; tabular data starts here.
    pub metadata_rows: usize,
    pub columns: Vec<String>,
    pub location: Option<String>,
    pub comments: Option<String>,
    pub title: Option<String>,
    pub dir1_name: Direction,
    pub dir2_name: Direction,
    pub dir1_volume_col: Option<String>,
    pub dir2_volume_col: Option<String>,
    pub dir1_speed_cols: Vec<String>,
    pub dir2_speed_cols: Vec<String>,
    pub dir1_class_cols: Vec<String>,
    pub dir2_class_cols: Vec<String>,
    pub reference_files: ReferenceFiles,
    /// Posted speed from the Total reference file; the loader fills in the
    /// configured default when absent.
    pub posted_speed: Option<u32>,
}

impl FileStructure {
    /// Speed-bin columns of both directions.
    pub fn speed_cols(&self) -> Vec<String> {
        [self.dir1_speed_cols.as_slice(), self.dir2_speed_cols.as_slice()].concat()
    }

    pub fn class_cols(&self) -> Vec<String> {
        [self.dir1_class_cols.as_slice(), self.dir2_class_cols.as_slice()].concat()
    }

    pub fn volume_cols(&self) -> Vec<String> {
        self.dir1_volume_col
            .iter()
            .chain(self.dir2_volume_col.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub location: Option<String>,
    pub comments: Option<String>,
    pub title: Option<String>,
}

pub(crate) const UTF8_BOM: char = '\u{feff}';

/// Reads at most `limit` lines from the start of `path`, without a leading
/// byte-order mark.
///
/// Non-UTF-8 bytes are replaced rather than rejected; vendor exports are not
/// always clean.
pub(crate) fn read_header_lines(path: &Path, limit: usize) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| TrafficError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::with_capacity(limit);
    let mut buf = Vec::new();

    while lines.len() < limit {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| TrafficError::io(path, e))?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        let line = if lines.is_empty() {
            line.strip_prefix(UTF8_BOM).unwrap_or(line)
        } else {
            line
        };
        lines.push(line.to_string());
    }

    Ok(lines)
}

fn clean_value(raw: &str) -> Option<String> {
    let value = raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ','));
    (!value.is_empty()).then(|| value.to_string())
}

/// Extracts location, comments and title from the metadata lines.
///
/// The first non-empty value for each key wins.
pub fn extract_metadata<S: AsRef<str>>(lines: &[S]) -> Metadata {
    let mut metadata = Metadata::default();

    for line in lines {
        let Some(caps) = METADATA_FIELD.captures(line.as_ref()) else {
            continue;
        };
        let slot = match &caps[1] {
            "Location" => &mut metadata.location,
            "Comments" => &mut metadata.comments,
            _ => &mut metadata.title,
        };
        if slot.is_none() {
            *slot = clean_value(&caps[2]);
        }
    }

    metadata
}

/// Returns the header line and its row index.
pub fn find_column_header_row<S: AsRef<str>>(lines: &[S]) -> Option<(&str, usize)> {
    lines
        .iter()
        .enumerate()
        .find(|(_, line)| line.as_ref().contains(TIMESTAMP_COLUMN))
        .map(|(i, line)| (line.as_ref(), i))
}

pub fn split_header(line: &str) -> Vec<String> {
    line.split(',')
        .map(|c| c.trim().trim_matches('"').trim().to_string())
        .collect()
}

fn class_cols(columns: &[String], dir: Direction) -> Vec<String> {
    (1..=MAX_VEHICLE_CLASS)
        .filter_map(|n| {
            let col = columns::class_column(columns, dir, n);
            if col.is_none() {
                debug!(direction = %dir, class = n, "No column found for vehicle class");
            }
            col
        })
        .collect()
}

/// Detects the structure of an export file.
///
/// # Errors
///
/// Returns [`TrafficError::Io`] if the file cannot be read and
/// [`TrafficError::StructureNotRecognized`] if no `Date/Time` header row exists
/// within the first [`HEADER_SCAN_LINES`] lines or no column references either
/// traffic direction.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn detect_file_structure(path: &Path) -> Result<FileStructure> {
    let lines = read_header_lines(path, HEADER_SCAN_LINES)?;
    let metadata = extract_metadata(&lines);

    let (header, metadata_rows) = find_column_header_row(&lines).ok_or_else(|| {
        TrafficError::unrecognized(
            path,
            format!("no '{TIMESTAMP_COLUMN}' header row in the first {HEADER_SCAN_LINES} lines"),
        )
    })?;
    let columns = split_header(header);

    let (dir1, dir2) = Direction::detect_pair(&columns);
    let references_direction = columns
        .iter()
        .any(|c| c.contains(dir1.as_str()) || c.contains(dir2.as_str()));
    if !references_direction {
        return Err(TrafficError::unrecognized(
            path,
            format!("no column references {dir1} or {dir2}"),
        ));
    }

    let dir1_volume_col = columns::volume_column(&columns, dir1);
    let dir2_volume_col = columns::volume_column(&columns, dir2);
    if dir1_volume_col.is_none() || dir2_volume_col.is_none() {
        warn!(%dir1, %dir2, "Directional volume column not found");
    }

    let reference_files = ReferenceFiles::discover(path);
    let posted_speed = reference_files
        .total
        .as_deref()
        .and_then(extract_posted_speed);

    let structure = FileStructure {
        metadata_rows,
        location: metadata.location,
        comments: metadata.comments,
        title: metadata.title,
        dir1_name: dir1,
        dir2_name: dir2,
        dir1_volume_col,
        dir2_volume_col,
        dir1_speed_cols: columns::speed_columns(&columns, dir1),
        dir2_speed_cols: columns::speed_columns(&columns, dir2),
        dir1_class_cols: class_cols(&columns, dir1),
        dir2_class_cols: class_cols(&columns, dir2),
        reference_files,
        posted_speed,
        columns,
    };

    debug!(
        metadata_rows,
        dir1 = %dir1,
        dir2 = %dir2,
        speed_cols = structure.dir1_speed_cols.len() + structure.dir2_speed_cols.len(),
        class_cols = structure.dir1_class_cols.len() + structure.dir2_class_cols.len(),
        reference_files = structure.reference_files.count(),
        "File structure detected"
    );

    Ok(structure)
}

/// Display name derived from a file name, e.g.
/// `2809_Hampshire_Ave_N-ALL.csv` becomes `2809 Hampshire Ave N`.
pub fn location_from_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.strip_suffix("-ALL").unwrap_or(stem);
    clean_value(&stem.replace('_', " "))
}

/// Location name from the file's metadata, ignoring read failures.
pub fn location_from_metadata(path: &Path) -> Option<String> {
    let lines = read_header_lines(path, HEADER_SCAN_LINES).ok()?;
    extract_metadata(&lines).location
}

pub(crate) fn base_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.strip_suffix("-ALL").unwrap_or(stem).to_string())
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

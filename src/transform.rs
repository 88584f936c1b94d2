//! Enrichment of loaded records: directional totals, speed compliance and
//! removal of counter idle rows.

use serde::Serialize;
use tracing::debug;

use crate::parser::FileStructure;
use crate::table::{BinColumn, DateRange, EnrichedRecord, TrafficTable};

/// Row counts before and after zero-activity filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteringStats {
    pub original_rows: usize,
    pub filtered_rows: usize,
    pub removed_rows: usize,
    pub removal_percentage: f64,
    pub date_range: Option<DateRange>,
    pub active_hours: usize,
    pub inactive_hours: usize,
}

/// Fills the directional volumes and `total` of every record.
///
/// # Errors
///
/// Returns the index of the first record whose `total` does not fit in an
/// `i64`.
pub fn add_basic_enrichments(
    table: &mut TrafficTable,
    structure: &FileStructure,
) -> std::result::Result<(), usize> {
    let dir1 = structure.dir1_volume_col.as_deref().and_then(|c| table.column_index(c));
    let dir2 = structure.dir2_volume_col.as_deref().and_then(|c| table.column_index(c));
    for (i, record) in table.records_mut().iter_mut().enumerate() {
        record.dir1_volume = cell(record, dir1);
        record.dir2_volume = cell(record, dir2);
        record.total = record
            .dir1_volume
            .checked_add(record.dir2_volume)
            .ok_or(i)?;
    }
    Ok(())
}

fn cell(record: &EnrichedRecord, index: Option<usize>) -> i64 {
    index
        .and_then(|i| record.values.get(i).copied().flatten())
        .unwrap_or(0)
}

/// Sums bin counts into `(compliant, non_compliant)` for one record.
pub fn partition_bins(bins: &[BinColumn], record: &EnrichedRecord, speed_limit: u32) -> (i64, i64) {
    bins.iter().fold((0, 0), |(ok, over), bin| {
        let count = bin.count(record);
        if bin.range.is_compliant(speed_limit) {
            (ok.saturating_add(count), over)
        } else {
            (ok, over.saturating_add(count))
        }
    })
}

/// Fills the per-direction compliant and non-compliant counts.
///
/// A bin is compliant when its lower bound is at or below `speed_limit`.
/// Columns whose name is not a speed range are skipped.
pub fn calculate_speed_compliance(
    table: &mut TrafficTable,
    structure: &FileStructure,
    speed_limit: u32,
) {
    let dir1_bins = table.speed_bins(&structure.dir1_speed_cols);
    let dir2_bins = table.speed_bins(&structure.dir2_speed_cols);

    for record in table.records_mut() {
        (record.dir1_compliant, record.dir1_non_compliant) =
            partition_bins(&dir1_bins, record, speed_limit);
        (record.dir2_compliant, record.dir2_non_compliant) =
            partition_bins(&dir2_bins, record, speed_limit);
    }
}

/// Drops rows where both directional volumes are zero.
///
/// Such rows are counter downtime rather than real zero-traffic hours.
pub fn filter_zero_traffic(table: &mut TrafficTable) -> FilteringStats {
    let original_rows = table.len();
    table.retain(|r| r.dir1_volume != 0 || r.dir2_volume != 0);
    let filtered_rows = table.len();
    let removed_rows = original_rows - filtered_rows;

    debug!(original_rows, filtered_rows, "Zero-activity rows removed");

    FilteringStats {
        original_rows,
        filtered_rows,
        removed_rows,
        removal_percentage: pct(removed_rows, original_rows),
        date_range: table.date_range(),
        active_hours: filtered_rows,
        inactive_hours: removed_rows,
    }
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

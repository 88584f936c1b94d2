//! Metrics engine: the KPI bundle computed from an enriched table.
//!
//! Every function here is pure and total. An empty or zero-count input yields
//! zeros (or `None` for the peak hour) instead of an error, so a filter that
//! selects nothing still produces displayable metrics.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::columns::Direction;
use crate::config::AnalysisConfig;
use crate::fallback::{Source, resolve_or};
use crate::parser::FileStructure;
use crate::reference::ReferenceSpeedSeries;
use crate::table::{BinColumn, TrafficTable};
use crate::transform::partition_bins;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreMetrics {
    pub total_vehicles: i64,
    pub average_daily_traffic: f64,
    /// Speed limit the compliance figures were computed against.
    pub posted_speed: u32,
    pub combined_average_speed: f64,
    /// Percentage of binned vehicles at or under the limit.
    pub compliance_rate: f64,
    #[serde(rename = "85th_percentile_speed")]
    pub percentile_85th_speed: f64,
    /// Hour of day of the busiest (date, hour) slot.
    pub peak_hour: Option<u32>,
    pub peak_vehicles: i64,
    pub dominant_direction: Direction,
    pub dominant_pct: f64,
    pub high_speeders: i64,
    /// Always `None`: hourly data cannot yield a peak hour factor.
    pub peak_hour_factor: Option<f64>,
}

impl CoreMetrics {
    pub fn peak_hour_label(&self) -> String {
        self.peak_hour
            .map_or_else(|| "N/A".to_string(), |h| format!("{h:02}:00"))
    }
}

fn bin_totals(table: &TrafficTable, bins: &[BinColumn]) -> Vec<(BinColumn, i64)> {
    bins.iter()
        .map(|bin| {
            let count = table.records().iter().map(|r| bin.count(r)).sum();
            (bin.clone(), count)
        })
        .collect()
}

/// Count-weighted mean of the bin midpoints, 0 when no vehicle was binned.
pub fn calculate_weighted_speed(table: &TrafficTable, bins: &[BinColumn]) -> f64 {
    let (weighted, count) = bin_totals(table, bins)
        .iter()
        .fold((0.0, 0), |(weighted, count), (bin, n)| {
            (weighted + bin.range.representative_speed() * *n as f64, count + n)
        });
    if count > 0 { weighted / count as f64 } else { 0.0 }
}

/// Compliant share of all binned vehicles, in percent.
pub fn calculate_compliance(table: &TrafficTable, bins: &[BinColumn], speed_limit: u32) -> f64 {
    let (compliant, non_compliant) =
        table
            .records()
            .iter()
            .fold((0, 0), |(ok, over), record| {
                let (c, n) = partition_bins(bins, record, speed_limit);
                (ok + c, over + n)
            });
    let total = compliant + non_compliant;
    if total > 0 {
        compliant as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 85th-percentile speed interpolated linearly inside the bin where the
/// cumulative count first reaches 85% of all binned vehicles.
pub fn calculate_85th_percentile_speed(table: &TrafficTable, bins: &[BinColumn]) -> f64 {
    let mut triples: Vec<(f64, f64, i64)> = bin_totals(table, bins)
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(bin, count)| {
            let (lower, upper) = bin.range.bounds();
            (lower, upper, count)
        })
        .collect();
    if triples.is_empty() {
        return 0.0;
    }
    // count breaks ties between directions sharing a range
    triples.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    let total: i64 = triples.iter().map(|t| t.2).sum();
    let target = 0.85 * total as f64;
    let mut cumulative = 0.0;
    for &(lower, upper, count) in &triples {
        let before = cumulative;
        cumulative += count as f64;
        if cumulative >= target {
            return lower + (target - before) / count as f64 * (upper - lower);
        }
    }
    triples.iter().map(|t| t.1).fold(f64::MIN, f64::max)
}

/// Peak hour factor needs 15-minute counts; hourly exports never have them.
pub fn calculate_phf(_table: &TrafficTable) -> Option<f64> {
    None
}

/// Vehicles in bins whose lower bound is at least `speed_limit + margin`.
pub fn count_high_speeders(
    table: &TrafficTable,
    bins: &[BinColumn],
    speed_limit: u32,
    margin: u32,
) -> i64 {
    let threshold = f64::from(speed_limit.saturating_add(margin));
    bin_totals(table, bins)
        .iter()
        .filter(|(bin, _)| bin.range.compliance_speed() >= threshold)
        .map(|(_, count)| count)
        .sum()
}

/// Mean daily total over complete days.
///
/// Days with fewer than `min_hours` records are excluded; when no day is
/// complete every day is averaged instead.
pub fn calculate_adt(table: &TrafficTable, min_hours: usize) -> f64 {
    let mut days: BTreeMap<NaiveDate, (i64, usize)> = BTreeMap::new();
    for record in table.records() {
        let day = days.entry(record.date()).or_default();
        day.0 += record.total;
        day.1 += 1;
    }

    let complete: Vec<i64> = days
        .values()
        .filter(|(_, hours)| *hours >= min_hours)
        .map(|(sum, _)| *sum)
        .collect();
    let sums = if complete.is_empty() {
        debug!(days = days.len(), "No complete days, averaging all days");
        days.values().map(|(sum, _)| *sum).collect()
    } else {
        complete
    };

    if sums.is_empty() {
        0.0
    } else {
        sums.iter().sum::<i64>() as f64 / sums.len() as f64
    }
}

/// Busiest (date, hour) slot as `(hour, vehicles)`; the earliest slot wins ties.
pub fn peak_hour(table: &TrafficTable) -> Option<(u32, i64)> {
    let mut slots: BTreeMap<(NaiveDate, u32), i64> = BTreeMap::new();
    for record in table.records() {
        *slots.entry((record.date(), record.hour)).or_default() += record.total;
    }

    let mut peak: Option<((NaiveDate, u32), i64)> = None;
    for (slot, total) in slots {
        if peak.is_none_or(|(_, best)| total > best) {
            peak = Some((slot, total));
        }
    }
    peak.map(|((_, hour), total)| (hour, total))
}

/// Direction carrying more traffic and its share in percent. A tie goes to
/// the second direction.
pub fn dominant_direction(table: &TrafficTable, structure: &FileStructure) -> (Direction, f64) {
    let (dir1, dir2) = table.records().iter().fold((0, 0), |(a, b), r| {
        (a + r.dir1_volume, b + r.dir2_volume)
    });
    let (direction, volume) = if dir1 > dir2 {
        (structure.dir1_name, dir1)
    } else {
        (structure.dir2_name, dir2)
    };
    let total = dir1 + dir2;
    let pct = if total > 0 {
        volume as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    (direction, pct)
}

/// Computes the KPI bundle for an (already filtered) table.
///
/// The speed limit is `speed_limit`, else the structure's posted speed, else
/// the configured default. Mean and 85th-percentile speeds prefer the vendor
/// reference series over the binned estimate.
pub fn get_core_metrics(
    table: &TrafficTable,
    structure: &FileStructure,
    reference: Option<&ReferenceSpeedSeries>,
    speed_limit: Option<u32>,
    config: &AnalysisConfig,
) -> CoreMetrics {
    let limit_sources: [Source<'_, u32>; 2] = [
        ("override", &|| speed_limit),
        ("posted speed", &|| structure.posted_speed),
    ];
    let speed_limit = resolve_or("speed_limit", &limit_sources, config.default_speed_limit);

    let bins = table.speed_bins(&structure.speed_cols());
    let timestamps = table.timestamps();
    let binned_count: i64 = bin_totals(table, &bins).iter().map(|(_, n)| n).sum();

    let mean_sources: [Source<'_, f64>; 2] = [
        ("reference file", &|| reference?.mean_speed_for(&timestamps)),
        ("speed bins", &|| {
            (binned_count > 0).then(|| calculate_weighted_speed(table, &bins))
        }),
    ];
    let percentile_sources: [Source<'_, f64>; 2] = [
        ("reference file", &|| reference?.percentile_85th_for(&timestamps)),
        ("speed bins", &|| {
            (binned_count > 0).then(|| calculate_85th_percentile_speed(table, &bins))
        }),
    ];

    let peak = peak_hour(table);
    let (dominant_direction, dominant_pct) = dominant_direction(table, structure);

    CoreMetrics {
        total_vehicles: table.records().iter().map(|r| r.total).sum(),
        average_daily_traffic: calculate_adt(table, config.complete_day_min_hours),
        posted_speed: speed_limit,
        combined_average_speed: resolve_or("mean_speed", &mean_sources, 0.0),
        compliance_rate: calculate_compliance(table, &bins, speed_limit),
        percentile_85th_speed: resolve_or("85th_percentile", &percentile_sources, 0.0),
        peak_hour: peak.map(|(hour, _)| hour),
        peak_vehicles: peak.map_or(0, |(_, vehicles)| vehicles),
        dominant_direction,
        dominant_pct,
        high_speeders: count_high_speeders(table, &bins, speed_limit, config.high_speed_margin),
        peak_hour_factor: calculate_phf(table),
    }
}

/// Results kept by [`MetricsCache::new`] before the oldest is evicted.
pub const METRICS_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    table: u64,
    structure: u64,
    reference: u64,
    speed_limit: Option<u32>,
    config: u64,
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Memoizes [`get_core_metrics`] across repeated filter selections.
///
/// Entries are keyed on the table content, structure, reference series,
/// speed limit and config, so a hit is always equal to a fresh computation.
#[derive(Debug)]
pub struct MetricsCache {
    entries: HashMap<CacheKey, CoreMetrics>,
    /// Insertion order; the oldest entry is evicted once `capacity` is reached.
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: usize,
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::with_capacity(METRICS_CACHE_CAPACITY)
    }
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` results (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
        }
    }

    pub fn get_or_compute(
        &mut self,
        table: &TrafficTable,
        structure: &FileStructure,
        reference: Option<&ReferenceSpeedSeries>,
        speed_limit: Option<u32>,
        config: &AnalysisConfig,
    ) -> CoreMetrics {
        let key = CacheKey {
            table: table.fingerprint(),
            structure: hash_of(structure),
            reference: hash_of(&reference.map(ReferenceSpeedSeries::fingerprint_bits)),
            speed_limit,
            config: hash_of(config),
        };
        if let Some(metrics) = self.entries.get(&key) {
            self.hits += 1;
            return metrics.clone();
        }
        let metrics = get_core_metrics(table, structure, reference, speed_limit, config);
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.entries.insert(key, metrics.clone());
        self.order.push_back(key);
        metrics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ReferenceFiles, ReferenceSpeedRow};
    use crate::table::EnrichedRecord;
    use crate::transform::{add_basic_enrichments, calculate_speed_compliance, filter_zero_traffic};
    use chrono::{Duration, NaiveDateTime};

    const COLUMNS: [&str; 6] = [
        "Northbound",
        "Southbound",
        "25-29 MPH - Northbound",
        "30-34 MPH - Northbound",
        "45+ MPH - Northbound",
        "25-29 MPH - Southbound",
    ];

    fn structure() -> FileStructure {
        FileStructure {
            metadata_rows: 0,
            columns: COLUMNS.iter().map(|s| s.to_string()).collect(),
            location: None,
            comments: None,
            title: None,
            dir1_name: Direction::Northbound,
            dir2_name: Direction::Southbound,
            dir1_volume_col: Some("Northbound".into()),
            dir2_volume_col: Some("Southbound".into()),
            dir1_speed_cols: vec![
                "25-29 MPH - Northbound".into(),
                "30-34 MPH - Northbound".into(),
                "45+ MPH - Northbound".into(),
            ],
            dir2_speed_cols: vec!["25-29 MPH - Southbound".into()],
            dir1_class_cols: vec![],
            dir2_class_cols: vec![],
            reference_files: ReferenceFiles::default(),
            posted_speed: Some(30),
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 11)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Consecutive hourly rows of `[north, south, n25, n30, n45, s25]`.
    fn table(rows: &[[i64; 6]]) -> TrafficTable {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                EnrichedRecord::new(
                    start() + Duration::hours(i as i64),
                    row.iter().map(|v| Some(*v)).collect(),
                )
            })
            .collect();
        let mut t = TrafficTable::new(COLUMNS.iter().map(|s| s.to_string()).collect(), records);
        let s = structure();
        add_basic_enrichments(&mut t, &s).unwrap();
        calculate_speed_compliance(&mut t, &s, 30);
        filter_zero_traffic(&mut t);
        t
    }

    fn bins(t: &TrafficTable) -> Vec<BinColumn> {
        t.speed_bins(&structure().speed_cols())
    }

    #[test]
    fn test_weighted_speed_uses_midpoints() {
        let t = table(&[[15, 0, 10, 5, 0, 0], [20, 0, 0, 20, 0, 0]]);
        let speed = calculate_weighted_speed(&t, &bins(&t));
        let expected = (27.0 * 10.0 + 32.0 * 5.0 + 32.0 * 20.0) / 35.0;
        assert!((speed - expected).abs() < 1e-9);
        assert!((speed - 30.571).abs() < 1e-3);
    }

    #[test]
    fn test_open_ended_bin_midpoint() {
        let t = table(&[[4, 0, 0, 0, 4, 0]]);
        assert!((calculate_weighted_speed(&t, &bins(&t)) - 47.5).abs() < 1e-9);
    }

    #[test]
    fn test_compliance_lower_bound_rule() {
        let t = table(&[[15, 0, 10, 5, 0, 0]]);
        let b = bins(&t);
        // "30-34" is compliant at 30 because its lower bound equals the limit
        assert!((calculate_compliance(&t, &b, 30) - 100.0).abs() < 1e-9);
        assert!((calculate_compliance(&t, &b, 29) - 200.0 / 3.0).abs() < 1e-9);
        assert!((calculate_compliance(&t, &b, 24)).abs() < 1e-9);
    }

    #[test]
    fn test_compliance_is_monotonic_in_speed_limit() {
        let t = table(&[[20, 6, 5, 9, 6, 6], [11, 2, 7, 3, 1, 2]]);
        let b = bins(&t);
        let mut previous = -1.0;
        for limit in 0..60 {
            let rate = calculate_compliance(&t, &b, limit);
            assert!(rate >= previous, "rate dropped at limit {limit}");
            previous = rate;
        }
        assert!((previous - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_85th_percentile_interpolation() {
        // 20 vehicles: target 17, 10 in 25-29 so 7 of 10 into 30-34
        let t = table(&[[20, 0, 10, 10, 0, 0]]);
        let p = calculate_85th_percentile_speed(&t, &bins(&t));
        assert!((p - 32.8).abs() < 1e-9);
    }

    #[test]
    fn test_85th_percentile_is_bounded() {
        let rows = [
            [1, 0, 1, 0, 0, 0],
            [3, 2, 0, 0, 3, 2],
            [9, 4, 3, 6, 0, 4],
            [5, 0, 0, 0, 5, 0],
        ];
        for n in 1..=rows.len() {
            let t = table(&rows[..n]);
            let b = bins(&t);
            let p = calculate_85th_percentile_speed(&t, &b);
            let min_lower = b.iter().map(|b| b.range.bounds().0).fold(f64::MAX, f64::min);
            let max_upper = b.iter().map(|b| b.range.bounds().1).fold(f64::MIN, f64::max);
            assert!(p >= min_lower && p <= max_upper, "{p} out of bounds");
        }
    }

    #[test]
    fn test_85th_percentile_walks_each_direction_bin() {
        // 25-29 holds 2 north then 8 south; target 8.5 lands 6.5/8 into the south bin
        let t = table(&[[2, 8, 2, 0, 0, 8]]);
        let p = calculate_85th_percentile_speed(&t, &bins(&t));
        assert!((p - 28.25).abs() < 1e-9);

        // same counts with the directions swapped give the same walk
        let swapped = table(&[[8, 2, 8, 0, 0, 2]]);
        let q = calculate_85th_percentile_speed(&swapped, &bins(&swapped));
        assert!((q - 28.25).abs() < 1e-9);
    }

    #[test]
    fn test_85th_percentile_without_counts() {
        let t = table(&[[5, 5, 0, 0, 0, 0]]);
        assert_eq!(calculate_85th_percentile_speed(&t, &bins(&t)), 0.0);
    }

    #[test]
    fn test_adt_excludes_partial_days() {
        let mut rows = vec![[20, 0, 0, 0, 0, 0]; 24];
        rows.extend(vec![[25, 0, 0, 0, 0, 0]; 8]);
        let t = table(&rows);
        assert_eq!(t.len(), 32);
        assert!((calculate_adt(&t, 20) - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_adt_falls_back_to_all_days() {
        let t = table(&[[10, 0, 0, 0, 0, 0], [30, 0, 0, 0, 0, 0]]);
        assert!((calculate_adt(&t, 20) - 40.0).abs() < 1e-9);
        assert_eq!(calculate_adt(&TrafficTable::default(), 20), 0.0);
    }

    #[test]
    fn test_peak_hour_prefers_earliest_on_tie() {
        let t = table(&[[3, 1, 0, 0, 0, 0], [9, 1, 0, 0, 0, 0], [5, 5, 0, 0, 0, 0]]);
        assert_eq!(peak_hour(&t), Some((1, 10)));
    }

    #[test]
    fn test_dominant_direction() {
        let t = table(&[[30, 10, 0, 0, 0, 0]]);
        let (dir, pct) = dominant_direction(&t, &structure());
        assert_eq!(dir, Direction::Northbound);
        assert!((pct - 75.0).abs() < 1e-9);

        let tie = table(&[[5, 5, 0, 0, 0, 0]]);
        assert_eq!(dominant_direction(&tie, &structure()).0, Direction::Southbound);
    }

    #[test]
    fn test_high_speeders() {
        let t = table(&[[12, 0, 2, 4, 6, 0]]);
        let b = bins(&t);
        assert_eq!(count_high_speeders(&t, &b, 30, 15), 6);
        assert_eq!(count_high_speeders(&t, &b, 25, 5), 10);
        assert_eq!(count_high_speeders(&t, &b, u32::MAX, 15), 0);
    }

    #[test]
    fn test_core_metrics_on_empty_table() {
        let t = table(&[[0, 0, 0, 0, 0, 0]]);
        assert!(t.is_empty());

        let m = get_core_metrics(&t, &structure(), None, None, &AnalysisConfig::default());
        assert_eq!(m.total_vehicles, 0);
        assert_eq!(m.peak_hour, None);
        assert_eq!(m.peak_hour_label(), "N/A");
        assert_eq!(m.peak_vehicles, 0);
        assert_eq!(m.dominant_pct, 0.0);
        assert_eq!(m.average_daily_traffic, 0.0);
        assert_eq!(m.combined_average_speed, 0.0);
        assert_eq!(m.compliance_rate, 0.0);
        assert_eq!(m.peak_hour_factor, None);
    }

    #[test]
    fn test_core_metrics_speed_limit_chain() {
        let t = table(&[[15, 0, 10, 5, 0, 0]]);
        let config = AnalysisConfig::default();

        let posted = get_core_metrics(&t, &structure(), None, None, &config);
        assert_eq!(posted.posted_speed, 30);
        assert!((posted.compliance_rate - 100.0).abs() < 1e-9);

        let overridden = get_core_metrics(&t, &structure(), None, Some(25), &config);
        assert_eq!(overridden.posted_speed, 25);
        assert!((overridden.compliance_rate - 200.0 / 3.0).abs() < 1e-9);

        let mut unposted = structure();
        unposted.posted_speed = None;
        let config = AnalysisConfig {
            default_speed_limit: 20,
            ..AnalysisConfig::default()
        };
        let defaulted = get_core_metrics(&t, &unposted, None, None, &config);
        assert_eq!(defaulted.posted_speed, 20);
    }

    #[test]
    fn test_core_metrics_prefer_reference_speeds() {
        let t = table(&[[15, 0, 10, 5, 0, 0], [15, 0, 10, 5, 0, 0]]);
        let reference = ReferenceSpeedSeries {
            rows: vec![
                ReferenceSpeedRow {
                    timestamp: start(),
                    mean_speed: Some(31.0),
                    percentile_85th: Some(36.0),
                },
                ReferenceSpeedRow {
                    timestamp: start() + Duration::hours(1),
                    mean_speed: Some(33.0),
                    percentile_85th: None,
                },
                // outside the table, ignored
                ReferenceSpeedRow {
                    timestamp: start() + Duration::hours(7),
                    mean_speed: Some(90.0),
                    percentile_85th: Some(90.0),
                },
            ],
        };

        let m = get_core_metrics(
            &t,
            &structure(),
            Some(&reference),
            None,
            &AnalysisConfig::default(),
        );
        assert!((m.combined_average_speed - 32.0).abs() < 1e-9);
        assert!((m.percentile_85th_speed - 36.0).abs() < 1e-9);
        assert_eq!(m.total_vehicles, 30);
        assert_eq!(m.peak_hour, Some(0));
        assert_eq!(m.peak_hour_label(), "00:00");
    }

    #[test]
    fn test_cache_reuses_results() {
        let t = table(&[[15, 0, 10, 5, 0, 0]]);
        let s = structure();
        let config = AnalysisConfig::default();
        let mut cache = MetricsCache::new();

        let first = cache.get_or_compute(&t, &s, None, None, &config);
        let second = cache.get_or_compute(&t, &s, None, None, &config);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);

        let other = cache.get_or_compute(&t, &s, None, Some(25), &config);
        assert_ne!(first.compliance_rate, other.compliance_rate);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_evicts_oldest_when_full() {
        let t = table(&[[15, 0, 10, 5, 0, 0]]);
        let s = structure();
        let config = AnalysisConfig::default();
        let mut cache = MetricsCache::with_capacity(2);

        for limit in [20, 25, 30] {
            cache.get_or_compute(&t, &s, None, Some(limit), &config);
        }
        assert_eq!(cache.len(), 2);

        // 20 was evicted, 30 is still cached
        cache.get_or_compute(&t, &s, None, Some(30), &config);
        assert_eq!(cache.hits(), 1);
        cache.get_or_compute(&t, &s, None, Some(20), &config);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_core_metrics_json_field_names() {
        let t = table(&[[15, 0, 10, 5, 0, 0]]);
        let m = get_core_metrics(&t, &structure(), None, None, &AnalysisConfig::default());
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("85th_percentile_speed").is_some());
        assert_eq!(json["dominant_direction"], "Northbound");
    }
}

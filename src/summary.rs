//! Supplemental breakdowns shown next to the core metrics.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::columns::{Direction, VehicleClass};
use crate::metrics::calculate_weighted_speed;
use crate::parser::FileStructure;
use crate::table::TrafficTable;
use crate::transform::partition_bins;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyVolume {
    pub hour: u32,
    pub mean_total: f64,
    pub mean_dir1: f64,
    pub mean_dir2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOfWeekVolume {
    pub day: &'static str,
    pub days_observed: usize,
    pub mean_daily_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSpeed {
    pub direction: Direction,
    pub average_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub direction: Direction,
    pub class: VehicleClass,
    pub label: &'static str,
    pub vehicles: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySpeeding {
    pub hour: u32,
    pub dir1_speeding: i64,
    pub dir2_speeding: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub hourly_profile: Vec<HourlyVolume>,
    pub day_of_week: Vec<DayOfWeekVolume>,
    /// Mean hourly total on Monday to Friday.
    pub weekday_hourly_mean: f64,
    pub weekend_hourly_mean: f64,
    pub direction_speeds: Vec<DirectionSpeed>,
    pub class_distribution: Vec<ClassCount>,
    pub speeding_by_hour: Vec<HourlySpeeding>,
}

fn mean(sum: i64, n: usize) -> f64 {
    if n == 0 { 0.0 } else { sum as f64 / n as f64 }
}

/// Mean volumes per hour of day, for the hours present in `table`.
pub fn hourly_profile(table: &TrafficTable) -> Vec<HourlyVolume> {
    let mut hours: BTreeMap<u32, (i64, i64, usize)> = BTreeMap::new();
    for r in table.records() {
        let slot = hours.entry(r.hour).or_default();
        slot.0 += r.dir1_volume;
        slot.1 += r.dir2_volume;
        slot.2 += 1;
    }
    hours
        .into_iter()
        .map(|(hour, (dir1, dir2, n))| HourlyVolume {
            hour,
            mean_total: mean(dir1 + dir2, n),
            mean_dir1: mean(dir1, n),
            mean_dir2: mean(dir2, n),
        })
        .collect()
}

/// Mean daily total per weekday, Monday first; weekdays without data are omitted.
pub fn day_of_week(table: &TrafficTable) -> Vec<DayOfWeekVolume> {
    let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for r in table.records() {
        *days.entry(r.date()).or_default() += r.total;
    }

    let mut by_weekday = [(0i64, 0usize); 7];
    for (date, total) in days {
        let slot = &mut by_weekday[date.weekday().num_days_from_monday() as usize];
        slot.0 += total;
        slot.1 += 1;
    }

    WEEKDAYS
        .iter()
        .zip(by_weekday)
        .filter(|(_, (_, n))| *n > 0)
        .map(|(day, (sum, n))| DayOfWeekVolume {
            day: *day,
            days_observed: n,
            mean_daily_total: mean(sum, n),
        })
        .collect()
}

/// `(weekday, weekend)` mean hourly totals.
pub fn weekday_weekend_means(table: &TrafficTable) -> (f64, f64) {
    let (mut weekday, mut weekend) = ((0, 0), (0, 0));
    for r in table.records() {
        let slot = if r.date().weekday().num_days_from_monday() < 5 {
            &mut weekday
        } else {
            &mut weekend
        };
        slot.0 += r.total;
        slot.1 += 1;
    }
    (mean(weekday.0, weekday.1), mean(weekend.0, weekend.1))
}

pub fn direction_speeds(table: &TrafficTable, structure: &FileStructure) -> Vec<DirectionSpeed> {
    [
        (structure.dir1_name, &structure.dir1_speed_cols),
        (structure.dir2_name, &structure.dir2_speed_cols),
    ]
    .into_iter()
    .map(|(direction, cols)| DirectionSpeed {
        direction,
        average_speed: calculate_weighted_speed(table, &table.speed_bins(cols)),
    })
    .collect()
}

/// Vehicle totals per FHWA class and direction. Class columns whose number
/// cannot be read are skipped.
pub fn class_distribution(table: &TrafficTable, structure: &FileStructure) -> Vec<ClassCount> {
    [
        (structure.dir1_name, &structure.dir1_class_cols),
        (structure.dir2_name, &structure.dir2_class_cols),
    ]
    .into_iter()
    .flat_map(|(direction, cols)| {
        cols.iter().filter_map(move |col| {
            let class = VehicleClass::from_column(col)?;
            Some(ClassCount {
                direction,
                class,
                label: class.label(),
                vehicles: table.column_sum(col),
            })
        })
    })
    .collect()
}

/// Non-compliant vehicles per hour of day for each direction.
pub fn speeding_by_hour(
    table: &TrafficTable,
    structure: &FileStructure,
    speed_limit: u32,
) -> Vec<HourlySpeeding> {
    let dir1_bins = table.speed_bins(&structure.dir1_speed_cols);
    let dir2_bins = table.speed_bins(&structure.dir2_speed_cols);

    let mut hours: BTreeMap<u32, (i64, i64)> = BTreeMap::new();
    for r in table.records() {
        let slot = hours.entry(r.hour).or_default();
        slot.0 += partition_bins(&dir1_bins, r, speed_limit).1;
        slot.1 += partition_bins(&dir2_bins, r, speed_limit).1;
    }
    hours
        .into_iter()
        .map(|(hour, (dir1_speeding, dir2_speeding))| HourlySpeeding {
            hour,
            dir1_speeding,
            dir2_speeding,
        })
        .collect()
}

pub fn summarize(
    table: &TrafficTable,
    structure: &FileStructure,
    speed_limit: u32,
) -> TrafficSummary {
    let (weekday_hourly_mean, weekend_hourly_mean) = weekday_weekend_means(table);
    TrafficSummary {
        hourly_profile: hourly_profile(table),
        day_of_week: day_of_week(table),
        weekday_hourly_mean,
        weekend_hourly_mean,
        direction_speeds: direction_speeds(table, structure),
        class_distribution: class_distribution(table, structure),
        speeding_by_hour: speeding_by_hour(table, structure, speed_limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceFiles;
    use crate::table::EnrichedRecord;
    use crate::transform::add_basic_enrichments;
    use chrono::NaiveDateTime;

    const COLUMNS: [&str; 6] = [
        "Eastbound",
        "Westbound",
        "25-29 MPH - Eastbound",
        "35+ MPH - Eastbound",
        "Class 2 - Westbound",
        "Class #5 - Westbound",
    ];

    fn structure() -> FileStructure {
        FileStructure {
            metadata_rows: 0,
            columns: COLUMNS.iter().map(|s| s.to_string()).collect(),
            location: None,
            comments: None,
            title: None,
            dir1_name: Direction::Eastbound,
            dir2_name: Direction::Westbound,
            dir1_volume_col: Some("Eastbound".into()),
            dir2_volume_col: Some("Westbound".into()),
            dir1_speed_cols: vec!["25-29 MPH - Eastbound".into(), "35+ MPH - Eastbound".into()],
            dir2_speed_cols: vec![],
            dir1_class_cols: vec![],
            dir2_class_cols: vec!["Class 2 - Westbound".into(), "Class #5 - Westbound".into()],
            reference_files: ReferenceFiles::default(),
            posted_speed: Some(30),
        }
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // June 14 2024 is a Friday
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn table(rows: &[(NaiveDateTime, [i64; 6])]) -> TrafficTable {
        let records = rows
            .iter()
            .map(|(ts, row)| EnrichedRecord::new(*ts, row.iter().map(|v| Some(*v)).collect()))
            .collect();
        let mut t = TrafficTable::new(COLUMNS.iter().map(|s| s.to_string()).collect(), records);
        add_basic_enrichments(&mut t, &structure()).unwrap();
        t
    }

    fn sample() -> TrafficTable {
        table(&[
            (at(14, 7), [10, 4, 6, 4, 3, 1]),
            (at(14, 8), [20, 6, 15, 5, 5, 1]),
            (at(15, 7), [2, 2, 2, 0, 2, 0]),
            (at(17, 7), [6, 2, 3, 3, 2, 0]),
        ])
    }

    #[test]
    fn test_hourly_profile() {
        let profile = hourly_profile(&sample());
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].hour, 7);
        assert!((profile[0].mean_total - 26.0 / 3.0).abs() < 1e-9);
        assert!((profile[0].mean_dir1 - 6.0).abs() < 1e-9);
        assert!((profile[1].mean_total - 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_day_of_week_starts_monday() {
        let days = day_of_week(&sample());
        let names: Vec<&str> = days.iter().map(|d| d.day).collect();
        assert_eq!(names, vec!["Monday", "Friday", "Saturday"]);
        assert!((days[1].mean_daily_total - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_weekday_weekend_means() {
        let (weekday, weekend) = weekday_weekend_means(&sample());
        assert!((weekday - 16.0).abs() < 1e-9);
        assert!((weekend - 4.0).abs() < 1e-9);
        assert_eq!(weekday_weekend_means(&TrafficTable::default()), (0.0, 0.0));
    }

    #[test]
    fn test_class_distribution_labels() {
        let classes = class_distribution(&sample(), &structure());
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].class, VehicleClass::PassengerCars);
        assert_eq!(classes[0].vehicles, 12);
        assert_eq!(classes[1].label, "Class 5 - 2 Axles, 6 Tires");
        assert_eq!(classes[1].direction, Direction::Westbound);
    }

    #[test]
    fn test_speeding_by_hour() {
        let speeding = speeding_by_hour(&sample(), &structure(), 30);
        assert_eq!(speeding.len(), 2);
        assert_eq!((speeding[0].hour, speeding[0].dir1_speeding), (7, 7));
        assert_eq!(speeding[1].dir1_speeding, 5);
        assert_eq!(speeding[1].dir2_speeding, 0);
    }

    #[test]
    fn test_direction_speeds() {
        let speeds = direction_speeds(&table(&[(at(14, 7), [2, 0, 1, 1, 0, 0])]), &structure());
        assert!((speeds[0].average_speed - 32.25).abs() < 1e-9);
        assert_eq!(speeds[1].average_speed, 0.0);
    }
}

//! Column-name grammar for counter exports.
//!
//! The vendor encodes direction, speed bin and vehicle class in free-text
//! column names. Every pattern the detector and the metrics understand lives
//! in this module: template lists are tried in order and the first match wins.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Width assumed for an open-ended bin such as "45+ MPH".
pub const OPEN_BIN_WIDTH: f64 = 5.0;

/// FHWA classes reported by the counters, 1 through 6.
pub const MAX_VEHICLE_CLASS: u8 = 6;

/// Speed-bin column suffixes; exports use one or two spaces before the hyphen.
const SPEED_TEMPLATES: &[&str] = &["MPH - {dir}", "MPH  - {dir}"];

/// Historical spellings of the per-class count columns.
const CLASS_TEMPLATES: &[&str] = &[
    "Class #{n} - {dir}",
    "Class {n} - {dir}",
    "Class{n} - {dir}",
    "Class #{n}-{dir}",
    "Class {n}-{dir}",
];

/// Directional volume column names, matched exactly.
const VOLUME_TEMPLATES: &[&str] = &["Volume - {dir}", "{dir}", "{dir} Volume"];

static SPEED_BIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(?:(\+)|-\s*(\d+(?:\.\d+)?))?\s*MPH")
        .expect("speed bin pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Northbound,
    Southbound,
    Eastbound,
    Westbound,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Northbound,
        Direction::Southbound,
        Direction::Eastbound,
        Direction::Westbound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Northbound => "Northbound",
            Direction::Southbound => "Southbound",
            Direction::Eastbound => "Eastbound",
            Direction::Westbound => "Westbound",
        }
    }

    /// Infers the opposing pair present in a header.
    ///
    /// Only N/S and E/W pairs exist; anything without "Northbound" is E/W.
    pub fn detect_pair<S: AsRef<str>>(columns: &[S]) -> (Direction, Direction) {
        if columns.iter().any(|c| c.as_ref().contains("Northbound")) {
            (Direction::Northbound, Direction::Southbound)
        } else {
            (Direction::Eastbound, Direction::Westbound)
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fill(template: &str, dir: Direction, class: u8) -> String {
    template
        .replace("{dir}", dir.as_str())
        .replace("{n}", &class.to_string())
}

pub fn is_speed_column(column: &str, dir: Direction) -> bool {
    SPEED_TEMPLATES
        .iter()
        .any(|t| column.contains(&fill(t, dir, 0)))
}

/// Speed-bin columns for `dir`, in header order.
pub fn speed_columns(columns: &[String], dir: Direction) -> Vec<String> {
    columns
        .iter()
        .filter(|c| is_speed_column(c, dir))
        .cloned()
        .collect()
}

/// The first column containing any spelling of class `class` for `dir`.
pub fn class_column(columns: &[String], dir: Direction, class: u8) -> Option<String> {
    CLASS_TEMPLATES.iter().find_map(|t| {
        let pattern = fill(t, dir, class);
        columns.iter().find(|c| c.contains(&pattern)).cloned()
    })
}

pub fn volume_column(columns: &[String], dir: Direction) -> Option<String> {
    VOLUME_TEMPLATES.iter().find_map(|t| {
        let name = fill(t, dir, 0);
        columns.iter().find(|c| **c == name).cloned()
    })
}

/// Speed range encoded at the start of a speed-bin column name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedRange {
    /// "25-29 MPH"
    Closed { lower: f64, upper: f64 },
    /// "45+ MPH"
    OpenEnded { lower: f64 },
    /// "30 MPH"
    Exact(f64),
}

impl SpeedRange {
    /// Parses the leading speed range of a column name, `None` when the name
    /// does not follow the grammar.
    pub fn parse(column: &str) -> Option<Self> {
        let caps = SPEED_BIN.captures(column)?;
        let lower: f64 = caps.get(1)?.as_str().parse().ok()?;
        if caps.get(2).is_some() {
            return Some(SpeedRange::OpenEnded { lower });
        }
        match caps.get(3) {
            Some(upper) => Some(SpeedRange::Closed {
                lower,
                upper: upper.as_str().parse().ok()?,
            }),
            None => Some(SpeedRange::Exact(lower)),
        }
    }

    /// Speed compared against the limit: the lower bound, or the literal
    /// number of an open-ended bin.
    pub fn compliance_speed(&self) -> f64 {
        match *self {
            SpeedRange::Closed { lower, .. } => lower,
            SpeedRange::OpenEnded { lower } => lower,
            SpeedRange::Exact(speed) => speed,
        }
    }

    /// Compliant when the lower bound does not exceed the limit, so "30-34"
    /// is compliant at 30 mph.
    pub fn is_compliant(&self, speed_limit: u32) -> bool {
        self.compliance_speed() <= f64::from(speed_limit)
    }

    /// Midpoint used for weighted mean speed.
    pub fn representative_speed(&self) -> f64 {
        match *self {
            SpeedRange::Closed { lower, upper } => (lower + upper) / 2.0,
            SpeedRange::OpenEnded { lower } => lower + OPEN_BIN_WIDTH / 2.0,
            SpeedRange::Exact(speed) => speed,
        }
    }

    /// `(lower, upper)` used for percentile interpolation.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            SpeedRange::Closed { lower, upper } => (lower, upper),
            SpeedRange::OpenEnded { lower } => (lower, lower + OPEN_BIN_WIDTH),
            SpeedRange::Exact(speed) => (speed, speed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VehicleClass {
    Motorcycles = 1,
    PassengerCars = 2,
    PickupsVans = 3,
    Buses = 4,
    TwoAxleSixTire = 5,
    ThreeAxle = 6,
}

impl VehicleClass {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(VehicleClass::Motorcycles),
            2 => Some(VehicleClass::PassengerCars),
            3 => Some(VehicleClass::PickupsVans),
            4 => Some(VehicleClass::Buses),
            5 => Some(VehicleClass::TwoAxleSixTire),
            6 => Some(VehicleClass::ThreeAxle),
            _ => None,
        }
    }

    /// Class number parsed back out of a class column name.
    pub fn from_column(column: &str) -> Option<Self> {
        let rest = column.trim_start().strip_prefix("Class")?;
        let digits: String = rest
            .trim_start_matches([' ', '#'])
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        Self::from_number(digits.parse().ok()?)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleClass::Motorcycles => "Class 1 - Motorcycles",
            VehicleClass::PassengerCars => "Class 2 - Passenger Cars",
            VehicleClass::PickupsVans => "Class 3 - Pickups, Vans",
            VehicleClass::Buses => "Class 4 - Buses",
            VehicleClass::TwoAxleSixTire => "Class 5 - 2 Axles, 6 Tires",
            VehicleClass::ThreeAxle => "Class 6 - 3 Axles",
        }
    }
}

//! Error taxonomy for loading and analysing traffic-counter exports.

use std::path::PathBuf;

use thiserror::Error;

use crate::validator::ValidationReport;

pub type Result<T> = std::result::Result<T, TrafficError>;

#[derive(Error, Debug)]
pub enum TrafficError {
    /// The file could not be opened or read.
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header window does not look like a counter export.
    #[error("structure not recognized for '{path}': {reason}")]
    StructureNotRecognized { path: PathBuf, reason: String },

    /// The CSV body is malformed (bad quoting, wrong column count, bad cell).
    #[error("CSV parsing failed for '{path}': {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("'{path}' is empty or contains no data rows")]
    EmptyData { path: PathBuf },

    #[error("missing required columns in '{path}': {}", columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("found {count} invalid date/time values in '{path}'")]
    InvalidTimestamps { path: PathBuf, count: usize },

    /// One or more consistency checks failed; carries the full report.
    #[error("data validation failed for '{path}': {}", report.errors.join("; "))]
    Validation {
        path: PathBuf,
        report: Box<ValidationReport>,
    },

    #[error("invalid configuration in '{path}': {detail}")]
    Config { path: PathBuf, detail: String },
}

impl TrafficError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrafficError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unrecognized(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrafficError::StructureNotRecognized {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        TrafficError::Parse {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// The validation report, when this is a validation failure.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            TrafficError::Validation { report, .. } => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_names() {
        let err = TrafficError::MissingColumns {
            path: PathBuf::from("a.csv"),
            columns: vec!["Date/Time".into(), "Northbound".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing required columns in 'a.csv': Date/Time, Northbound"
        );
    }

    #[test]
    fn test_report_only_on_validation_errors() {
        let err = TrafficError::EmptyData {
            path: PathBuf::from("a.csv"),
        };
        assert!(err.report().is_none());

        let err = TrafficError::Validation {
            path: PathBuf::from("a.csv"),
            report: Box::new(ValidationReport {
                is_valid: false,
                errors: vec!["Found 2 negative values in Northbound".into()],
                ..Default::default()
            }),
        };
        assert_eq!(err.report().map(|r| r.errors.len()), Some(1));
        assert!(err.to_string().contains("negative values"));
    }
}

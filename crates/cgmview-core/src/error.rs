use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal problems with the input file. The pipeline does not run.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file is empty")]
    Empty,

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("No input file given and no default dataset configured")]
    NoInput,
}

/// Rejected filter controls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Date range is inverted: {from} is after {to}")]
    InvertedDateRange { from: NaiveDate, to: NaiveDate },

    #[error("Glucose range is invalid: min {min} > max {max}")]
    InvalidGlucoseRange { min: f64, max: f64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Access key required")]
    MissingKey,

    #[error("Access key not recognized")]
    Denied,
}

//! fluxqc Library
//!
//! A Rust library for quality control and gap-filling of half-hourly
//! eddy-covariance flux and micrometeorological time series.
//!
//! This library provides tools for:
//! - Stepwise outlier screening with a preview/accept workflow per variable
//! - A family of outlier tests (absolute limits, z-score variants, local
//!   outlier factor, rolling local SD, diel-trend residuals, manual removal)
//! - Aggregating per-test flags into one overall quality control flag (QCF)
//!   with independent daytime/nighttime accept thresholds
//! - Harmonizing variables recorded at heterogeneous sampling frequencies
//!   onto one regular time axis
//! - Limiting and gap-filling critical heat/drought days to quantify the
//!   NEP penalty attributable to those days

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod daynight;
        pub mod gapfill;
        pub mod harmonize;
        pub mod outlier;
        pub mod penalty;
        pub mod qcf;
        pub mod runner;
        pub mod screening;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{FlagSeries, TimeSeries};
pub use app::services::screening::StepwiseScreening;
pub use config::ScreeningConfig;

/// Result type alias for fluxqc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for quality screening and penalty operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid or contradictory configuration (bad test parameters,
    /// unusable frequency set, missing pipeline assignment). Fatal for
    /// the session.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invalid data or protocol misuse (mixed units in one input group,
    /// misaligned indexes, result accessed before computation). Fatal for
    /// the call, recoverable upstream.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A single test iteration failed (e.g. numerical non-convergence).
    /// Retried a bounded number of times before the test is skipped.
    #[error("Transient failure in test '{test}': {message}")]
    TransientTestFailure { test: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error in file '{file}': {message}")]
    CsvParsing {
        file: String,
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// Date/time parsing error
    #[error("Date/time parsing error: {message}")]
    DateTimeParsing {
        message: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transient test failure
    pub fn transient(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientTestFailure {
            test: test.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a CSV parsing error with context
    pub fn csv_parsing(
        file: impl Into<String>,
        message: impl Into<String>,
        source: Option<csv::Error>,
    ) -> Self {
        Self::CsvParsing {
            file: file.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a date/time parsing error
    pub fn datetime_parsing(message: impl Into<String>, source: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: message.into(),
            source,
        }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::CsvParsing {
            file: "unknown".to_string(),
            message: "CSV parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: "Date/time parsing failed".to_string(),
            source: error,
        }
    }
}

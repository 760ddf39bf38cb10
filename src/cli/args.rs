//! Command-line argument definitions for fluxqc
//!
//! This module defines the complete CLI interface using the clap derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the fluxqc screening and penalty tool
///
/// Quality-screens half-hourly micrometeorological time series and computes
/// the NEP penalty attributable to critical heat/drought days.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fluxqc",
    version,
    about = "Quality control and gap-filling for eddy-covariance flux time series",
    long_about = "Screens micrometeorological and eddy-covariance time series with a stepwise \
                  battery of outlier tests, aggregates per-test flags into one overall quality \
                  flag (QCF), and quantifies the carbon cost of critical heat/drought days by \
                  limiting and gap-filling the affected data."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Screen one variable and write the cleaned series with its QCF
    Screen(ScreenArgs),
    /// Compute the per-year NEP penalty from critical heat/drought days
    Penalty(PenaltyArgs),
}

/// Arguments for the screen command
#[derive(Debug, Clone, Parser)]
pub struct ScreenArgs {
    /// Input CSV file with a timestamp column and the variable column
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: PathBuf,

    /// Output CSV file for the cleaned series and QCF
    ///
    /// Defaults to `<input stem>_screened.csv` next to the input.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Name of the timestamp column (timestamps mark the interval end)
    #[arg(long = "timestamp-col", value_name = "NAME", default_value = "TIMESTAMP_END")]
    pub timestamp_col: String,

    /// Name of the variable column to screen
    #[arg(short = 'c', long = "column", value_name = "NAME")]
    pub column: String,

    /// Measurement group the variable belongs to (e.g. TA, SW, RH)
    #[arg(short = 'm', long = "measurement", value_name = "GROUP")]
    pub measurement: String,

    /// Units the variable arrives in (must match the configured pipeline)
    #[arg(short = 'u', long = "units", value_name = "UNITS")]
    pub units: String,

    /// Site latitude for day/night classification (decimal degrees)
    #[arg(long = "site-lat", value_name = "DEG", requires = "site_lon")]
    pub site_lat: Option<f64>,

    /// Site longitude for day/night classification (decimal degrees)
    #[arg(long = "site-lon", value_name = "DEG", requires = "site_lat")]
    pub site_lon: Option<f64>,

    /// UTC offset of the timestamps in hours (e.g. 1 for CET)
    #[arg(long = "utc-offset", value_name = "HOURS", default_value_t = 0.0)]
    pub utc_offset: f64,

    /// Skip resampling to the 30-minute working resolution
    #[arg(long = "no-resample")]
    pub no_resample: bool,

    /// Increase logging verbosity
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Suppress all output except errors and the final summary
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Arguments for the penalty command
#[derive(Debug, Clone, Parser)]
pub struct PenaltyArgs {
    /// Input CSV file with timestamp, flux, temperature, humidity,
    /// radiation and VPD columns at 30-minute resolution
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: PathBuf,

    /// Output CSV file for the per-timestep penalty series
    ///
    /// Defaults to `<input stem>_penalty.csv` next to the input.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Name of the timestamp column (timestamps mark the interval end)
    #[arg(long = "timestamp-col", value_name = "NAME", default_value = "TIMESTAMP_END")]
    pub timestamp_col: String,

    /// NEP column (umol CO2 m-2 s-1)
    #[arg(long = "nep-col", value_name = "NAME", default_value = "NEP")]
    pub nep_col: String,

    /// Air temperature column (degC)
    #[arg(long = "ta-col", value_name = "NAME", default_value = "TA")]
    pub ta_col: String,

    /// Relative humidity column (%)
    #[arg(long = "rh-col", value_name = "NAME", default_value = "RH")]
    pub rh_col: String,

    /// Short-wave incoming radiation column (W m-2)
    #[arg(long = "swin-col", value_name = "NAME", default_value = "SW_IN")]
    pub swin_col: String,

    /// Vapor pressure deficit column (kPa), used as the threshold variable
    #[arg(long = "vpd-col", value_name = "NAME", default_value = "VPD")]
    pub vpd_col: String,

    /// Critical threshold: daily VPD maxima at or above this mark a
    /// critical day
    #[arg(long = "critical", value_name = "KPA")]
    pub critical_threshold: f64,

    /// Lower near-critical threshold; near-critical days fall between the
    /// two thresholds
    #[arg(long = "near-critical", value_name = "KPA")]
    pub near_critical_threshold: f64,

    /// First month of the critical-day window (inclusive)
    #[arg(long = "start-month", value_name = "MONTH", default_value_t = 5)]
    pub start_month: u32,

    /// Last month of the critical-day window (inclusive)
    #[arg(long = "end-month", value_name = "MONTH", default_value_t = 9)]
    pub end_month: u32,

    /// Seed for reproducible gap-filling bootstrap runs
    #[arg(long = "seed", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Skip conversion of the flux column from umol CO2 m-2 s-1 to
    /// g CO2 m-2 per 30 minutes
    #[arg(long = "no-unit-conversion")]
    pub no_unit_conversion: bool,

    /// Increase logging verbosity
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Suppress all output except errors and the final summary
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ScreenArgs {
    /// Resolve the output path, defaulting next to the input
    pub fn resolved_output(&self) -> PathBuf {
        resolve_output(&self.input, self.output.as_ref(), "screened")
    }

    pub fn log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }
}

impl PenaltyArgs {
    /// Resolve the output path, defaulting next to the input
    pub fn resolved_output(&self) -> PathBuf {
        resolve_output(&self.input, self.output.as_ref(), "penalty")
    }

    pub fn log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }
}

fn resolve_output(input: &PathBuf, output: Option<&PathBuf>, suffix: &str) -> PathBuf {
    if let Some(path) = output {
        return path.clone();
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".to_string());
    input.with_file_name(format!("{stem}_{suffix}.csv"))
}

fn log_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

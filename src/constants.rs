//! Application constants for fluxqc
//!
//! This module contains flag values, unit conversions, default thresholds,
//! and other fixed values used throughout the screening and penalty pipeline.

// =============================================================================
// Quality Flag Values
// =============================================================================

/// Ordinal flag values used by all outlier tests and the QCF aggregation
pub mod flag {
    /// Value passed the test
    pub const OK: u8 = 0;

    /// Value rejected by the test
    pub const REJECTED: u8 = 2;
}

// =============================================================================
// Unit Conversions
// =============================================================================

/// Conversion from umol CO2 m-2 s-1 to g CO2 m-2 per 30-minute interval
/// (44.01 g mol-1 * 1e-6 * 1800 s)
pub const UMOL_CO2_TO_GRAMS_PER_30MIN: f64 = 0.0792171;

// =============================================================================
// Day/Night Classification
// =============================================================================

/// Potential short-wave radiation below this value counts as nighttime (W m-2)
pub const DEFAULT_NIGHTTIME_RADIATION_THRESHOLD: f64 = 50.0;

/// Top-of-atmosphere solar constant (W m-2)
pub const SOLAR_CONSTANT: f64 = 1361.0;

// =============================================================================
// Screening Defaults
// =============================================================================

/// Iteration cap for repeat-until-clean outlier tests
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Bounded retry count for transient test failures before the test is skipped
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Frequency groups contributing less than this share of total records are
/// rejected as noise/misconfiguration during harmonization
pub const DEFAULT_MIN_FREQUENCY_SHARE: f64 = 0.01;

/// Working time resolution all screened variables are resampled to (seconds)
pub const WORKING_RESOLUTION_SECS: i64 = 1800;

/// Minimum fraction of expected records per resampling window; windows with
/// less coverage become missing
pub const DEFAULT_RESAMPLING_MIN_COVERAGE: f64 = 0.9;

/// Default rejection threshold for z-score tests
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 4.0;

/// Default IQR multiplier for the robust z-score baseline subrange
pub const DEFAULT_IQR_FACTOR: f64 = 1.5;

/// Default neighbor count for local outlier factor tests
pub const DEFAULT_LOF_NEIGHBORS: usize = 20;

/// Default window (samples) for the rolling local SD test
pub const DEFAULT_LOCALSD_WINDOW: usize = 48;

/// Default SD multiplier for the rolling local SD test
pub const DEFAULT_LOCALSD_FACTOR: f64 = 4.0;

/// Default trend window (samples) for the diel-trend residual test
pub const DEFAULT_TREND_WINDOW: usize = 480;

// =============================================================================
// Penalty Defaults
// =============================================================================

/// First month of the critical-day window (inclusive)
pub const DEFAULT_PENALTY_START_MONTH: u32 = 5;

/// Last month of the critical-day window (inclusive)
pub const DEFAULT_PENALTY_END_MONTH: u32 = 9;

/// Daily aggregates for day classification are computed on days starting at
/// this hour, so one heat day spans e.g. 07:00-07:00
pub const DEFAULT_DAY_START_OFFSET_HOURS: i64 = 7;

/// Default neighbor count for the baseline gap-filling regressor
pub const DEFAULT_GAPFILL_NEIGHBORS: usize = 5;

/// Default bootstrap resamples for the baseline gap-filling regressor
pub const DEFAULT_GAPFILL_BOOTSTRAP_RUNS: usize = 3;

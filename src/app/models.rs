//! Core data models for quality screening
//!
//! The foundational types are [`TimeSeries`] (an ordered timestamp -> value
//! mapping with NaN as the missing sentinel) and [`FlagSeries`] (a
//! per-timestamp ordinal quality flag aligned to a source series). Variables
//! downloaded from heterogeneous sources arrive as [`FrequencyGroup`]s, each
//! carrying its own [`Tags`] metadata.

use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

pub mod frame;

pub use frame::Frame;

use crate::constants::flag;

/// A time series over a strictly increasing, unique timestamp index.
///
/// Missing values are represented as NaN, which is distinct from 0. All
/// transformations produce new series; the original input is never mutated
/// in place, preserving before/after comparisons.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    name: String,
    index: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a series, validating index/value alignment and monotonicity
    pub fn new(
        name: impl Into<String>,
        index: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if index.len() != values.len() {
            return Err(Error::validation(format!(
                "index length {} does not match value length {}",
                index.len(),
                values.len()
            )));
        }
        for pair in index.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::validation(format!(
                    "timestamps must be unique and strictly increasing, found {} after {}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            index,
            values,
        })
    }

    /// Create a series on a regular index starting at `start` with the given step
    pub fn regular(
        name: impl Into<String>,
        start: NaiveDateTime,
        step: Duration,
        values: Vec<f64>,
    ) -> Result<Self> {
        if step <= Duration::zero() {
            return Err(Error::validation("time step must be positive"));
        }
        let index = (0..values.len() as i64).map(|i| start + step * i as i32).collect();
        Self::new(name, index, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamp(&self, position: usize) -> NaiveDateTime {
        self.index[position]
    }

    pub fn value(&self, position: usize) -> f64 {
        self.values[position]
    }

    pub fn is_missing(&self, position: usize) -> bool {
        self.values[position].is_nan()
    }

    /// Number of missing (NaN) values
    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Number of valid (non-NaN) values
    pub fn n_valid(&self) -> usize {
        self.len() - self.n_missing()
    }

    /// Positions of all valid (non-NaN) values, in index order
    pub fn valid_positions(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .map(|(i, _)| i)
            .collect()
    }

    /// Set the given positions to missing
    pub fn set_missing(&mut self, positions: &[usize]) {
        for &p in positions {
            self.values[p] = f64::NAN;
        }
    }

    /// New series over the same index with different values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        Self::new(self.name.clone(), self.index.clone(), values)
    }

    /// Infer the sampling step as the most common positive delta between
    /// consecutive timestamps. Returns None for series shorter than two points.
    pub fn infer_step(&self) -> Option<Duration> {
        if self.index.len() < 2 {
            return None;
        }
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for pair in self.index.windows(2) {
            let secs = (pair[1] - pair[0]).num_seconds();
            *counts.entry(secs).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(secs, _)| Duration::seconds(secs))
    }

    /// Mean of valid values
    pub fn mean(&self) -> Option<f64> {
        let valid: Vec<f64> = self.values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }

    /// Sample standard deviation of valid values (n-1 denominator)
    pub fn std(&self) -> Option<f64> {
        let valid: Vec<f64> = self.values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.len() < 2 {
            return None;
        }
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        let var = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
        Some(var.sqrt())
    }

    /// Linearly interpolated quantile of valid values, q in [0, 1]
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let mut valid: Vec<f64> = self.values.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() || !(0.0..=1.0).contains(&q) {
            return None;
        }
        valid.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let rank = q * (valid.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let weight = rank - lo as f64;
        Some(valid[lo] * (1.0 - weight) + valid[hi] * weight)
    }
}

/// Per-timestamp ordinal quality flag aligned to a source series.
///
/// Flag 0 means accepted, even positive values (2, 4, ...) mean increasing
/// severity of rejection. `None` marks timestamps the test did not evaluate,
/// e.g. daytime timestamps for a nighttime-only test.
#[derive(Debug, Clone)]
pub struct FlagSeries {
    name: String,
    index: Vec<NaiveDateTime>,
    values: Vec<Option<u8>>,
}

impl FlagSeries {
    /// Create a flag series with every timestamp unset (not evaluated)
    pub fn unset(name: impl Into<String>, index: Vec<NaiveDateTime>) -> Self {
        let values = vec![None; index.len()];
        Self {
            name: name.into(),
            index,
            values,
        }
    }

    /// Create a flag from disjoint ok/rejected position sets over the source
    /// index. Positions in neither set remain unset.
    pub fn from_partition(
        name: impl Into<String>,
        index: Vec<NaiveDateTime>,
        ok: &[usize],
        rejected: &[usize],
    ) -> Self {
        let mut out = Self::unset(name, index);
        for &p in ok {
            out.values[p] = Some(flag::OK);
        }
        for &p in rejected {
            out.values[p] = Some(flag::REJECTED);
        }
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[Option<u8>] {
        &self.values
    }

    pub fn value(&self, position: usize) -> Option<u8> {
        self.values[position]
    }

    pub fn set(&mut self, position: usize, value: u8) {
        self.values[position] = Some(value);
    }

    pub fn n_rejected(&self) -> usize {
        self.values.iter().filter(|v| v.map_or(false, |f| f > 0)).count()
    }

    pub fn n_ok(&self) -> usize {
        self.values.iter().filter(|v| v.map_or(false, |f| f == 0)).count()
    }

    /// Positions carrying a rejection flag
    pub fn rejected_positions(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.map_or(false, |f| f > 0))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether this flag shares the given index
    pub fn aligned_with(&self, index: &[NaiveDateTime]) -> bool {
        self.index == index
    }
}

/// Metadata tags attached to one raw input frequency group
/// (units, variable name, sampling frequency, provenance).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: BTreeMap<String, String>,
}

impl Tags {
    pub const UNITS: &'static str = "units";
    pub const VARIABLE: &'static str = "varname";
    pub const FREQ: &'static str = "freq";
    pub const DATA_VERSION: &'static str = "data_version";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn units(&self) -> Option<&str> {
        self.get(Self::UNITS)
    }

    pub fn variable(&self) -> Option<&str> {
        self.get(Self::VARIABLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One variable's records at a single recorded sampling frequency, with the
/// tag metadata that arrived with them
#[derive(Debug, Clone)]
pub struct FrequencyGroup {
    /// Sampling interval of this group
    pub interval: Duration,
    /// The records themselves
    pub series: TimeSeries,
    /// Source metadata (units, variable name, provenance)
    pub tags: Tags,
}

impl FrequencyGroup {
    pub fn new(interval: Duration, series: TimeSeries, tags: Tags) -> Result<Self> {
        if interval <= Duration::zero() {
            return Err(Error::validation("sampling interval must be positive"));
        }
        Ok(Self {
            interval,
            series,
            tags,
        })
    }
}

/// Per-timestamp day/night indicator, produced by a
/// [`DayNightClassifier`](crate::app::services::daynight::DayNightClassifier)
#[derive(Debug, Clone)]
pub struct DayNightMask {
    index: Vec<NaiveDateTime>,
    is_night: Vec<bool>,
}

impl DayNightMask {
    pub fn new(index: Vec<NaiveDateTime>, is_night: Vec<bool>) -> Result<Self> {
        if index.len() != is_night.len() {
            return Err(Error::validation(format!(
                "mask length {} does not match index length {}",
                is_night.len(),
                index.len()
            )));
        }
        Ok(Self { index, is_night })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn is_night(&self, position: usize) -> bool {
        self.is_night[position]
    }

    pub fn nighttime_positions(&self) -> Vec<usize> {
        self.is_night
            .iter()
            .enumerate()
            .filter(|(_, n)| **n)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn daytime_positions(&self) -> Vec<usize> {
        self.is_night
            .iter()
            .enumerate()
            .filter(|(_, n)| !**n)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn aligned_with(&self, index: &[NaiveDateTime]) -> bool {
        self.index == index
    }
}

//! Penalty accounting
//!
//! Compares the limited-and-gap-filled (potential) flux against the observed
//! flux: per-timestep penalty = potential - observed, cumulative sums,
//! per-year sums, critical-day counts per year, and the worst year (minimum,
//! i.e. most negative, annual penalty).

use crate::app::models::TimeSeries;
use crate::app::services::gapfill::FillProvenance;
use crate::{Error, Result};
use chrono::{Datelike, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::info;

/// Per-timestep penalty series with cumulatives and day-class flags
#[derive(Debug, Clone)]
pub struct PenaltySeries {
    pub index: Vec<NaiveDateTime>,
    /// Observed flux
    pub observed: Vec<f64>,
    /// Potential flux (limited and gap-filled)
    pub potential: Vec<f64>,
    /// potential - observed
    pub penalty: Vec<f64>,
    pub cum_observed: Vec<f64>,
    pub cum_potential: Vec<f64>,
    pub cum_penalty: Vec<f64>,
    /// Provenance of the potential flux per row
    pub provenance: Vec<FillProvenance>,
    pub critical: Vec<bool>,
    pub near_critical: Vec<bool>,
}

/// Per-year penalty aggregate
#[derive(Debug, Clone)]
pub struct PenaltyPerYear {
    pub year: i32,
    /// Summed penalty (potential - observed)
    pub penalty: f64,
    /// Summed observed flux
    pub observed: f64,
    /// Summed potential flux
    pub potential: f64,
    /// Days whose calendar-day maximum of the threshold variable exceeds the
    /// critical threshold. Deliberately counted over the whole year without
    /// the month window used for classification, and with a strict
    /// comparison, to reproduce the historical accounting.
    pub critical_days: usize,
}

/// Complete penalty result
#[derive(Debug, Clone)]
pub struct PenaltyReport {
    pub hires: PenaltySeries,
    pub per_year: Vec<PenaltyPerYear>,
    /// Year with the minimum (most negative) annual penalty
    pub worst_year: Option<i32>,
}

/// Compute the penalty from observed and potential flux at the working
/// resolution.
///
/// `threshold_series` is the variable used for critical-day definition
/// (e.g. VPD), needed for the per-year critical-day counts.
pub fn compute(
    observed: &TimeSeries,
    potential: &TimeSeries,
    provenance: Vec<FillProvenance>,
    critical: Vec<bool>,
    near_critical: Vec<bool>,
    threshold_series: &TimeSeries,
    critical_threshold: f64,
) -> Result<PenaltyReport> {
    let n = observed.len();
    if potential.index() != observed.index() || threshold_series.index() != observed.index() {
        return Err(Error::validation(
            "observed, potential and threshold series must share one index",
        ));
    }
    if provenance.len() != n || critical.len() != n || near_critical.len() != n {
        return Err(Error::validation(
            "provenance and day-class masks must match the series length",
        ));
    }

    let penalty: Vec<f64> = (0..n)
        .map(|p| potential.value(p) - observed.value(p))
        .collect();

    let hires = PenaltySeries {
        index: observed.index().to_vec(),
        cum_observed: cumulative(observed.values()),
        cum_potential: cumulative(potential.values()),
        cum_penalty: cumulative(&penalty),
        observed: observed.values().to_vec(),
        potential: potential.values().to_vec(),
        penalty,
        provenance,
        critical,
        near_critical,
    };

    let crd_days_per_year = critical_days_per_year(threshold_series, critical_threshold);

    let mut years: BTreeMap<i32, (f64, f64, f64)> = BTreeMap::new();
    for p in 0..n {
        let slot = years.entry(hires.index[p].year()).or_insert((0.0, 0.0, 0.0));
        if !hires.penalty[p].is_nan() {
            slot.0 += hires.penalty[p];
        }
        if !hires.observed[p].is_nan() {
            slot.1 += hires.observed[p];
        }
        if !hires.potential[p].is_nan() {
            slot.2 += hires.potential[p];
        }
    }

    let per_year: Vec<PenaltyPerYear> = years
        .into_iter()
        .map(|(year, (penalty, observed, potential))| PenaltyPerYear {
            year,
            penalty,
            observed,
            potential,
            critical_days: crd_days_per_year.get(&year).copied().unwrap_or(0),
        })
        .collect();

    let worst_year = per_year
        .iter()
        .filter(|y| !y.penalty.is_nan())
        .min_by(|a, b| a.penalty.partial_cmp(&b.penalty).unwrap())
        .map(|y| y.year);

    if let Some(year) = worst_year {
        info!("worst penalty year: {year}");
    }

    Ok(PenaltyReport {
        hires,
        per_year,
        worst_year,
    })
}

/// Percentage penalty for one year or period.
///
/// Meaningful only when observed and potential sums share a sign and the
/// potential exceeds the observed (more uptake, or less emission); all other
/// combinations return None.
pub fn penalty_percentage(observed: f64, potential: f64) -> Option<f64> {
    let same_sign = (observed > 0.0 && potential > 0.0) || (observed < 0.0 && potential < 0.0);
    if same_sign && potential > observed {
        Some((potential - observed) / potential.abs() * 100.0)
    } else {
        None
    }
}

/// Running sums skipping missing values; missing positions stay missing in
/// the output without breaking the accumulation
fn cumulative(values: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else {
                sum += v;
                sum
            }
        })
        .collect()
}

/// Count days per year whose calendar-day maximum exceeds the threshold
/// (strictly; no month window)
fn critical_days_per_year(series: &TimeSeries, threshold: f64) -> BTreeMap<i32, usize> {
    let mut daily_max: BTreeMap<chrono::NaiveDate, f64> = BTreeMap::new();
    for p in 0..series.len() {
        let v = series.value(p);
        if v.is_nan() {
            continue;
        }
        daily_max
            .entry(series.timestamp(p).date())
            .and_modify(|m| *m = m.max(v))
            .or_insert(v);
    }

    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for (day, max) in daily_max {
        if max > threshold {
            *counts.entry(day.year()).or_insert(0) += 1;
        }
    }
    counts
}

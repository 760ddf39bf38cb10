//! Diel-cycle templates
//!
//! A diel template is a half-hour-of-day median profile built from a
//! reference subset of days (the near-critical days). On critical days the
//! observed variable is replaced with the template value for the matching
//! time of day.

use chrono::{NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// Median value per time of day
#[derive(Debug, Clone, Default)]
pub struct DielTemplate {
    medians: BTreeMap<NaiveTime, f64>,
}

impl DielTemplate {
    /// Build the template from the values at the given positions, grouped by
    /// time of day. Missing values are ignored; times of day with no valid
    /// reference value are absent from the template.
    pub fn from_positions(index: &[NaiveDateTime], values: &[f64], positions: &[usize]) -> Self {
        let mut grouped: BTreeMap<NaiveTime, Vec<f64>> = BTreeMap::new();
        for &p in positions {
            let v = values[p];
            if !v.is_nan() {
                grouped.entry(index[p].time()).or_default().push(v);
            }
        }
        let medians = grouped
            .into_iter()
            .map(|(time, group)| (time, median(group)))
            .collect();
        Self { medians }
    }

    /// Template value for a time of day; None where no reference data exists
    pub fn value_at(&self, time: NaiveTime) -> Option<f64> {
        self.medians.get(&time).copied()
    }

    /// Number of populated time-of-day slots
    pub fn n_slots(&self) -> usize {
        self.medians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medians.is_empty()
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

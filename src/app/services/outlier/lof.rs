//! Local outlier factor tests
//!
//! The LOF score of a sample measures the local deviation of its density
//! with respect to its k nearest neighbors; scores near 1 indicate inliers,
//! scores substantially above 1 indicate samples in sparser regions than
//! their neighborhood. Computed here for 1-D value distributions, either
//! over all data or independently for daytime and nighttime partitions.

use super::{require_mask, valid_in_partition, OutlierTest, TestOutcome};
use crate::app::models::{DayNightMask, TimeSeries};
use crate::{Error, Result};

const MIN_REACHABILITY: f64 = 1e-12;

/// Threshold used when no contamination fraction is given; LOF scores below
/// this are treated as inliers regardless of their rank
const AUTO_OFFSET: f64 = 1.5;

/// Positions (into a value-sorted array) of the k nearest neighbors of `s`
fn nearest_neighbors(sorted: &[f64], s: usize, k: usize) -> Vec<usize> {
    let mut lo = s as isize - 1;
    let mut hi = s + 1;
    let mut out = Vec::with_capacity(k);
    while out.len() < k {
        let take_lo = match (lo >= 0, hi < sorted.len()) {
            (true, true) => sorted[s] - sorted[lo as usize] <= sorted[hi] - sorted[s],
            (true, false) => true,
            (false, true) => false,
            (false, false) => break,
        };
        if take_lo {
            out.push(lo as usize);
            lo -= 1;
        } else {
            out.push(hi);
            hi += 1;
        }
    }
    out
}

/// LOF scores for a 1-D sample, k silently reduced to the sample count - 1
pub(crate) fn lof_scores(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![1.0; n];
    }
    let k = k.min(n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
    let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();

    let neighbors: Vec<Vec<usize>> = (0..n).map(|s| nearest_neighbors(&sorted, s, k)).collect();

    let kdist: Vec<f64> = (0..n)
        .map(|s| {
            neighbors[s]
                .iter()
                .map(|&o| (sorted[s] - sorted[o]).abs())
                .fold(0.0, f64::max)
        })
        .collect();

    // Local reachability density
    let lrd: Vec<f64> = (0..n)
        .map(|s| {
            let mean_reach = neighbors[s]
                .iter()
                .map(|&o| kdist[o].max((sorted[s] - sorted[o]).abs()))
                .sum::<f64>()
                / neighbors[s].len() as f64;
            1.0 / mean_reach.max(MIN_REACHABILITY)
        })
        .collect();

    let mut scores = vec![1.0; n];
    for s in 0..n {
        let mean_neighbor_lrd =
            neighbors[s].iter().map(|&o| lrd[o]).sum::<f64>() / neighbors[s].len() as f64;
        scores[order[s]] = mean_neighbor_lrd / lrd[s];
    }
    scores
}

fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    sorted[lo] * (1.0 - weight) + sorted[hi] * weight
}

fn check_contamination(test_id: &str, contamination: Option<f64>) -> Result<()> {
    if let Some(c) = contamination {
        if !c.is_finite() || c <= 0.0 || c > 0.5 {
            return Err(Error::configuration(format!(
                "{test_id}: contamination must be in (0, 0.5], got {c}"
            )));
        }
    }
    Ok(())
}

fn check_neighbors(test_id: &str, n_neighbors: usize) -> Result<()> {
    if n_neighbors == 0 {
        return Err(Error::configuration(format!(
            "{test_id}: n_neighbors must be at least 1"
        )));
    }
    Ok(())
}

/// Score one partition and split it into ok/rejected positions
fn score_partition(
    series: &TimeSeries,
    positions: &[usize],
    n_neighbors: usize,
    contamination: Option<f64>,
) -> TestOutcome {
    let mut outcome = TestOutcome::default();
    if positions.len() < 3 {
        outcome.ok = positions.to_vec();
        return outcome;
    }

    let values: Vec<f64> = positions.iter().map(|&p| series.value(p)).collect();
    let scores = lof_scores(&values, n_neighbors);

    let threshold = match contamination {
        None => AUTO_OFFSET,
        // Scores at or below 1 are inliers by construction
        Some(c) => quantile(&scores, 1.0 - c).max(1.0),
    };

    for (&p, &score) in positions.iter().zip(scores.iter()) {
        if score > threshold {
            outcome.rejected.push(p);
        } else {
            outcome.ok.push(p);
        }
    }
    outcome
}

/// LOF over all data
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    pub n_neighbors: usize,
    /// Expected outlier fraction; `None` uses a fixed score offset as in the
    /// original LOF paper
    pub contamination: Option<f64>,
}

impl LocalOutlierFactor {
    pub fn new(n_neighbors: usize, contamination: Option<f64>) -> Self {
        Self {
            n_neighbors,
            contamination,
        }
    }
}

impl OutlierTest for LocalOutlierFactor {
    fn id(&self) -> &'static str {
        "OUTLIER_LOF"
    }

    fn validate(&self) -> Result<()> {
        check_neighbors(self.id(), self.n_neighbors)?;
        check_contamination(self.id(), self.contamination)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        _daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let positions = valid_in_partition(series, None);
        Ok(score_partition(
            series,
            &positions,
            self.n_neighbors,
            self.contamination,
        ))
    }
}

/// LOF computed independently for daytime and nighttime data, with
/// independent neighbor counts per partition
#[derive(Debug, Clone)]
pub struct LocalOutlierFactorDayNight {
    pub n_neighbors_daytime: usize,
    pub n_neighbors_nighttime: usize,
    pub contamination: Option<f64>,
}

impl LocalOutlierFactorDayNight {
    pub fn new(
        n_neighbors_daytime: usize,
        n_neighbors_nighttime: usize,
        contamination: Option<f64>,
    ) -> Self {
        Self {
            n_neighbors_daytime,
            n_neighbors_nighttime,
            contamination,
        }
    }
}

impl OutlierTest for LocalOutlierFactorDayNight {
    fn id(&self) -> &'static str {
        "OUTLIER_LOF_DTNT"
    }

    fn validate(&self) -> Result<()> {
        check_neighbors(self.id(), self.n_neighbors_daytime)?;
        check_neighbors(self.id(), self.n_neighbors_nighttime)?;
        check_contamination(self.id(), self.contamination)
    }

    fn evaluate(
        &self,
        series: &TimeSeries,
        daynight: Option<&DayNightMask>,
    ) -> Result<TestOutcome> {
        let mask = require_mask(self.id(), series, daynight)?;

        let day = valid_in_partition(series, Some(&mask.daytime_positions()));
        let night = valid_in_partition(series, Some(&mask.nighttime_positions()));

        let mut outcome =
            score_partition(series, &day, self.n_neighbors_daytime, self.contamination);
        outcome.extend(score_partition(
            series,
            &night,
            self.n_neighbors_nighttime,
            self.contamination,
        ));
        Ok(outcome)
    }
}

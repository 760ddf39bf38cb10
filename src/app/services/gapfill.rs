//! Gap-filling collaborator interface
//!
//! The pipeline treats the regression model as a pluggable capability:
//! given a frame of predictor columns plus one target column with gaps,
//! a [`GapFillModel`] returns the target fully populated together with a
//! per-row provenance flag ("observed" vs "modeled"). Feature engineering
//! (timestamp-derived cyclical features, lagged predictor variants) happens
//! here so every model sees the same design matrix.
//!
//! [`KnnBootstrapRegressor`] is the in-repo baseline: a seedable
//! bootstrap-averaged k-nearest-neighbor regressor. It stands in for heavier
//! ensemble regressors behind the same trait and keeps tests deterministic.

use crate::app::models::{Frame, TimeSeries};
use crate::constants::{DEFAULT_GAPFILL_BOOTSTRAP_RUNS, DEFAULT_GAPFILL_NEIGHBORS};
use crate::{Error, Result};
use chrono::{Datelike, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Where a filled value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillProvenance {
    /// Value was present in the input
    Observed,
    /// Value was predicted by the model
    Modeled,
}

/// Feature and reproducibility settings for one gap-filling invocation
#[derive(Debug, Clone)]
pub struct GapFillOptions {
    /// Add each predictor shifted by 1..=n rows as extra features
    pub lagged_variants: usize,
    /// Add cyclical time-of-day and day-of-year features
    pub timestamp_features: bool,
    /// Bootstrap resamples averaged into the prediction
    pub n_bootstrap: usize,
    /// Seed for reproducible bootstrap sampling; without a seed runs are
    /// only weakly reproducible
    pub seed: Option<u64>,
}

impl Default for GapFillOptions {
    fn default() -> Self {
        Self {
            lagged_variants: 1,
            timestamp_features: true,
            n_bootstrap: DEFAULT_GAPFILL_BOOTSTRAP_RUNS,
            seed: None,
        }
    }
}

impl GapFillOptions {
    pub fn with_lagged_variants(mut self, lagged_variants: usize) -> Self {
        self.lagged_variants = lagged_variants;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Result of one gap-filling invocation
#[derive(Debug, Clone)]
pub struct GapFillResult {
    /// Target column with every gap populated
    pub filled: TimeSeries,
    /// Per-row provenance, aligned with the frame index
    pub provenance: Vec<FillProvenance>,
    /// Number of gaps that were filled
    pub n_filled: usize,
}

/// A blocking gap-filling/regression capability.
///
/// Implementations may parallelize internally but must return a completed
/// result; the pipeline treats the call as a potentially slow synchronous
/// operation.
pub trait GapFillModel {
    fn fill(&self, frame: &Frame, target: &str, options: &GapFillOptions) -> Result<GapFillResult>;
}

/// Baseline bootstrap-averaged k-nearest-neighbor regressor
#[derive(Debug, Clone)]
pub struct KnnBootstrapRegressor {
    pub n_neighbors: usize,
}

impl Default for KnnBootstrapRegressor {
    fn default() -> Self {
        Self {
            n_neighbors: DEFAULT_GAPFILL_NEIGHBORS,
        }
    }
}

impl KnnBootstrapRegressor {
    pub fn new(n_neighbors: usize) -> Self {
        Self { n_neighbors }
    }
}

impl GapFillModel for KnnBootstrapRegressor {
    fn fill(&self, frame: &Frame, target: &str, options: &GapFillOptions) -> Result<GapFillResult> {
        if self.n_neighbors == 0 {
            return Err(Error::configuration("n_neighbors must be at least 1"));
        }
        if options.n_bootstrap == 0 {
            return Err(Error::configuration("n_bootstrap must be at least 1"));
        }
        let target_values = frame.require(target)?;
        let features = build_features(frame, target, options);
        let n_rows = frame.len();

        let train: Vec<usize> = (0..n_rows)
            .filter(|&r| {
                !target_values[r].is_nan() && features.iter().all(|f| f[r].is_finite())
            })
            .collect();
        if train.is_empty() {
            return Err(Error::validation(format!(
                "no complete rows available to train gap-filling for '{target}'"
            )));
        }
        let k = self.n_neighbors.min(train.len());

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut filled = target_values.to_vec();
        let mut provenance = vec![FillProvenance::Observed; n_rows];
        let mut n_filled = 0;

        for r in 0..n_rows {
            if !target_values[r].is_nan() {
                continue;
            }
            // Missing features fall back to the (standardized) mean
            let query: Vec<f64> = features
                .iter()
                .map(|f| if f[r].is_finite() { f[r] } else { 0.0 })
                .collect();

            let mut prediction = 0.0;
            for _ in 0..options.n_bootstrap {
                let sample: Vec<usize> = if options.n_bootstrap == 1 {
                    train.clone()
                } else {
                    (0..train.len())
                        .map(|_| train[rng.gen_range(0..train.len())])
                        .collect()
                };
                prediction += knn_predict(&features, target_values, &sample, &query, k);
            }
            filled[r] = prediction / options.n_bootstrap as f64;
            provenance[r] = FillProvenance::Modeled;
            n_filled += 1;
        }

        info!(
            "gap-filled {} of {} rows for '{}' ({} training rows, k={})",
            n_filled,
            n_rows,
            target,
            train.len(),
            k
        );

        Ok(GapFillResult {
            filled: TimeSeries::new(target, frame.index().to_vec(), filled)?,
            provenance,
            n_filled,
        })
    }
}

/// Mean target of the k nearest training rows in feature space
fn knn_predict(
    features: &[Vec<f64>],
    target: &[f64],
    train: &[usize],
    query: &[f64],
    k: usize,
) -> f64 {
    let mut distances: Vec<(f64, usize)> = train
        .iter()
        .map(|&r| {
            let d = features
                .iter()
                .zip(query.iter())
                .map(|(f, q)| (f[r] - q).powi(2))
                .sum::<f64>();
            (d, r)
        })
        .collect();
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let k = k.min(distances.len());
    distances[..k].iter().map(|&(_, r)| target[r]).sum::<f64>() / k as f64
}

/// Standardized design matrix: predictors, lagged variants, cyclical
/// timestamp features
fn build_features(frame: &Frame, target: &str, options: &GapFillOptions) -> Vec<Vec<f64>> {
    let n_rows = frame.len();
    let mut features: Vec<Vec<f64>> = Vec::new();

    for name in frame.names() {
        if name == target {
            continue;
        }
        let column = frame.column(name).expect("column exists").to_vec();
        for lag in 1..=options.lagged_variants {
            let mut lagged = vec![f64::NAN; n_rows];
            for r in lag..n_rows {
                lagged[r] = column[r - lag];
            }
            features.push(standardize(lagged));
        }
        features.push(standardize(column));
    }

    if options.timestamp_features {
        let tau = 2.0 * std::f64::consts::PI;
        let tod: Vec<f64> = frame
            .index()
            .iter()
            .map(|ts| {
                (ts.hour() as f64 * 3600.0
                    + ts.minute() as f64 * 60.0
                    + ts.second() as f64)
                    / 86400.0
            })
            .collect();
        let doy: Vec<f64> = frame
            .index()
            .iter()
            .map(|ts| ts.ordinal() as f64 / 366.0)
            .collect();
        features.push(tod.iter().map(|f| (tau * f).sin()).collect());
        features.push(tod.iter().map(|f| (tau * f).cos()).collect());
        features.push(doy.iter().map(|f| (tau * f).sin()).collect());
        features.push(doy.iter().map(|f| (tau * f).cos()).collect());
    }

    debug!("built {} feature column(s) for gap-filling", features.len());
    features
}

/// Standardize to zero mean and unit variance over finite values
fn standardize(mut values: Vec<f64>) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return values;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var =
        finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    let sd = var.sqrt();
    if sd > 0.0 {
        for v in &mut values {
            *v = (*v - mean) / sd;
        }
    } else {
        for v in &mut values {
            *v -= mean;
        }
    }
    values
}

//! Hyperparameter selection by repeated k-fold cross-validation.

use super::forest::{FeatureMatrix, RegressionFitter};
use super::tree::TreeParams;
use crate::cancellation::CancellationToken;
use crate::error::{AuditError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::thread;
use tracing::debug;

/// One train/test partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold cross-validation repeated with a fresh shuffle each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatedKFold {
    pub splits: usize,
    pub repeats: usize,
    pub seed: u64,
}

impl RepeatedKFold {
    pub fn new(splits: usize, repeats: usize, seed: u64) -> Self {
        Self {
            splits,
            repeats,
            seed,
        }
    }

    /// All `splits * repeats` folds over `n_samples` rows.
    ///
    /// Repeat `r` shuffles with seed `seed + r`; the first `n % splits` folds
    /// of each repeat get one extra test row.
    pub fn folds(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.splits < 2 {
            return Err(AuditError::computation(format!(
                "k-fold cross-validation requires at least one train/test split by setting n_splits=2 or more, got n_splits={}.",
                self.splits
            )));
        }
        if self.splits > n_samples {
            return Err(AuditError::computation(format!(
                "Cannot have number of splits n_splits={} greater than the number of samples: n_samples={}.",
                self.splits, n_samples
            )));
        }

        let mut folds = Vec::with_capacity(self.splits * self.repeats);
        for repeat in 0..self.repeats {
            let mut order: Vec<usize> = (0..n_samples).collect();
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(repeat as u64));
            order.shuffle(&mut rng);

            let base = n_samples / self.splits;
            let extra = n_samples % self.splits;
            let mut start = 0;
            for fold in 0..self.splits {
                let size = base + usize::from(fold < extra);
                let end = start + size;
                let test = order[start..end].to_vec();
                let train = order[..start]
                    .iter()
                    .chain(&order[end..])
                    .copied()
                    .collect();
                folds.push(Fold { train, test });
                start = end;
            }
        }
        Ok(folds)
    }
}

/// Coefficient of determination.
///
/// A constant truth scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    let n = truth.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = truth.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Minimum leaf sizes as `round(n * fraction)` (half to even), at least 1,
/// without duplicates.
pub fn leaf_sizes(n_samples: usize, fractions: &[f64]) -> Vec<usize> {
    let mut sizes: Vec<usize> = Vec::with_capacity(fractions.len());
    for fraction in fractions {
        let size = ((n_samples as f64 * fraction).round_ties_even() as usize).max(1);
        if !sizes.contains(&size) {
            sizes.push(size);
        }
    }
    sizes
}

/// Candidate depths, scaled by dataset size.
pub fn depth_tier(n_samples: usize) -> [usize; 3] {
    if n_samples < 1_000 {
        [5, 10, 15]
    } else if n_samples < 10_000 {
        [20, 25, 30]
    } else {
        [50, 60, 70]
    }
}

/// Leaf size by depth grid, leaf size varying slowest.
pub fn parameter_grid(n_samples: usize, fractions: &[f64]) -> Vec<TreeParams> {
    let depths = depth_tier(n_samples);
    leaf_sizes(n_samples, fractions)
        .into_iter()
        .flat_map(|min_samples_leaf| {
            depths.iter().map(move |&max_depth| TreeParams {
                min_samples_leaf,
                max_depth,
            })
        })
        .collect()
}

/// Mean cross-validated score of one grid point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridScore {
    pub params: TreeParams,
    pub mean_score: f64,
}

/// Result of a grid search.
#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    pub best: GridScore,
    pub scores: Vec<GridScore>,
}

/// Score every grid point with cross-validation and keep the best.
///
/// Grid points are evaluated on scoped threads. The highest mean R² wins;
/// ties keep the earlier grid point.
pub fn grid_search(
    fitter: &dyn RegressionFitter,
    features: &FeatureMatrix,
    target: &[f64],
    grid: &[TreeParams],
    folds: &[Fold],
    seed: u64,
    cancel: &CancellationToken,
) -> Result<GridSearchOutcome> {
    if grid.is_empty() {
        return Err(AuditError::computation("Parameter grid is empty"));
    }

    let mut results: Vec<Result<f64>> = grid.iter().map(|_| Ok(f64::NAN)).collect();

    thread::scope(|s| {
        for (params, slot) in grid.iter().zip(results.iter_mut()) {
            s.spawn(move || {
                *slot = cross_validate(fitter, features, target, *params, folds, seed, cancel);
            });
        }
    });

    let mut scores = Vec::with_capacity(grid.len());
    for (params, result) in grid.iter().zip(results) {
        let mean_score = result?;
        debug!(
            "min_samples_leaf={} max_depth={} mean_r2={:.5}",
            params.min_samples_leaf, params.max_depth, mean_score
        );
        scores.push(GridScore {
            params: *params,
            mean_score,
        });
    }

    let mut best = scores[0];
    for score in &scores[1..] {
        if score.mean_score > best.mean_score || (best.mean_score.is_nan() && !score.mean_score.is_nan()) {
            best = *score;
        }
    }

    Ok(GridSearchOutcome { best, scores })
}

fn cross_validate(
    fitter: &dyn RegressionFitter,
    features: &FeatureMatrix,
    target: &[f64],
    params: TreeParams,
    folds: &[Fold],
    seed: u64,
    cancel: &CancellationToken,
) -> Result<f64> {
    let mut total = 0.0;
    for fold in folds {
        cancel.check()?;
        let model = fitter.fit(features, target, &fold.train, params, seed)?;
        let truth: Vec<f64> = fold.test.iter().map(|&i| target[i]).collect();
        let predicted: Vec<f64> = fold
            .test
            .iter()
            .map(|&i| model.predict(&features.row(i)))
            .collect();
        total += r2_score(&truth, &predicted);
    }
    Ok(total / folds.len().max(1) as f64)
}

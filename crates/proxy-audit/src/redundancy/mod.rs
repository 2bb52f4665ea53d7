//! FACET-style redundancy analyzer.
//!
//! Fits a bagged regression forest that predicts the target column from every
//! other column, tunes its leaf size and depth with repeated k-fold
//! cross-validation, and then measures how much of the model's attribution is
//! shared between feature pairs. The report keeps the rows for the sensitive
//! columns, scaled to percentages.
//!
//! # Pipeline
//!
//! 1. Validate the request and normalize the seed (negative seeds become the
//!    configured default)
//! 2. Drop incomplete rows and build the [`FeatureMatrix`]
//! 3. [`grid_search`] over `min_samples_leaf x max_depth`
//! 4. Refit the winning parameters on all rows
//! 5. [`redundancy_matrix`] over the refit model
//!
//! This is the slowest analysis by far; the grid search fans out over scoped
//! threads and polls the [`CancellationToken`] between folds.

pub mod forest;
pub mod inspection;
pub mod selection;
pub mod tree;

pub use forest::{FeatureMatrix, FittedRegressor, RandomForest, RandomForestFitter, RegressionFitter};
pub use inspection::{RedundancyMatrix, redundancy_matrix};
pub use selection::{GridScore, GridSearchOutcome, RepeatedKFold, grid_search, parameter_grid};
pub use tree::{RegressionTree, TreeParams};

use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::correlation::{format_column_list, missing_columns};
use crate::error::{AuditError, Result};
use crate::types::{RedundancyResult, ScoreValue};
use crate::utils::{column_as_f64, column_names, round_to};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Decimal places kept in reported percentages.
const PERCENT_DECIMALS: i32 = 5;

/// Everything the analyzer needs besides the data.
#[derive(Debug, Clone, Copy)]
pub struct RedundancyRequest<'a> {
    pub sensitive: &'a [String],
    pub target: Option<&'a str>,
    /// Negative values select [`AnalysisConfig::default_seed`].
    pub seed: i64,
}

/// Run the analysis with the default [`RandomForestFitter`].
pub fn analyze(
    request: RedundancyRequest<'_>,
    df: &DataFrame,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<RedundancyResult> {
    let fitter = RandomForestFitter::new(config.estimator_count);
    analyze_with(&fitter, request, df, config, cancel)
}

/// Run the analysis with a caller-supplied fitter.
#[instrument(skip_all, fields(rows = df.height(), columns = df.width(), target = request.target))]
pub fn analyze_with(
    fitter: &dyn RegressionFitter,
    request: RedundancyRequest<'_>,
    df: &DataFrame,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<RedundancyResult> {
    let start = Instant::now();
    let seed = if request.seed < 0 {
        config.default_seed
    } else {
        request.seed as u64
    };

    let target = validate(request, df)?;
    let (features, target_values) = build_training_data(df, target)?;
    let n = features.row_count();

    let folds = selection::RepeatedKFold::new(config.kfold_splits, config.kfold_repeats, seed)
        .folds(n)?;
    let grid = selection::parameter_grid(n, &config.leaf_fractions);
    debug!(
        "Grid search: {} parameter sets x {} folds on {} rows",
        grid.len(),
        folds.len(),
        n
    );

    let outcome = grid_search(fitter, &features, &target_values, &grid, &folds, seed, cancel)?;
    info!(
        "Best parameters: min_samples_leaf={} max_depth={} (mean R2 {:.4})",
        outcome.best.params.min_samples_leaf, outcome.best.params.max_depth, outcome.best.mean_score
    );

    cancel.check()?;
    let all_rows: Vec<usize> = (0..n).collect();
    let model = fitter.fit(&features, &target_values, &all_rows, outcome.best.params, seed)?;
    let matrix = redundancy_matrix(model.as_ref(), &features)?;

    let result = report(&matrix, request.sensitive);
    info!(
        "FACET analysis completed in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(result)
}

/// Check the request against the frame and return the target name.
fn validate<'a>(request: RedundancyRequest<'a>, df: &DataFrame) -> Result<&'a str> {
    if request.sensitive.is_empty() {
        return Err(AuditError::invalid_input("Sensitive Variables needed for FACET"));
    }
    if df.width() == 0 || df.height() == 0 {
        return Err(AuditError::invalid_input("Data needed for FACET"));
    }

    let columns = column_names(df);
    let missing = missing_columns(request.sensitive, &columns);
    if !missing.is_empty() {
        return Err(AuditError::invalid_input(format!(
            "Sensitive variable(s) {} not found in the data columns for FACET",
            format_column_list(&missing)
        )));
    }

    let target = match request.target.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(AuditError::invalid_input(
                "Target Variable(s) needed for FACET",
            ));
        }
    };
    if !columns.iter().any(|c| c == target) {
        return Err(AuditError::invalid_input(format!(
            "Target variable(s) {target} not found in the data columns for FACET"
        )));
    }
    if request.sensitive.iter().any(|s| s == target) {
        return Err(AuditError::invalid_input(format!(
            "Sensitive variable '{target}' cannot also be the target variable for FACET"
        )));
    }

    Ok(target)
}

/// Feature matrix of every non-target column plus the target, complete rows only.
fn build_training_data(df: &DataFrame, target: &str) -> Result<(FeatureMatrix, Vec<f64>)> {
    let names: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| c != target)
        .collect();
    if names.is_empty() {
        return Err(AuditError::computation(format!(
            "No feature columns besides the target '{target}'"
        )));
    }

    let raw_target = column_as_f64(df, target)?;
    let raw_features = names
        .iter()
        .map(|name| column_as_f64(df, name))
        .collect::<Result<Vec<_>>>()?;

    let complete: Vec<usize> = (0..df.height())
        .filter(|&row| {
            raw_target[row].is_some() && raw_features.iter().all(|col| col[row].is_some())
        })
        .collect();

    let dropped = df.height() - complete.len();
    if dropped > 0 {
        warn!("Dropping {} row(s) with missing values before fitting", dropped);
    }
    if complete.is_empty() {
        return Err(AuditError::computation(
            "No complete rows remain after dropping missing values",
        ));
    }

    let target_values = complete
        .iter()
        .map(|&row| raw_target[row].unwrap_or_default())
        .collect();
    let columns = raw_features
        .iter()
        .map(|col| complete.iter().map(|&row| col[row].unwrap_or_default()).collect())
        .collect();

    Ok((FeatureMatrix::new(names, columns)?, target_values))
}

/// Project the matrix onto the sensitive columns as rounded percentages.
fn report(matrix: &RedundancyMatrix, sensitive: &[String]) -> RedundancyResult {
    sensitive
        .iter()
        .map(|sens| {
            let row: BTreeMap<String, ScoreValue> = matrix
                .names()
                .iter()
                .map(|other| {
                    let value = matrix
                        .get(other, sens)
                        .map_or(ScoreValue::NaN, |v| {
                            ScoreValue::from_f64(round_to(v * 100.0, PERCENT_DECIMALS))
                        });
                    (other.clone(), value)
                })
                .collect();
            (sens.clone(), row)
        })
        .collect()
}

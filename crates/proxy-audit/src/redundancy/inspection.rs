//! Feature redundancy derived from a fitted model's contributions.
//!
//! Two features are redundant to the degree that the model attributes the
//! same per-row effects to both. For every pair the Pearson correlation of
//! their contribution vectors is taken; a positive correlation `r` gives a
//! redundancy of `r^2`, anything else gives 0. A pair with a constant
//! contribution vector has no defined correlation and stays NaN.

use super::forest::{FeatureMatrix, FittedRegressor};
use crate::correlation::coefficients::pearson;
use crate::error::Result;

/// Symmetric feature-by-feature redundancy in `[0, 1]`, NaN on the diagonal
/// and for degenerate pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct RedundancyMatrix {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl RedundancyMatrix {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

/// Contribution vectors, one per feature, over every row of `features`.
pub fn contribution_columns(model: &dyn FittedRegressor, features: &FeatureMatrix) -> Vec<Vec<f64>> {
    let mut columns = vec![Vec::with_capacity(features.row_count()); features.feature_count()];
    for row in 0..features.row_count() {
        let contrib = model.contributions(&features.row(row));
        for (column, value) in columns.iter_mut().zip(contrib) {
            column.push(value);
        }
    }
    columns
}

/// Pairwise redundancy of every feature in `features` under `model`.
pub fn redundancy_matrix(
    model: &dyn FittedRegressor,
    features: &FeatureMatrix,
) -> Result<RedundancyMatrix> {
    let contributions = contribution_columns(model, features);
    let n = contributions.len();
    let mut values = vec![vec![f64::NAN; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let r = pearson(&contributions[i], &contributions[j])?;
            let redundancy = if r.is_nan() {
                f64::NAN
            } else if r > 0.0 {
                r * r
            } else {
                0.0
            };
            values[i][j] = redundancy;
            values[j][i] = redundancy;
        }
    }

    Ok(RedundancyMatrix {
        names: features.names().to_vec(),
        values,
    })
}

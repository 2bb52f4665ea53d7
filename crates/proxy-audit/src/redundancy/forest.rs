//! Bagged regression forest and the fitting seam used by model selection.

use super::tree::{RegressionTree, TreeParams};
use crate::error::{AuditError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Column-major feature table with its column names.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    rows: usize,
}

impl FeatureMatrix {
    /// Build from named columns of equal length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(AuditError::computation(format!(
                "{} feature names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        let rows = columns.first().map_or(0, Vec::len);
        if let Some((name, _)) = names.iter().zip(&columns).find(|(_, c)| c.len() != rows) {
            return Err(AuditError::computation(format!(
                "feature '{name}' has a different length than the other features"
            )));
        }
        Ok(Self {
            names,
            columns,
            rows,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Feature values of one row.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }
}

/// A fitted model able to predict and to attribute predictions to features.
pub trait FittedRegressor: Send + Sync {
    fn predict(&self, row: &[f64]) -> f64;

    /// Per-feature contributions for `row`, in feature order.
    fn contributions(&self, row: &[f64]) -> Vec<f64>;
}

/// Something that can train a [`FittedRegressor`] on a subset of rows.
pub trait RegressionFitter: Send + Sync {
    fn fit(
        &self,
        features: &FeatureMatrix,
        target: &[f64],
        rows: &[usize],
        params: TreeParams,
        seed: u64,
    ) -> Result<Box<dyn FittedRegressor>>;
}

/// Bootstrap-aggregated CART trees.
#[derive(Debug, Clone, Copy)]
pub struct RandomForestFitter {
    pub estimator_count: usize,
}

impl RandomForestFitter {
    pub fn new(estimator_count: usize) -> Self {
        Self { estimator_count }
    }
}

impl RegressionFitter for RandomForestFitter {
    fn fit(
        &self,
        features: &FeatureMatrix,
        target: &[f64],
        rows: &[usize],
        params: TreeParams,
        seed: u64,
    ) -> Result<Box<dyn FittedRegressor>> {
        Ok(Box::new(RandomForest::fit(
            features,
            target,
            rows,
            params,
            self.estimator_count,
            seed,
        )?))
    }
}

/// An ensemble of regression trees whose predictions are averaged.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    feature_count: usize,
}

impl RandomForest {
    /// Fit `estimator_count` trees, tree `t` on a bootstrap drawn with seed `seed + t`.
    pub fn fit(
        features: &FeatureMatrix,
        target: &[f64],
        rows: &[usize],
        params: TreeParams,
        estimator_count: usize,
        seed: u64,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(AuditError::computation(
                "Cannot fit a forest on zero samples",
            ));
        }
        if target.len() != features.row_count() {
            return Err(AuditError::computation(format!(
                "target has {} values but features have {} rows",
                target.len(),
                features.row_count()
            )));
        }

        let trees = (0..estimator_count)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..rows.len())
                    .map(|_| rows[rng.gen_range(0..rows.len())])
                    .collect();
                RegressionTree::fit(features.columns(), target, bootstrap, params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            feature_count: features.feature_count(),
        })
    }

    #[cfg(test)]
    pub(crate) fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl FittedRegressor for RandomForest {
    fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    fn contributions(&self, row: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.feature_count];
        for tree in &self.trees {
            tree.add_contributions(row, &mut out);
        }
        let count = self.trees.len().max(1) as f64;
        out.iter_mut().for_each(|v| *v /= count);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_matrix() -> (FeatureMatrix, Vec<f64>) {
        let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i * 13) % 7) as f64).collect();
        let y: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        let matrix = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap();
        (matrix, y)
    }

    #[test]
    fn test_feature_matrix_rejects_ragged_columns() {
        let err = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_forest_fits_linear_signal() {
        let (matrix, y) = linear_matrix();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: 10,
        };
        let forest = RandomForest::fit(&matrix, &y, &rows, params, 20, 0).unwrap();
        assert_eq!(forest.trees().len(), 20);

        let low = forest.predict(&matrix.row(2));
        let high = forest.predict(&matrix.row(37));
        assert!(low < 20.0, "low prediction {low}");
        assert!(high > 60.0, "high prediction {high}");
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (matrix, y) = linear_matrix();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            min_samples_leaf: 2,
            max_depth: 5,
        };
        let first = RandomForest::fit(&matrix, &y, &rows, params, 10, 7).unwrap();
        let second = RandomForest::fit(&matrix, &y, &rows, params, 10, 7).unwrap();
        for row in 0..40 {
            let features = matrix.row(row);
            assert_eq!(first.predict(&features), second.predict(&features));
            assert_eq!(first.contributions(&features), second.contributions(&features));
        }
    }

    #[test]
    fn test_signal_feature_dominates_contributions() {
        let (matrix, y) = linear_matrix();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: 8,
        };
        let forest = RandomForest::fit(&matrix, &y, &rows, params, 10, 1).unwrap();

        let contrib = forest.contributions(&matrix.row(39));
        assert!(contrib[0].abs() > contrib[1].abs());
    }

    #[test]
    fn test_forest_rejects_empty_rows() {
        let (matrix, y) = linear_matrix();
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: 3,
        };
        assert!(RandomForest::fit(&matrix, &y, &[], params, 5, 0).is_err());
    }
}

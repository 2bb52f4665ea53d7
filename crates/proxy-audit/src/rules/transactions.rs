//! Numeric transaction set the rule miner searches over.

use crate::error::Result;
use crate::utils::{column_as_f64, column_names, is_integer_dtype};
use polars::prelude::*;
use tracing::debug;

/// Whether bounds on a feature are whole numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Integer,
    Float,
}

/// One column with its observed range.
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureKind,
    pub min: f64,
    pub max: f64,
    values: Vec<Option<f64>>,
}

impl Feature {
    /// Value at `row`; `None` when missing.
    #[inline]
    pub fn value(&self, row: usize) -> Option<f64> {
        self.values[row]
    }

    /// Map a gene in `[0, 1]` onto the observed range.
    pub fn bound(&self, gene: f64) -> f64 {
        let v = gene * (self.max - self.min) + self.min;
        match self.kind {
            FeatureKind::Integer => v.round(),
            FeatureKind::Float => v,
        }
    }
}

/// Rows as transactions over numeric features.
///
/// Feature ranges are taken from the data, so no manual binning is needed.
#[derive(Debug, Clone)]
pub struct Transactions {
    features: Vec<Feature>,
    rows: usize,
}

impl Transactions {
    /// Build from every numeric column of `df`. Columns without any value are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut features = Vec::with_capacity(df.width());
        for name in column_names(df) {
            let dtype = df.column(&name)?.dtype().clone();
            let values = column_as_f64(df, &name)?;
            let present = values.iter().flatten().copied();
            let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
            if !min.is_finite() {
                debug!("Skipping column '{}' with no values", name);
                continue;
            }

            let kind = if is_integer_dtype(&dtype) {
                FeatureKind::Integer
            } else {
                FeatureKind::Float
            };
            features.push(Feature {
                name,
                kind,
                min,
                max,
                values,
            });
        }

        Ok(Self {
            features,
            rows: df.height(),
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, index: usize) -> &Feature {
        &self.features[index]
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_and_kinds() {
        let df = df![
            "A" => [1i64, 2, 3],
            "B" => [Some(0.5), None, Some(2.5)],
        ]
        .unwrap();
        let transactions = Transactions::from_frame(&df).unwrap();

        assert_eq!(transactions.len(), 3);
        let a = transactions.feature(0);
        assert_eq!((a.min, a.max, a.kind), (1.0, 3.0, FeatureKind::Integer));
        let b = transactions.feature(1);
        assert_eq!((b.min, b.max, b.kind), (0.5, 2.5, FeatureKind::Float));
        assert_eq!(b.value(1), None);
    }

    #[test]
    fn test_bound_mapping() {
        let df = df!["A" => [1i64, 3], "B" => [0.0, 2.0]].unwrap();
        let transactions = Transactions::from_frame(&df).unwrap();
        assert_eq!(transactions.feature(0).bound(0.0), 1.0);
        assert_eq!(transactions.feature(0).bound(0.3), 2.0);
        assert_eq!(transactions.feature(0).bound(1.0), 3.0);
        assert_eq!(transactions.feature(1).bound(0.25), 0.5);
    }

    #[test]
    fn test_all_null_column_is_skipped() {
        let df = df![
            "A" => [1i64, 2],
            "E" => [None::<f64>, None],
        ]
        .unwrap();
        let transactions = Transactions::from_frame(&df).unwrap();
        assert_eq!(transactions.features().len(), 1);
    }
}

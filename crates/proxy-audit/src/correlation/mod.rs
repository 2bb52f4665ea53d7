//! Correlation analyzer.
//!
//! Computes the pairwise correlation of every column against each sensitive
//! column under three definitions (Pearson, Spearman, Kendall). A method that
//! cannot be computed for the given view is reported as
//! [`MethodResult::Failed`] instead of failing the whole call.
//!
//! The numerical work sits behind [`CorrelationEngine`] so another backend can
//! be substituted; [`NativeCorrelation`] is the default.

pub mod coefficients;

use crate::error::{AuditError, Result};
use crate::types::{CorrelationResult, MethodResult, ScoreTable, ScoreValue};
use crate::utils::{column_as_f64, column_names, round_to};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Decimal places kept in reported correlation values.
const SCORE_DECIMALS: i32 = 3;

/// Correlation definitions, in reporting order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub const ALL: [CorrelationMethod; 3] = [
        CorrelationMethod::Pearson,
        CorrelationMethod::Spearman,
        CorrelationMethod::Kendall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
            Self::Kendall => "kendall",
        }
    }

    /// Coefficient over already-paired observations.
    pub fn coefficient(&self, x: &[f64], y: &[f64]) -> Result<f64> {
        match self {
            Self::Pearson => coefficients::pearson(x, y),
            Self::Spearman => coefficients::spearman(x, y),
            Self::Kendall => Ok(coefficients::kendall(x, y)),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Square correlation matrix over the columns of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn new(columns: Vec<String>, values: Vec<Vec<f64>>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Raw coefficient for a pair of columns, `None` if either is unknown.
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let i = self.index_of(row)?;
        let j = self.index_of(column)?;
        self.values.get(i)?.get(j).copied()
    }
}

/// A backend able to produce a full correlation matrix for one method.
pub trait CorrelationEngine: Send + Sync {
    /// Correlate every column of `df` with every other column.
    ///
    /// Fails when a column cannot be interpreted as numbers.
    fn correlation_matrix(&self, df: &DataFrame, method: CorrelationMethod)
    -> Result<CorrelationMatrix>;
}

/// Pairwise-complete correlation: polars expressions for Pearson and
/// Spearman, in-process counting for Kendall.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCorrelation;

impl CorrelationEngine for NativeCorrelation {
    fn correlation_matrix(
        &self,
        df: &DataFrame,
        method: CorrelationMethod,
    ) -> Result<CorrelationMatrix> {
        let names = column_names(df);
        let columns = names
            .iter()
            .map(|name| column_as_f64(df, name))
            .collect::<Result<Vec<_>>>()?;

        let n = columns.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            for j in i..n {
                let (x, y) = coefficients::paired(&columns[i], &columns[j]);
                let r = if i == j && x.len() >= 2 && x.iter().any(|v| *v != x[0]) {
                    1.0
                } else {
                    method.coefficient(&x, &y)?
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        Ok(CorrelationMatrix::new(names, values))
    }
}

/// Correlate every column against each sensitive column using [`NativeCorrelation`].
pub fn analyze(sensitive: &[String], df: &DataFrame) -> Result<CorrelationResult> {
    analyze_with(&NativeCorrelation, sensitive, df)
}

/// Correlate every column against each sensitive column using `engine`.
#[instrument(skip(engine, df), fields(rows = df.height(), columns = df.width()))]
pub fn analyze_with(
    engine: &dyn CorrelationEngine,
    sensitive: &[String],
    df: &DataFrame,
) -> Result<CorrelationResult> {
    if sensitive.is_empty() {
        return Err(AuditError::invalid_input(
            "Sensitive Variables needed for Correlation Analysis",
        ));
    }
    if df.width() == 0 || df.height() == 0 {
        return Err(AuditError::invalid_input(
            "Data needed for Correlation Analysis",
        ));
    }

    let columns = column_names(df);
    let missing = missing_columns(sensitive, &columns);
    if !missing.is_empty() {
        return Err(AuditError::invalid_input(format!(
            "Sensitive variable(s) {} not found in the data columns for Correlation Analysis",
            format_column_list(&missing)
        )));
    }

    let mut results = BTreeMap::new();
    for method in CorrelationMethod::ALL {
        let result = match engine.correlation_matrix(df, method) {
            Ok(matrix) => MethodResult::Scores(project(&matrix, sensitive)),
            Err(e) => {
                warn!("{} correlation could not be computed: {}", method, e);
                MethodResult::Failed(e.to_string())
            }
        };
        debug!("{} correlation done", method);
        results.insert(method, result);
    }

    info!(
        "Correlation analysis completed for {} sensitive column(s)",
        sensitive.len()
    );
    Ok(results)
}

/// Keep the sensitive columns of the matrix, every row, rounded.
fn project(matrix: &CorrelationMatrix, sensitive: &[String]) -> ScoreTable {
    sensitive
        .iter()
        .map(|sens| {
            let scores = matrix
                .columns()
                .iter()
                .map(|other| {
                    let value = matrix
                        .get(other, sens)
                        .map(|r| round_to(r, SCORE_DECIMALS))
                        .map_or(ScoreValue::NaN, ScoreValue::from_f64);
                    (other.clone(), value)
                })
                .collect();
            (sens.clone(), scores)
        })
        .collect()
}

/// Requested names that are not among `columns`, in request order.
pub(crate) fn missing_columns(requested: &[String], columns: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !columns.contains(name))
        .cloned()
        .collect()
}

/// Render names as `['a', 'b']` for error messages.
pub(crate) fn format_column_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitive(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_perfect_linear_pair() {
        let df = df!["A" => [1i64, 2, 3], "B" => [4i64, 5, 6]].unwrap();
        let result = analyze(&sensitive(&["A", "B"]), &df).unwrap();

        for method in CorrelationMethod::ALL {
            let table = result[&method].scores().unwrap();
            assert_eq!(table["A"]["B"], ScoreValue::Value(1.0));
            assert_eq!(table["B"]["A"], ScoreValue::Value(1.0));
            assert_eq!(table["A"]["A"], ScoreValue::Value(1.0));
        }
    }

    #[test]
    fn test_constant_column_reports_nan() {
        let df = df!["A" => [1.0, 2.0, 3.0], "C" => [5.0, 5.0, 5.0]].unwrap();
        let result = analyze(&sensitive(&["A"]), &df).unwrap();
        let table = result[&CorrelationMethod::Pearson].scores().unwrap();
        assert!(table["A"]["C"].is_nan());
    }

    #[test]
    fn test_non_numeric_data_degrades_every_method() {
        let df = df!["Letters" => ["a", "b", "c"]].unwrap();
        let result = analyze(&sensitive(&["Letters"]), &df).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.values().all(MethodResult::is_failed));
    }

    #[test]
    fn test_rows_cover_all_columns() {
        let df = df![
            "A" => [1.0, 2.0, 3.0, 4.0],
            "B" => [2.0, 1.0, 4.0, 3.0],
            "C" => [9.0, 7.0, 8.0, 1.0],
        ]
        .unwrap();
        let result = analyze(&sensitive(&["B"]), &df).unwrap();
        for method_result in result.values() {
            let row = &method_result.scores().unwrap()["B"];
            assert_eq!(row.len(), 3);
            for value in row.values() {
                if let Some(v) = value.as_f64() {
                    assert!((-1.0..=1.0).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_missing_sensitive_variables() {
        let df = df!["A" => [1.0, 2.0]].unwrap();
        let err = analyze(&[], &df).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sensitive Variables needed for Correlation Analysis"
        );
    }

    #[test]
    fn test_empty_data() {
        let err = analyze(&sensitive(&["Salary"]), &DataFrame::empty()).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.to_string(), "Data needed for Correlation Analysis");
    }

    #[test]
    fn test_unknown_sensitive_column() {
        let df = df!["A" => [1.0, 2.0]].unwrap();
        let err = analyze(&sensitive(&["non_existent_column"]), &df).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sensitive variable(s) ['non_existent_column'] not found in the data columns for Correlation Analysis"
        );
    }

    #[test]
    fn test_matrix_lookup() {
        let matrix = CorrelationMatrix::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 0.5], vec![0.5, 1.0]],
        );
        assert_eq!(matrix.get("a", "b"), Some(0.5));
        assert_eq!(matrix.get("a", "z"), None);
    }
}

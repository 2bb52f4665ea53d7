//! Dataset ingestion and working-view derivation.
//!
//! A [`Dataset`] is the uploaded table after the ingestion rules have been
//! applied: a leading identifier column (name containing "id") is dropped
//! and only numeric columns are kept. Working views are derived from it with
//! [`sample_rows`] and [`filter_rows`].

use crate::error::{AuditError, Result};
use crate::utils::{column_names, is_numeric_dtype};
use polars::prelude::*;
use polars::sql::SQLContext;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Name the full dataset is registered under for filter predicates.
const FILTER_TABLE: &str = "data";

/// The active uploaded dataset. All retained columns are numeric.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

impl Dataset {
    /// Apply the ingestion rules to an already-parsed frame.
    pub fn from_frame(df: DataFrame) -> Result<Self> {
        let mut df = df;

        if let Some(first) = df.get_column_names().first().map(|s| s.to_string())
            && first.to_lowercase().contains("id")
        {
            debug!("Dropping identifier column '{}'", first);
            df = df.drop(&first)?;
        }

        let numeric: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .collect();

        if numeric.len() < df.width() {
            let dropped: Vec<String> = column_names(&df)
                .into_iter()
                .filter(|name| !numeric.contains(name))
                .collect();
            debug!("Dropping non-numeric columns: {:?}", dropped);
        }

        if numeric.is_empty() {
            return Err(AuditError::invalid_input("No columns in dataset"));
        }

        let df = df.select(numeric.iter().map(|s| s.as_str()))?;
        info!("Dataset ready: {} rows x {} columns", df.height(), df.width());
        Ok(Self { df })
    }

    /// Parse uploaded CSV bytes and apply the ingestion rules.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| AuditError::invalid_input(format!("Invalid file: {e}")))?;
        Self::from_frame(df)
    }

    /// Read a CSV file from disk and apply the ingestion rules.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            return Err(AuditError::invalid_input("Invalid file"));
        }
        let bytes = std::fs::read(path)?;
        Self::from_csv_bytes(&bytes)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn columns(&self) -> Vec<String> {
        column_names(&self.df)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().iter().any(|c| c.as_str() == name)
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }
}

/// Draw a uniform row subset without replacement.
///
/// `percentage` must be in `(0, 100]`. At 100 the frame is returned unchanged;
/// below that `round(n * percentage / 100)` rows are drawn and kept in their
/// original order.
pub fn sample_rows(df: &DataFrame, percentage: f64, seed: u64) -> Result<DataFrame> {
    if !(percentage > 0.0 && percentage <= 100.0) {
        return Err(AuditError::invalid_input("Invalid Percentage"));
    }

    if percentage >= 100.0 {
        return Ok(df.clone());
    }

    let total = df.height();
    let count = ((total as f64) * percentage / 100.0).round_ties_even() as usize;
    let count = count.min(total);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<IdxSize> = rand::seq::index::sample(&mut rng, total, count)
        .into_iter()
        .map(|i| i as IdxSize)
        .collect();
    indices.sort_unstable();

    debug!("Sampling {} of {} rows (seed {})", count, total, seed);
    let idx = IdxCa::from_vec("idx".into(), indices);
    Ok(df.take(&idx)?)
}

/// Keep the rows matching a boolean SQL predicate over column names.
///
/// The predicate is evaluated as `SELECT * FROM data WHERE <predicate>`.
pub fn filter_rows(df: &DataFrame, predicate: &str) -> Result<DataFrame> {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        return Err(AuditError::invalid_input("No SQL Filter provided"));
    }

    let mut ctx = SQLContext::new();
    ctx.register(FILTER_TABLE, df.clone().lazy());
    let query = format!("SELECT * FROM {FILTER_TABLE} WHERE {predicate}");

    let filtered = ctx
        .execute(&query)
        .and_then(|lf| lf.collect())
        .map_err(|e| AuditError::invalid_input(format!("Invalid filter '{predicate}': {e}")))?;

    if filtered.height() == 0 {
        return Err(AuditError::invalid_input("No rows match the filter"));
    }

    debug!(
        "Filter '{}' kept {} of {} rows",
        predicate,
        filtered.height(),
        df.height()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> DataFrame {
        df![
            "age" => [25i64, 32, 47, 51, 62, 38, 29, 44, 55, 36],
            "salary" => [30.5, 42.0, 61.2, 58.9, 70.1, 45.3, 33.3, 52.7, 66.0, 40.8],
        ]
        .unwrap()
    }

    #[test]
    fn test_from_frame_drops_identifier_and_strings() {
        let df = df![
            "ID" => [1i64, 2, 3],
            "name" => ["a", "b", "c"],
            "age" => [30i64, 40, 50],
            "score" => [0.1, 0.2, 0.3],
        ]
        .unwrap();

        let dataset = Dataset::from_frame(df).unwrap();
        assert_eq!(dataset.columns(), vec!["age".to_string(), "score".to_string()]);
        assert_eq!(dataset.height(), 3);
        assert!(dataset.has_column("age"));
        assert!(!dataset.has_column("ID"));
    }

    #[test]
    fn test_from_frame_keeps_id_like_column_when_not_first() {
        let df = df![
            "age" => [30i64, 40],
            "student_id" => [7i64, 8],
        ]
        .unwrap();
        let dataset = Dataset::from_frame(df).unwrap();
        assert_eq!(dataset.columns().len(), 2);
    }

    #[test]
    fn test_from_frame_without_numeric_columns() {
        let df = df!["letters" => ["a", "b"]].unwrap();
        let err = Dataset::from_frame(df).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.to_string(), "No columns in dataset");
    }

    #[test]
    fn test_from_csv_bytes() {
        let csv = b"id,Age,Gender,City\n1,34,1,Paris\n2,51,0,Lyon\n3,29,1,Nice\n";
        let dataset = Dataset::from_csv_bytes(csv).unwrap();
        assert_eq!(dataset.columns(), vec!["Age".to_string(), "Gender".to_string()]);
        assert_eq!(dataset.height(), 3);
    }

    #[test]
    fn test_from_csv_path_rejects_other_extensions() {
        let err = Dataset::from_csv_path("data.txt").unwrap_err();
        assert_eq!(err.to_string(), "Invalid file");
    }

    #[test]
    fn test_sample_full_percentage_is_identity() {
        let df = people();
        for seed in [0, 7, 42] {
            let view = sample_rows(&df, 100.0, seed).unwrap();
            assert!(view.equals(&df));
        }
    }

    #[test]
    fn test_sample_row_count_and_determinism() {
        let df = people();
        let a = sample_rows(&df, 50.0, 42).unwrap();
        let b = sample_rows(&df, 50.0, 42).unwrap();
        assert_eq!(a.height(), 5);
        assert!(a.equals(&b));
    }

    #[test]
    fn test_sample_rejects_bad_percentage() {
        let df = people();
        for pct in [0.0, -5.0, 100.5, f64::NAN] {
            let err = sample_rows(&df, pct, 0).unwrap_err();
            assert_eq!(err.to_string(), "Invalid Percentage");
        }
    }

    #[test]
    fn test_filter_rows() {
        let df = people();
        let filtered = filter_rows(&df, "age > 40").unwrap();
        assert_eq!(filtered.height(), 5);
    }

    #[test]
    fn test_filter_no_match() {
        let df = people();
        let err = filter_rows(&df, "age > 1000").unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.to_string(), "No rows match the filter");
    }

    #[test]
    fn test_filter_empty_predicate() {
        let df = people();
        let err = filter_rows(&df, "   ").unwrap_err();
        assert_eq!(err.to_string(), "No SQL Filter provided");
    }
}

//! Shared helpers for dtype checks, column extraction and rounding.

use crate::error::{AuditError, Result};
use polars::prelude::*;

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Column names of a frame, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Extract a numeric column as `f64` values. Nulls and non-finite values become `None`.
///
/// Fails with [`AuditError::Computation`] when the column is not numeric.
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(AuditError::computation(format!(
            "could not convert column '{}' of type {} to float",
            name,
            column.dtype()
        )));
    }

    let floats = column
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = floats
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Round to a fixed number of decimal places, normalizing negative zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_is_integer_dtype() {
        assert!(is_integer_dtype(&DataType::UInt8));
        assert!(!is_integer_dtype(&DataType::Float64));
    }

    #[test]
    fn test_column_as_f64_handles_nulls_and_nan() {
        let df = df![
            "a" => [Some(1.0), None, Some(f64::NAN), Some(4.0)],
        ]
        .unwrap();
        let values = column_as_f64(&df, "a").unwrap();
        assert_eq!(values, vec![Some(1.0), None, None, Some(4.0)]);
    }

    #[test]
    fn test_column_as_f64_casts_integers() {
        let df = df!["a" => [1i64, 2, 3]].unwrap();
        assert_eq!(
            column_as_f64(&df, "a").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn test_column_as_f64_rejects_strings() {
        let df = df!["letters" => ["a", "b", "c"]].unwrap();
        let err = column_as_f64(&df, "letters").unwrap_err();
        assert!(err.to_string().contains("letters"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 3), 0.123);
        assert_eq!(round_to(0.8333333, 5), 0.83333);
        assert_eq!(round_to(-0.0001, 3), 0.0);
        assert!(round_to(-0.0001, 3).is_sign_positive());
    }
}

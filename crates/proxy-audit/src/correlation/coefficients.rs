//! Pairwise correlation coefficients.
//!
//! All functions take already-paired observations; use [`paired`] to drop
//! rows where either side is missing. Degenerate inputs (fewer than two
//! observations, zero variance) yield `f64::NAN`.
//!
//! Pearson and Spearman are evaluated by polars; Kendall tau-b is counted
//! here since polars has no expression for it.

use crate::error::Result;
use polars::prelude::*;

/// Keep only positions where both sides are present.
pub fn paired(x: &[Option<f64>], y: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some((*a, *b)),
            _ => None,
        })
        .unzip()
}

/// Pearson product-moment correlation.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    evaluate(x, y, pearson_corr(col("x"), col("y")))
}

/// Spearman rank correlation, ties sharing their average rank.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    evaluate(x, y, spearman_rank_corr(col("x"), col("y"), false))
}

/// Run a two-column correlation expression over paired observations.
fn evaluate(x: &[f64], y: &[f64], expr: Expr) -> Result<f64> {
    let n = x.len().min(y.len());
    if n < 2 || is_constant(&x[..n]) || is_constant(&y[..n]) {
        return Ok(f64::NAN);
    }

    let frame = df!["x" => &x[..n], "y" => &y[..n]]?;
    let out = frame.lazy().select([expr.alias("r")]).collect()?;
    let r = out
        .column("r")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .get(0);

    Ok(r.filter(|v| v.is_finite())
        .map_or(f64::NAN, |v| v.clamp(-1.0, 1.0)))
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Kendall tau-b, corrected for ties on either side.
pub fn kendall(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mut concordant = 0u64;
    let mut discordant = 0u64;
    let mut tied_x_only = 0u64;
    let mut tied_y_only = 0u64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            match (dx == 0.0, dy == 0.0) {
                (true, true) => {}
                (true, false) => tied_x_only += 1,
                (false, true) => tied_y_only += 1,
                (false, false) => {
                    if (dx > 0.0) == (dy > 0.0) {
                        concordant += 1;
                    } else {
                        discordant += 1;
                    }
                }
            }
        }
    }

    let untied_x = (concordant + discordant + tied_y_only) as f64;
    let untied_y = (concordant + discordant + tied_x_only) as f64;
    let denominator = (untied_x * untied_y).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }

    ((concordant as f64 - discordant as f64) / denominator).clamp(-1.0, 1.0)
}

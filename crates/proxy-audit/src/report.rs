//! Exportable analysis reports with heatmap-ready matrices.
//!
//! Rendering is left to the consumer; a [`HeatmapMatrix`] carries labels,
//! values (`null` where a score is NaN) and the color scale bounds.

use crate::error::{Result, ResultExt};
use crate::types::{AnalysisOutcome, ScoreTable};
use chrono::Utc;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// A labelled matrix ready to be drawn as a heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapMatrix {
    pub title: String,
    /// Column labels (every compared column).
    pub x_labels: Vec<String>,
    /// Row labels (the sensitive columns).
    pub y_labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    pub vmin: f64,
    pub vmax: f64,
}

impl HeatmapMatrix {
    /// Build from a `sensitive -> other -> score` table.
    pub fn from_scores(title: impl Into<String>, table: &ScoreTable, vmin: f64, vmax: f64) -> Self {
        let y_labels: Vec<String> = table.keys().cloned().collect();
        let x_labels: Vec<String> = table
            .values()
            .next()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();

        let values = y_labels
            .iter()
            .map(|sens| {
                x_labels
                    .iter()
                    .map(|other| {
                        table
                            .get(sens)
                            .and_then(|row| row.get(other))
                            .and_then(|v| v.as_f64())
                    })
                    .collect()
            })
            .collect();

        Self {
            title: title.into(),
            x_labels,
            y_labels,
            values,
            vmin,
            vmax,
        }
    }
}

/// Heatmaps for an outcome: one per computed correlation method, one for
/// redundancy, none for rules.
pub fn heatmaps(outcome: &AnalysisOutcome) -> Vec<HeatmapMatrix> {
    match outcome {
        AnalysisOutcome::Correlation(results) => results
            .iter()
            .filter_map(|(method, result)| {
                result.scores().map(|table| {
                    HeatmapMatrix::from_scores(
                        format!("{} correlation", method.as_str()),
                        table,
                        -1.0,
                        1.0,
                    )
                })
            })
            .collect(),
        AnalysisOutcome::Redundancy(table) => {
            vec![HeatmapMatrix::from_scores("FACET redundancy (%)", table, 0.0, 100.0)]
        }
        AnalysisOutcome::RuleMining(_) => Vec::new(),
    }
}

/// A self-describing snapshot of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub algorithm: String,
    pub status: String,
    pub row_count: usize,
    pub column_count: usize,
    pub outcome: AnalysisOutcome,
    pub heatmaps: Vec<HeatmapMatrix>,
}

impl AnalysisReport {
    pub fn new(outcome: AnalysisOutcome, view: &DataFrame) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            algorithm: outcome.algorithm().display_name().to_string(),
            status: outcome.status_message().to_string(),
            row_count: view.height(),
            column_count: view.width(),
            heatmaps: heatmaps(&outcome),
            outcome,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(crate::error::AuditError::from)
            .context(format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationMethod;
    use crate::types::{MethodResult, ScoreValue};
    use std::collections::BTreeMap;

    fn table() -> ScoreTable {
        let mut row = BTreeMap::new();
        row.insert("A".to_string(), ScoreValue::NaN);
        row.insert("B".to_string(), ScoreValue::Value(42.5));
        let mut table = BTreeMap::new();
        table.insert("A".to_string(), row);
        table
    }

    #[test]
    fn test_heatmap_from_scores() {
        let heatmap = HeatmapMatrix::from_scores("t", &table(), 0.0, 100.0);
        assert_eq!(heatmap.y_labels, vec!["A".to_string()]);
        assert_eq!(heatmap.x_labels, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(heatmap.values, vec![vec![None, Some(42.5)]]);

        let json = serde_json::to_value(&heatmap).unwrap();
        assert!(json["values"][0][0].is_null());
    }

    #[test]
    fn test_failed_methods_have_no_heatmap() {
        let mut results = BTreeMap::new();
        results.insert(CorrelationMethod::Pearson, MethodResult::Scores(table()));
        results.insert(
            CorrelationMethod::Kendall,
            MethodResult::Failed("could not convert".into()),
        );
        let maps = heatmaps(&AnalysisOutcome::Correlation(results));
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].title, "pearson correlation");
        assert!(heatmaps(&AnalysisOutcome::RuleMining(vec![])).is_empty());
    }

    #[test]
    fn test_report_json() {
        let view = polars::df!["A" => [1.0, 2.0]].unwrap();
        let report = AnalysisReport::new(AnalysisOutcome::Redundancy(table()), &view);
        assert_eq!(report.row_count, 2);
        assert_eq!(report.algorithm, "FACET");

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["outcome"]["algorithm"], "redundancy");
        assert_eq!(json["heatmaps"].as_array().unwrap().len(), 1);
        assert_eq!(json["status"], "FACET analysis completed");
    }
}

//! Result and selection types shared by the analyzers and the session.

use crate::error::AuditError;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Algorithm selection
// ============================================================================

/// The three analyses a session can run. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Pearson, Spearman and Kendall correlation against the sensitive columns.
    Correlation,
    /// FACET-style model-based redundancy.
    Redundancy,
    /// Association rule mining over interval conditions.
    RuleMining,
}

impl Algorithm {
    /// All variants, in menu order.
    pub const ALL: [Algorithm; 3] = [
        Algorithm::Correlation,
        Algorithm::Redundancy,
        Algorithm::RuleMining,
    ];

    /// The name shown to analysts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Correlation => "Correlational Analysis",
            Self::Redundancy => "FACET",
            Self::RuleMining => "Association Rule Mining",
        }
    }

    /// Whether the analysis needs a target column.
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::Redundancy)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Algorithm {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correlational analysis" | "correlation" | "corr" => Ok(Self::Correlation),
            "facet" | "redundancy" => Ok(Self::Redundancy),
            "association rule mining" | "arm" | "rules" => Ok(Self::RuleMining),
            _ => Err(AuditError::invalid_input(format!(
                "Invalid algorithm selected: {s}"
            ))),
        }
    }
}

// ============================================================================
// Scores
// ============================================================================

/// A rounded score, or the "NaN" marker when no number could be computed.
///
/// Serializes as a JSON number or the literal string `"NaN"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreValue {
    Value(f64),
    NaN,
}

impl ScoreValue {
    /// Wrap a raw value, mapping non-finite numbers to the marker.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::NaN
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NaN => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Self::NaN)
    }
}

impl Serialize for ScoreValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NaN => serializer.serialize_str("NaN"),
        }
    }
}

/// `sensitive column -> other column -> score`.
pub type ScoreTable = BTreeMap<String, BTreeMap<String, ScoreValue>>;

/// Outcome of one correlation method.
///
/// A method that could not be computed is a degraded result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MethodResult {
    Scores(ScoreTable),
    Failed(String),
}

impl MethodResult {
    pub fn scores(&self) -> Option<&ScoreTable> {
        match self {
            Self::Scores(table) => Some(table),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

// ============================================================================
// Rules
// ============================================================================

/// One association rule as reported to the analyst.
///
/// Conditions render as `column(min,max)` with bounds rounded to 3 decimals;
/// fitness is rounded to 5 decimals and the other metrics to 6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub antecedent: Vec<String>,
    pub consequent: Vec<String>,
    pub fitness: f64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

// ============================================================================
// Analysis outcome
// ============================================================================

/// Correlation results keyed by method name (`pearson`, `spearman`, `kendall`).
pub type CorrelationResult = BTreeMap<crate::correlation::CorrelationMethod, MethodResult>;

/// Redundancy percentages keyed by sensitive column, then by other column.
pub type RedundancyResult = ScoreTable;

/// The payload produced by one `run_analysis()` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "algorithm", content = "results", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Correlation(CorrelationResult),
    Redundancy(RedundancyResult),
    RuleMining(Vec<RuleRecord>),
}

impl AnalysisOutcome {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Correlation(_) => Algorithm::Correlation,
            Self::Redundancy(_) => Algorithm::Redundancy,
            Self::RuleMining(_) => Algorithm::RuleMining,
        }
    }

    /// Status line reported alongside the results.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Correlation(_) => "Correlation analysis completed",
            Self::Redundancy(_) => "FACET analysis completed",
            Self::RuleMining(_) => "Association Rule Mining completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_from_display_names() {
        for algorithm in Algorithm::ALL {
            let parsed: Algorithm = algorithm.display_name().parse().unwrap();
            assert_eq!(parsed, algorithm);
        }
    }

    #[test]
    fn test_algorithm_aliases() {
        assert_eq!("ARM".parse::<Algorithm>().unwrap(), Algorithm::RuleMining);
        assert_eq!("facet".parse::<Algorithm>().unwrap(), Algorithm::Redundancy);
        assert_eq!(
            " correlation ".parse::<Algorithm>().unwrap(),
            Algorithm::Correlation
        );
    }

    #[test]
    fn test_algorithm_unknown_name() {
        let err = "k-means".parse::<Algorithm>().unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("k-means"));
    }

    #[test]
    fn test_score_value_serialization() {
        let json = serde_json::to_string(&vec![ScoreValue::Value(0.5), ScoreValue::NaN]).unwrap();
        assert_eq!(json, r#"[0.5,"NaN"]"#);
        assert!(ScoreValue::from_f64(f64::NAN).is_nan());
        assert_eq!(ScoreValue::from_f64(1.0).as_f64(), Some(1.0));
    }

    #[test]
    fn test_method_result_untagged() {
        let failed = MethodResult::Failed("could not convert".to_string());
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#""could not convert""#
        );
        assert!(failed.is_failed());
        assert!(failed.scores().is_none());
    }

    #[test]
    fn test_outcome_status_message() {
        let outcome = AnalysisOutcome::RuleMining(vec![]);
        assert_eq!(outcome.algorithm(), Algorithm::RuleMining);
        assert_eq!(outcome.status_message(), "Association Rule Mining completed");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["algorithm"], "rule_mining");
    }
}

//! Association rule miner.
//!
//! Rules are conjunctions of interval conditions (`column in [lo, hi]`) split
//! into an antecedent and a consequent. A [`RuleSearchEngine`] explores the
//! space of candidate rules, maximizing the mean of support and confidence;
//! every rule it encounters with non-zero support is kept and reported.
//!
//! Sensitive columns are accepted for symmetry with the other analyzers but do
//! not restrict the search: rules are mined over every column.

pub mod evolution;
pub mod problem;
pub mod rule;
pub mod transactions;

pub use evolution::{DifferentialEvolution, RuleSearchEngine, SearchSummary};
pub use problem::RuleProblem;
pub use rule::{Condition, Rule, RuleMetrics};
pub use transactions::Transactions;

use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::error::{AuditError, Result};
use crate::types::RuleRecord;
use polars::prelude::*;
use tracing::{info, instrument};

/// Mine rules with [`DifferentialEvolution`] configured from `config`.
///
/// `seed == -1` runs unseeded; any other value (negative ones included, by
/// their two's-complement bits) makes the run reproducible.
pub fn analyze(
    sensitive: &[String],
    df: &DataFrame,
    seed: i64,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Vec<RuleRecord>> {
    let engine = DifferentialEvolution::from_config(config);
    analyze_with(&engine, sensitive, df, seed, cancel)
}

/// Mine rules with a caller-supplied search engine.
#[instrument(skip_all, fields(rows = df.height(), columns = df.width(), seed = seed, sensitive = sensitive.len()))]
pub fn analyze_with(
    engine: &dyn RuleSearchEngine,
    sensitive: &[String],
    df: &DataFrame,
    seed: i64,
    cancel: &CancellationToken,
) -> Result<Vec<RuleRecord>> {
    if df.width() == 0 || df.height() == 0 {
        return Err(AuditError::invalid_input(
            "Data needed for Association Rule Mining",
        ));
    }
    let transactions = Transactions::from_frame(df)?;
    let mut problem = RuleProblem::new(transactions);
    let seed = (seed != -1).then_some(seed as u64);

    let summary = engine.search(&mut problem, seed, cancel)?;
    let rules = problem.into_rules();

    info!(
        "{} produced {} rule(s) in {} evaluations (best fitness {:.5})",
        engine.name(),
        rules.len(),
        summary.evaluations,
        summary.best_fitness
    );
    Ok(rules.iter().map(Rule::to_record).collect())
}

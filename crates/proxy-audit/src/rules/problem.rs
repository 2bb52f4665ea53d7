//! Decoding of continuous candidate vectors into rules.
//!
//! A candidate for `n` features has `4n + 1` genes in `[0, 1]`:
//!
//! | genes            | meaning                                          |
//! |------------------|--------------------------------------------------|
//! | `0..n`           | ordering key per feature (higher comes first)    |
//! | `n + 3i`         | lower bound gene of feature `i`                  |
//! | `n + 3i + 1`     | upper bound gene of feature `i`                  |
//! | `n + 3i + 2`     | inclusion gene of feature `i` (`>= 0.5` keeps it) |
//! | `4n`             | cut point between antecedent and consequent      |

use super::rule::{Condition, Rule, RuleMetrics};
use super::transactions::Transactions;
use std::collections::HashSet;

/// Inclusion genes at or above this value keep their feature.
const INCLUSION_THRESHOLD: f64 = 0.5;

/// The optimization problem: maximize rule fitness, archiving every rule seen.
#[derive(Debug)]
pub struct RuleProblem {
    transactions: Transactions,
    archive: Vec<Rule>,
    seen: HashSet<String>,
    evaluations: usize,
}

impl RuleProblem {
    pub fn new(transactions: Transactions) -> Self {
        Self {
            transactions,
            archive: Vec::new(),
            seen: HashSet::new(),
            evaluations: 0,
        }
    }

    /// Length of a candidate vector.
    pub fn dimension(&self) -> usize {
        4 * self.transactions.features().len() + 1
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    #[cfg(test)]
    pub(crate) fn archived(&self) -> &[Rule] {
        &self.archive
    }

    /// Turn a candidate into antecedent and consequent, if it encodes a rule.
    pub fn decode(&self, candidate: &[f64]) -> Option<(Vec<Condition>, Vec<Condition>)> {
        let features = self.transactions.features();
        let n = features.len();
        if n == 0 || candidate.len() < self.dimension() {
            return None;
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| candidate[b].total_cmp(&candidate[a]).then(a.cmp(&b)));

        let mut items = Vec::with_capacity(n);
        for feature in order {
            let base = n + 3 * feature;
            if candidate[base + 2] < INCLUSION_THRESHOLD {
                continue;
            }
            let source = &features[feature];
            let mut lower = source.bound(candidate[base]);
            let mut upper = source.bound(candidate[base + 1]);
            if lower > upper {
                std::mem::swap(&mut lower, &mut upper);
            }
            items.push(Condition {
                feature,
                name: source.name.clone(),
                kind: source.kind,
                lower,
                upper,
            });
        }

        if items.len() < 2 {
            return None;
        }

        let cut_gene = candidate[4 * n];
        let cut = (1 + (cut_gene * (items.len() - 1) as f64).floor() as usize).clamp(1, items.len() - 1);
        let consequent = items.split_off(cut);
        Some((items, consequent))
    }

    /// Fitness of a candidate; rules with support are archived once.
    pub fn evaluate(&mut self, candidate: &[f64]) -> f64 {
        self.evaluations += 1;
        let Some((antecedent, consequent)) = self.decode(candidate) else {
            return 0.0;
        };

        let metrics = RuleMetrics::compute(&antecedent, &consequent, &self.transactions);
        let rule = Rule::new(antecedent, consequent, metrics);
        let fitness = rule.fitness;

        if metrics.support > 0.0 {
            let key = rule.key();
            if self.seen.insert(key) {
                self.archive.push(rule);
            }
        }
        fitness
    }

    /// Archived rules in report order.
    pub fn into_rules(self) -> Vec<Rule> {
        let mut rules = self.archive;
        rules.sort_by(|a, b| a.report_order(b));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn problem() -> RuleProblem {
        let df = df!["A" => [1i64, 2, 3], "B" => [4i64, 5, 6]].unwrap();
        RuleProblem::new(Transactions::from_frame(&df).unwrap())
    }

    #[test]
    fn test_dimension() {
        assert_eq!(problem().dimension(), 9);
    }

    #[test]
    fn test_decode_full_ranges() {
        let p = problem();
        // keys: A first; A and B over their full range, both included
        let candidate = [0.9, 0.1, 0.0, 1.0, 0.7, 0.0, 1.0, 0.8, 0.0];
        let (ante, cons) = p.decode(&candidate).unwrap();
        assert_eq!(ante[0].render(), "A(1,3)");
        assert_eq!(cons[0].render(), "B(4,6)");
    }

    #[test]
    fn test_decode_swaps_inverted_bounds_and_orders_by_key() {
        let p = problem();
        let candidate = [0.1, 0.9, 1.0, 0.5, 0.7, 1.0, 0.5, 0.8, 0.3];
        let (ante, cons) = p.decode(&candidate).unwrap();
        assert_eq!(ante[0].render(), "B(5,6)");
        assert_eq!(cons[0].render(), "A(2,3)");
    }

    #[test]
    fn test_single_item_scores_zero() {
        let mut p = problem();
        let candidate = [0.9, 0.1, 0.0, 1.0, 0.7, 0.0, 1.0, 0.2, 0.0];
        assert_eq!(p.evaluate(&candidate), 0.0);
        assert!(p.archived().is_empty());
        assert_eq!(p.evaluations(), 1);
    }

    #[test]
    fn test_archive_deduplicates() {
        let mut p = problem();
        let candidate = [0.9, 0.1, 0.0, 1.0, 0.7, 0.0, 1.0, 0.8, 0.0];
        assert_eq!(p.evaluate(&candidate), 1.0);
        assert_eq!(p.evaluate(&candidate), 1.0);
        assert_eq!(p.archived().len(), 1);
    }
}

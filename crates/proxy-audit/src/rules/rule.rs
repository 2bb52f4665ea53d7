//! Interval conditions, rules and their quality metrics.

use super::transactions::{FeatureKind, Transactions};
use crate::types::RuleRecord;
use crate::utils::round_to;
use std::cmp::Ordering;

/// `lower <= feature <= upper` on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub feature: usize,
    pub name: String,
    pub kind: FeatureKind,
    pub lower: f64,
    pub upper: f64,
}

impl Condition {
    /// Whether `row` satisfies the interval. Missing values never do.
    #[inline]
    pub fn matches(&self, transactions: &Transactions, row: usize) -> bool {
        transactions
            .feature(self.feature)
            .value(row)
            .is_some_and(|v| v >= self.lower && v <= self.upper)
    }

    /// `name(lower,upper)` with bounds rounded to 3 decimals.
    pub fn render(&self) -> String {
        format!(
            "{}({},{})",
            self.name,
            format_bound(self.lower, self.kind),
            format_bound(self.upper, self.kind)
        )
    }
}

fn format_bound(value: f64, kind: FeatureKind) -> String {
    let value = round_to(value, 3);
    match kind {
        FeatureKind::Integer => format!("{}", value as i64),
        FeatureKind::Float if value.fract() == 0.0 => format!("{value:.1}"),
        FeatureKind::Float => format!("{value}"),
    }
}

/// Support, confidence and lift of one antecedent/consequent pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuleMetrics {
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl RuleMetrics {
    /// Count matching transactions.
    ///
    /// support = P(A and C), confidence = P(A and C) / P(A),
    /// lift = confidence / P(C). Undefined ratios are reported as 0.
    pub fn compute(
        antecedent: &[Condition],
        consequent: &[Condition],
        transactions: &Transactions,
    ) -> Self {
        let n = transactions.len();
        if n == 0 {
            return Self::default();
        }

        let mut ante_count = 0usize;
        let mut cons_count = 0usize;
        let mut both_count = 0usize;
        for row in 0..n {
            let a = antecedent.iter().all(|c| c.matches(transactions, row));
            let c = consequent.iter().all(|c| c.matches(transactions, row));
            ante_count += usize::from(a);
            cons_count += usize::from(c);
            both_count += usize::from(a && c);
        }

        let total = n as f64;
        let support = both_count as f64 / total;
        let confidence = if ante_count == 0 {
            0.0
        } else {
            both_count as f64 / ante_count as f64
        };
        let consequent_support = cons_count as f64 / total;
        let lift = if consequent_support == 0.0 {
            0.0
        } else {
            confidence / consequent_support
        };

        Self {
            support,
            confidence,
            lift,
        }
    }

    /// Optimized objective: mean of support and confidence.
    pub fn fitness(&self) -> f64 {
        (self.support + self.confidence) / 2.0
    }
}

/// A discovered association rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub antecedent: Vec<Condition>,
    pub consequent: Vec<Condition>,
    pub metrics: RuleMetrics,
    pub fitness: f64,
}

impl Rule {
    pub fn new(antecedent: Vec<Condition>, consequent: Vec<Condition>, metrics: RuleMetrics) -> Self {
        let fitness = metrics.fitness();
        Self {
            antecedent,
            consequent,
            metrics,
            fitness,
        }
    }

    /// Stable text form, used for de-duplication and as the last tie-break.
    pub fn key(&self) -> String {
        let side = |conditions: &[Condition]| {
            conditions
                .iter()
                .map(Condition::render)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} => {}", side(&self.antecedent), side(&self.consequent))
    }

    /// Report ordering: fitness, support, confidence (all descending), then text.
    pub fn report_order(&self, other: &Self) -> Ordering {
        other
            .fitness
            .total_cmp(&self.fitness)
            .then_with(|| other.metrics.support.total_cmp(&self.metrics.support))
            .then_with(|| other.metrics.confidence.total_cmp(&self.metrics.confidence))
            .then_with(|| self.key().cmp(&other.key()))
    }

    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            antecedent: self.antecedent.iter().map(Condition::render).collect(),
            consequent: self.consequent.iter().map(Condition::render).collect(),
            fitness: round_to(self.fitness, 5),
            support: round_to(self.metrics.support, 6),
            confidence: round_to(self.metrics.confidence, 6),
            lift: round_to(self.metrics.lift, 6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn transactions() -> Transactions {
        let df = df!["A" => [1i64, 2, 3], "B" => [4.0, 5.0, 6.0]].unwrap();
        Transactions::from_frame(&df).unwrap()
    }

    fn cond(t: &Transactions, feature: usize, lower: f64, upper: f64) -> Condition {
        let f = t.feature(feature);
        Condition {
            feature,
            name: f.name.clone(),
            kind: f.kind,
            lower,
            upper,
        }
    }

    #[test]
    fn test_render_integer_and_float_bounds() {
        let t = transactions();
        assert_eq!(cond(&t, 0, 1.0, 3.0).render(), "A(1,3)");
        assert_eq!(cond(&t, 1, 4.0, 5.25).render(), "B(4.0,5.25)");
        assert_eq!(cond(&t, 1, 4.12345, 6.0).render(), "B(4.123,6.0)");
    }

    #[test]
    fn test_metrics() {
        let t = transactions();
        // A in [2,2] => B in [5,5]: one of three rows, fully confident
        let metrics = RuleMetrics::compute(&[cond(&t, 0, 2.0, 2.0)], &[cond(&t, 1, 5.0, 5.0)], &t);
        assert!((metrics.support - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.confidence, 1.0);
        assert!((metrics.lift - 3.0).abs() < 1e-12);

        // A in [2,3] => B in [4,5]
        let metrics = RuleMetrics::compute(&[cond(&t, 0, 2.0, 3.0)], &[cond(&t, 1, 4.0, 5.0)], &t);
        assert_eq!(metrics.confidence, 0.5);
        assert!((metrics.lift - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_record_rounding() {
        let t = transactions();
        let rule = Rule::new(
            vec![cond(&t, 0, 2.0, 3.0)],
            vec![cond(&t, 1, 4.0, 6.0)],
            RuleMetrics::compute(&[cond(&t, 0, 2.0, 3.0)], &[cond(&t, 1, 4.0, 6.0)], &t),
        );
        let record = rule.to_record();
        assert_eq!(record.antecedent, vec!["A(2,3)".to_string()]);
        assert_eq!(record.consequent, vec!["B(4.0,6.0)".to_string()]);
        assert_eq!(record.fitness, 0.83333);
        assert_eq!(record.support, 0.666667);
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.lift, 1.0);
    }

    #[test]
    fn test_report_order_breaks_ties_by_text() {
        let t = transactions();
        let metrics = RuleMetrics {
            support: 1.0,
            confidence: 1.0,
            lift: 1.0,
        };
        let ab = Rule::new(vec![cond(&t, 0, 1.0, 3.0)], vec![cond(&t, 1, 4.0, 6.0)], metrics);
        let ba = Rule::new(vec![cond(&t, 1, 4.0, 6.0)], vec![cond(&t, 0, 1.0, 3.0)], metrics);
        assert_eq!(ab.report_order(&ba), Ordering::Less);
        assert_eq!(ba.report_order(&ab), Ordering::Greater);
    }
}

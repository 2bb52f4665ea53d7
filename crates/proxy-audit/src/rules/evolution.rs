//! Differential evolution search over rule candidates.

use super::problem::RuleProblem;
use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::error::{AuditError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Summary of one optimizer run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSummary {
    pub best_fitness: f64,
    pub generations: usize,
    pub evaluations: usize,
}

/// A population-based optimizer that maximizes [`RuleProblem`] fitness.
pub trait RuleSearchEngine: Send + Sync {
    /// Human-readable algorithm name for logs.
    fn name(&self) -> &'static str;

    /// Run the search. `seed = None` draws from OS entropy.
    ///
    /// The problem archives rules as a side effect of evaluation.
    fn search(
        &self,
        problem: &mut RuleProblem,
        seed: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<SearchSummary>;
}

/// DE/rand/1/bin on the unit hypercube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialEvolution {
    pub population_size: usize,
    pub differential_weight: f64,
    pub crossover_probability: f64,
    pub max_iterations: usize,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl DifferentialEvolution {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            population_size: config.population_size,
            differential_weight: config.differential_weight,
            crossover_probability: config.crossover_probability,
            max_iterations: config.max_iterations,
        }
    }

    /// Three distinct population indices, none equal to `target`.
    fn donors(rng: &mut StdRng, size: usize, target: usize) -> [usize; 3] {
        let picked = rand::seq::index::sample(rng, size - 1, 3);
        let mut out = [0; 3];
        for (slot, idx) in out.iter_mut().zip(picked.iter()) {
            *slot = if idx >= target { idx + 1 } else { idx };
        }
        out
    }
}

impl RuleSearchEngine for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "DifferentialEvolution"
    }

    fn search(
        &self,
        problem: &mut RuleProblem,
        seed: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<SearchSummary> {
        if self.population_size < 4 {
            return Err(AuditError::computation(format!(
                "Differential evolution needs a population of at least 4, got {}",
                self.population_size
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dim = problem.dimension();
        let size = self.population_size;

        let mut population: Vec<Vec<f64>> = (0..size)
            .map(|_| (0..dim).map(|_| rng.r#gen::<f64>()).collect())
            .collect();
        let mut fitness: Vec<f64> = population.iter().map(|c| problem.evaluate(c)).collect();

        let mut generations = 0;
        for generation in 0..self.max_iterations {
            cancel.check()?;

            for target in 0..size {
                let [r1, r2, r3] = Self::donors(&mut rng, size, target);
                let forced = rng.gen_range(0..dim);

                let trial: Vec<f64> = (0..dim)
                    .map(|j| {
                        if j == forced || rng.r#gen::<f64>() < self.crossover_probability {
                            let v = population[r1][j]
                                + self.differential_weight * (population[r2][j] - population[r3][j]);
                            v.clamp(0.0, 1.0)
                        } else {
                            population[target][j]
                        }
                    })
                    .collect();

                let trial_fitness = problem.evaluate(&trial);
                if trial_fitness >= fitness[target] {
                    population[target] = trial;
                    fitness[target] = trial_fitness;
                }
            }

            generations += 1;
            trace!(
                "generation {} best fitness {:.5}",
                generation,
                fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            );
        }

        let best_fitness = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        debug!(
            "{} finished: {} generations, {} evaluations, best fitness {:.5}",
            self.name(),
            generations,
            problem.evaluations(),
            best_fitness
        );

        Ok(SearchSummary {
            best_fitness,
            generations,
            evaluations: problem.evaluations(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::transactions::Transactions;
    use polars::prelude::*;

    fn problem() -> RuleProblem {
        let df = df!["A" => [1i64, 2, 3], "B" => [4i64, 5, 6]].unwrap();
        RuleProblem::new(Transactions::from_frame(&df).unwrap())
    }

    #[test]
    fn test_donors_are_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        for target in 0..5 {
            for _ in 0..50 {
                let [a, b, c] = DifferentialEvolution::donors(&mut rng, 5, target);
                assert!(a != b && b != c && a != c);
                assert!(a != target && b != target && c != target);
                assert!(a < 5 && b < 5 && c < 5);
            }
        }
    }

    #[test]
    fn test_search_evaluation_count() {
        let mut p = problem();
        let de = DifferentialEvolution {
            max_iterations: 3,
            population_size: 10,
            ..DifferentialEvolution::default()
        };
        let summary = de.search(&mut p, Some(7), &CancellationToken::new()).unwrap();
        assert_eq!(summary.generations, 3);
        assert_eq!(summary.evaluations, 10 + 3 * 10);
    }

    #[test]
    fn test_search_finds_perfect_rule() {
        let mut p = problem();
        let summary = DifferentialEvolution::default()
            .search(&mut p, Some(42), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.best_fitness, 1.0);
    }

    #[test]
    fn test_search_cancelled() {
        let mut p = problem();
        let token = CancellationToken::new();
        token.cancel();
        let err = DifferentialEvolution::default()
            .search(&mut p, Some(0), &token)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}

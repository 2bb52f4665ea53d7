//! Configuration for the three analyzers.
//!
//! Defaults reproduce the constants the audit has always used (50 trees,
//! 3 folds x 5 repeats, a 50-member differential evolution run for 30
//! generations). Use [`AnalysisConfig::builder()`] to override them.

use serde::{Deserialize, Serialize};

/// Tunables for the redundancy analyzer and the rule miner.
///
/// # Example
///
/// ```rust,ignore
/// use proxy_audit::config::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .estimator_count(100)
///     .max_iterations(50)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of trees in each bagged ensemble.
    /// Default: 50
    pub estimator_count: usize,

    /// Number of folds per cross-validation repeat.
    /// Default: 3
    pub kfold_splits: usize,

    /// Number of times cross-validation is repeated with a fresh shuffle.
    /// Default: 5
    pub kfold_repeats: usize,

    /// Minimum leaf size candidates, as fractions of the row count.
    /// Default: [0.05, 0.06, 0.07]
    pub leaf_fractions: Vec<f64>,

    /// Seed used by the redundancy analyzer when the caller passes a negative one.
    /// Default: 0
    pub default_seed: u64,

    /// Differential evolution population size.
    /// Default: 50
    pub population_size: usize,

    /// Differential weight (F) applied to donor differences.
    /// Default: 0.5
    pub differential_weight: f64,

    /// Binomial crossover probability (CR).
    /// Default: 0.9
    pub crossover_probability: f64,

    /// Number of optimizer generations.
    /// Default: 30
    pub max_iterations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            estimator_count: 50,
            kfold_splits: 3,
            kfold_repeats: 5,
            leaf_fractions: vec![0.05, 0.06, 0.07],
            default_seed: 0,
            population_size: 50,
            differential_weight: 0.5,
            crossover_probability: 0.9,
            max_iterations: 30,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.estimator_count == 0 {
            return Err(ConfigValidationError::AtLeast {
                field: "estimator_count".to_string(),
                minimum: 1,
                value: self.estimator_count,
            });
        }

        if self.kfold_splits < 2 {
            return Err(ConfigValidationError::AtLeast {
                field: "kfold_splits".to_string(),
                minimum: 2,
                value: self.kfold_splits,
            });
        }

        if self.kfold_repeats == 0 {
            return Err(ConfigValidationError::AtLeast {
                field: "kfold_repeats".to_string(),
                minimum: 1,
                value: self.kfold_repeats,
            });
        }

        if self.leaf_fractions.is_empty() {
            return Err(ConfigValidationError::EmptyLeafFractions);
        }

        if let Some(&bad) = self
            .leaf_fractions
            .iter()
            .find(|f| !(**f > 0.0 && **f < 1.0))
        {
            return Err(ConfigValidationError::OutOfRange {
                field: "leaf_fractions".to_string(),
                value: bad,
                range: "(0.0, 1.0)",
            });
        }

        // DE/rand/1 draws three donors distinct from the target vector
        if self.population_size < 4 {
            return Err(ConfigValidationError::AtLeast {
                field: "population_size".to_string(),
                minimum: 4,
                value: self.population_size,
            });
        }

        if !(self.differential_weight > 0.0 && self.differential_weight <= 2.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "differential_weight".to_string(),
                value: self.differential_weight,
                range: "(0.0, 2.0]",
            });
        }

        if !(0.0..=1.0).contains(&self.crossover_probability) {
            return Err(ConfigValidationError::OutOfRange {
                field: "crossover_probability".to_string(),
                value: self.crossover_probability,
                range: "[0.0, 1.0]",
            });
        }

        if self.max_iterations == 0 {
            return Err(ConfigValidationError::AtLeast {
                field: "max_iterations".to_string(),
                minimum: 1,
                value: self.max_iterations,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be at least {minimum})")]
    AtLeast {
        field: String,
        minimum: usize,
        value: usize,
    },

    #[error("Invalid value for '{field}': {value} (must be in {range})")]
    OutOfRange {
        field: String,
        value: f64,
        range: &'static str,
    },

    #[error("At least one leaf fraction is required")]
    EmptyLeafFractions,
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    estimator_count: Option<usize>,
    kfold_splits: Option<usize>,
    kfold_repeats: Option<usize>,
    leaf_fractions: Option<Vec<f64>>,
    default_seed: Option<u64>,
    population_size: Option<usize>,
    differential_weight: Option<f64>,
    crossover_probability: Option<f64>,
    max_iterations: Option<usize>,
}

impl AnalysisConfigBuilder {
    /// Set the number of trees per ensemble.
    pub fn estimator_count(mut self, count: usize) -> Self {
        self.estimator_count = Some(count);
        self
    }

    /// Set the number of cross-validation folds.
    pub fn kfold_splits(mut self, splits: usize) -> Self {
        self.kfold_splits = Some(splits);
        self
    }

    /// Set how many times cross-validation is repeated.
    pub fn kfold_repeats(mut self, repeats: usize) -> Self {
        self.kfold_repeats = Some(repeats);
        self
    }

    /// Set the minimum leaf size candidates as fractions of the row count.
    pub fn leaf_fractions(mut self, fractions: Vec<f64>) -> Self {
        self.leaf_fractions = Some(fractions);
        self
    }

    /// Set the seed substituted for negative redundancy seeds.
    pub fn default_seed(mut self, seed: u64) -> Self {
        self.default_seed = Some(seed);
        self
    }

    /// Set the optimizer population size.
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Set the differential weight (F).
    pub fn differential_weight(mut self, weight: f64) -> Self {
        self.differential_weight = Some(weight);
        self
    }

    /// Set the crossover probability (CR).
    pub fn crossover_probability(mut self, probability: f64) -> Self {
        self.crossover_probability = Some(probability);
        self
    }

    /// Set the number of optimizer generations.
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            estimator_count: self.estimator_count.unwrap_or(defaults.estimator_count),
            kfold_splits: self.kfold_splits.unwrap_or(defaults.kfold_splits),
            kfold_repeats: self.kfold_repeats.unwrap_or(defaults.kfold_repeats),
            leaf_fractions: self.leaf_fractions.unwrap_or(defaults.leaf_fractions),
            default_seed: self.default_seed.unwrap_or(defaults.default_seed),
            population_size: self.population_size.unwrap_or(defaults.population_size),
            differential_weight: self
                .differential_weight
                .unwrap_or(defaults.differential_weight),
            crossover_probability: self
                .crossover_probability
                .unwrap_or(defaults.crossover_probability),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.estimator_count, 50);
        assert_eq!(config.kfold_splits, 3);
        assert_eq!(config.kfold_repeats, 5);
        assert_eq!(config.leaf_fractions, vec![0.05, 0.06, 0.07]);
        assert_eq!(config.population_size, 50);
        assert_eq!(config.differential_weight, 0.5);
        assert_eq!(config.crossover_probability, 0.9);
        assert_eq!(config.max_iterations, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .estimator_count(10)
            .kfold_splits(4)
            .kfold_repeats(2)
            .max_iterations(5)
            .population_size(20)
            .build()
            .unwrap();

        assert_eq!(config.estimator_count, 10);
        assert_eq!(config.kfold_splits, 4);
        assert_eq!(config.kfold_repeats, 2);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.population_size, 20);
        assert_eq!(config.differential_weight, 0.5);
    }

    #[test]
    fn test_validation_rejects_single_fold() {
        let result = AnalysisConfig::builder().kfold_splits(1).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::AtLeast { minimum: 2, .. }
        ));
    }

    #[test]
    fn test_validation_rejects_small_population() {
        let result = AnalysisConfig::builder().population_size(3).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::AtLeast { minimum: 4, .. }
        ));
    }

    #[test]
    fn test_validation_rejects_bad_fraction() {
        let result = AnalysisConfig::builder()
            .leaf_fractions(vec![0.05, 1.5])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::OutOfRange { .. }
        ));

        let result = AnalysisConfig::builder().leaf_fractions(vec![]).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyLeafFractions
        ));
    }

    #[test]
    fn test_validation_rejects_crossover_probability() {
        let result = AnalysisConfig::builder()
            .crossover_probability(1.2)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "estimator_count": 25,
            "kfold_splits": 5,
            "kfold_repeats": 2,
            "leaf_fractions": [0.1],
            "default_seed": 7,
            "population_size": 30,
            "differential_weight": 0.8,
            "crossover_probability": 0.7,
            "max_iterations": 10
        }"#;

        let config: AnalysisConfig = serde_json::from_str(json).expect("valid config JSON");
        assert_eq!(config.estimator_count, 25);
        assert_eq!(config.leaf_fractions, vec![0.1]);
        assert_eq!(config.default_seed, 7);
        assert!(config.validate().is_ok());
    }
}

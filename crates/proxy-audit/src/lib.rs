//! Proxy-Variable Auditing Library
//!
//! Finds columns of a tabular dataset that stand in for sensitive attributes,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! Given a numeric dataset and a set of sensitive columns, the library offers
//! three complementary analyses:
//!
//! - **Correlational Analysis**: Pearson, Spearman and Kendall coefficients
//!   between every sensitive column and every column of the dataset
//! - **FACET Redundancy**: a random forest is tuned by repeated k-fold grid
//!   search, and pairs of features whose per-row contributions to the model
//!   move together are reported as redundant (in percent)
//! - **Association Rule Mining**: differential evolution searches for interval
//!   rules such as `A(1,3) => B(4,6)`, ranked by support and confidence
//!
//! A [`Session`] holds the uploaded dataset, an optional sampled or filtered
//! working view, and the analyst's selections, and runs one analysis at a time.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use proxy_audit::{AnalysisOutcome, Session};
//!
//! let mut session = Session::new();
//! session.load_csv_path("data.csv")?;
//!
//! // Optional: work on a reproducible 50% sample
//! session.sample(50.0, 42)?;
//!
//! session.select_algorithm("FACET")?;
//! session.set_sensitive_columns(&["age", "sex"])?;
//! session.set_target_column("income")?;
//!
//! match session.run_analysis()? {
//!     AnalysisOutcome::Redundancy(table) => {
//!         for (sensitive, row) in &table {
//!             println!("{sensitive}: {row:?}");
//!         }
//!     }
//!     other => println!("{}", other.status_message()),
//! }
//! ```
//!
//! # Configuration
//!
//! Use [`AnalysisConfig`] to tune the analyzers:
//!
//! ```rust,ignore
//! use proxy_audit::{AnalysisConfig, Session};
//!
//! let config = AnalysisConfig::builder()
//!     .estimator_count(100)        // Trees per forest
//!     .kfold_splits(5)             // Folds per repeat
//!     .max_iterations(50)          // Differential evolution generations
//!     .build()?;
//!
//! let session = Session::with_config(config)?;
//! ```
//!
//! # Cancellation
//!
//! FACET and rule mining can take a while. A [`SharedSession`] runs them on a
//! background thread and can stop them without waiting for the session lock:
//!
//! ```rust,ignore
//! use proxy_audit::{AuditError, SharedSession};
//!
//! let shared = SharedSession::default();
//! // ... load and configure through shared.with(|s| ...)
//! let handle = shared.spawn_analysis();
//!
//! // Later, e.g. from a UI thread
//! shared.cancel();
//!
//! match handle.join().expect("analysis thread panicked") {
//!     Ok(outcome) => println!("{}", outcome.status_message()),
//!     Err(AuditError::Cancelled) => println!("Cancelled by user"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! # Extension points
//!
//! Each analyzer runs behind a trait so alternative engines can be plugged in
//! through the `analyze_with` entry points:
//!
//! - [`correlation::CorrelationEngine`] computes correlation matrices
//! - [`redundancy::RegressionFitter`] fits the model FACET inspects
//! - [`rules::RuleSearchEngine`] drives the rule search

pub mod cancellation;
pub mod config;
pub mod correlation;
pub mod dataset;
pub mod error;
pub mod redundancy;
pub mod report;
pub mod rules;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cancellation::CancellationToken;
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError};
pub use correlation::{CorrelationEngine, CorrelationMethod, NativeCorrelation};
pub use dataset::Dataset;
pub use error::{AuditError, Result, ResultExt};
pub use redundancy::{RandomForestFitter, RedundancyRequest, RegressionFitter};
pub use report::{AnalysisReport, HeatmapMatrix};
pub use rules::{DifferentialEvolution, RuleSearchEngine};
pub use session::{DEFAULT_SEED, Session, SessionState, SharedSession, ViewOrigin};
pub use types::{
    Algorithm, AnalysisOutcome, CorrelationResult, MethodResult, RedundancyResult, RuleRecord,
    ScoreTable, ScoreValue,
};

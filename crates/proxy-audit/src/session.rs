//! Session state machine.
//!
//! A [`Session`] owns the uploaded dataset, the current working view and the
//! analyst's selections, and dispatches [`Session::run_analysis`] to the
//! analyzer picked with [`Session::select_algorithm`].
//!
//! ```text
//! Empty ──load──▶ DatasetLoaded ──sample/filter──▶ Sampled | Filtered
//!                       │                                 │
//!                       └──── algorithm + sensitive (+ target) ────▶ Configured ──run──▶ Analyzed
//! ```
//!
//! Every transition validates its input before touching state, so a failed
//! call leaves the session exactly as it was. [`SharedSession`] serializes
//! access for callers that share one session across threads.

use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::dataset::{self, Dataset};
use crate::error::{AuditError, Result};
use crate::redundancy::RedundancyRequest;
use crate::types::{Algorithm, AnalysisOutcome};
use crate::{correlation, redundancy, rules};
use parking_lot::{Mutex, MutexGuard};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Seed used until the analyst picks one, and the fallback for `-1` when sampling.
pub const DEFAULT_SEED: i64 = 0;

/// Coarse lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    DatasetLoaded,
    Sampled,
    Filtered,
    Configured,
    Analyzed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::DatasetLoaded => "dataset loaded",
            Self::Sampled => "sampled",
            Self::Filtered => "filtered",
            Self::Configured => "configured",
            Self::Analyzed => "analyzed",
        };
        f.write_str(s)
    }
}

/// How the current working view was derived from the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewOrigin {
    Full,
    Sampled,
    Filtered,
}

/// One analyst's session.
#[derive(Debug, Default)]
pub struct Session {
    dataset: Option<Dataset>,
    view: Option<DataFrame>,
    view_origin: Option<ViewOrigin>,
    algorithm: Option<Algorithm>,
    sensitive: Vec<String>,
    target: Option<String>,
    seed: i64,
    config: AnalysisConfig,
    cancel: CancellationToken,
    last_outcome: Option<AnalysisOutcome>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session with non-default analyzer settings.
    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        let mut session = Self::new();
        session.set_config(config)?;
        Ok(session)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replace the analyzer settings after validating them.
    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| AuditError::invalid_input(e.to_string()))?;
        self.config = config;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        if self.dataset.is_none() {
            return SessionState::Empty;
        }
        if self.last_outcome.is_some() {
            return SessionState::Analyzed;
        }
        if self.is_configured() {
            return SessionState::Configured;
        }
        match self.view_origin {
            Some(ViewOrigin::Sampled) => SessionState::Sampled,
            Some(ViewOrigin::Filtered) => SessionState::Filtered,
            _ => SessionState::DatasetLoaded,
        }
    }

    fn is_configured(&self) -> bool {
        match self.algorithm {
            Some(algorithm) => {
                !self.sensitive.is_empty() && (!algorithm.requires_target() || self.target.is_some())
            }
            None => false,
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Column names of the active dataset.
    pub fn columns(&self) -> Result<Vec<String>> {
        Ok(self.require_dataset()?.columns())
    }

    pub fn working_view(&self) -> Option<&DataFrame> {
        self.view.as_ref()
    }

    pub fn view_origin(&self) -> Option<ViewOrigin> {
        self.view_origin
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn sensitive_columns(&self) -> &[String] {
        &self.sensitive
    }

    pub fn target_column(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn last_outcome(&self) -> Option<&AnalysisOutcome> {
        self.last_outcome.as_ref()
    }

    /// A handle that stops the analysis currently running on this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn require_dataset(&self) -> Result<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| AuditError::invalid_input("No dataset available"))
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Replace the dataset. The working view becomes the full new dataset and
    /// selections naming columns that no longer exist are cleared.
    pub fn load_dataset(&mut self, dataset: Dataset) {
        let columns = dataset.columns();

        if self.sensitive.iter().any(|c| !columns.contains(c)) {
            debug!("Cleared sensitive selection after dataset change");
            self.sensitive.clear();
        }
        if self
            .target
            .as_ref()
            .is_some_and(|t| !columns.contains(t))
        {
            debug!("Cleared target selection after dataset change");
            self.target = None;
        }

        info!(
            "Loaded dataset with {} rows and {} columns",
            dataset.height(),
            columns.len()
        );
        self.view = Some(dataset.frame().clone());
        self.view_origin = Some(ViewOrigin::Full);
        self.dataset = Some(dataset);
        self.last_outcome = None;
    }

    /// Parse CSV bytes and load the result.
    pub fn load_csv_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let dataset = Dataset::from_csv_bytes(bytes)?;
        self.load_dataset(dataset);
        Ok(())
    }

    /// Read a CSV file and load the result.
    pub fn load_csv_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let dataset = Dataset::from_csv_path(path)?;
        self.load_dataset(dataset);
        Ok(())
    }

    /// Replace the working view with a random row sample of the full dataset.
    ///
    /// `seed == -1` samples with [`DEFAULT_SEED`] and stores it; other
    /// negative seeds are rejected.
    pub fn sample(&mut self, percentage: f64, seed: i64) -> Result<&DataFrame> {
        let dataset = self.require_dataset()?;
        let seed = match seed {
            -1 => DEFAULT_SEED,
            s if s < 0 => return Err(AuditError::invalid_input(format!("Invalid seed {s}"))),
            s => s,
        };

        let view = dataset::sample_rows(dataset.frame(), percentage, seed as u64)?;
        debug!("Sampled {}% -> {} rows", percentage, view.height());

        self.seed = seed;
        self.view_origin = Some(ViewOrigin::Sampled);
        self.last_outcome = None;
        Ok(self.view.insert(view))
    }

    /// Replace the working view with the rows of the full dataset matching `predicate`.
    pub fn filter(&mut self, predicate: &str) -> Result<&DataFrame> {
        let dataset = self.require_dataset()?;
        let view = dataset::filter_rows(dataset.frame(), predicate)?;

        self.view_origin = Some(ViewOrigin::Filtered);
        self.last_outcome = None;
        Ok(self.view.insert(view))
    }

    /// Set the seed used by the next analysis without resampling.
    ///
    /// `-1` asks the rule miner for an unseeded run.
    pub fn set_seed(&mut self, seed: i64) {
        self.seed = seed;
        self.last_outcome = None;
    }

    /// Pick the analysis by display name or alias.
    pub fn select_algorithm(&mut self, name: &str) -> Result<Algorithm> {
        self.require_dataset()?;
        if name.trim().is_empty() {
            return Err(AuditError::invalid_input("No algorithm selected"));
        }
        let algorithm: Algorithm = name
            .parse()
            .map_err(|_| AuditError::invalid_input("Invalid algorithm selected"))?;
        self.set_algorithm(algorithm)?;
        Ok(algorithm)
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) -> Result<()> {
        self.require_dataset()?;
        self.algorithm = Some(algorithm);
        self.last_outcome = None;
        Ok(())
    }

    /// Choose the sensitive columns. All must exist in the current dataset.
    pub fn set_sensitive_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let dataset = self.require_dataset()?;
        let names: Vec<String> = names
            .iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(AuditError::invalid_input("No sensitive variables selected"));
        }
        if let Some(var) = names.iter().find(|n| !dataset.has_column(n)) {
            return Err(AuditError::invalid_input(format!(
                "Sensitive variable {var} not found in columns"
            )));
        }

        self.sensitive = names;
        self.last_outcome = None;
        Ok(())
    }

    /// Choose the target column used by the redundancy analysis.
    pub fn set_target_column(&mut self, name: &str) -> Result<()> {
        let dataset = self.require_dataset()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuditError::invalid_input("No target variable selected"));
        }
        if !dataset.has_column(name) {
            return Err(AuditError::invalid_input(format!(
                "Target variable {name} not found in columns"
            )));
        }

        self.target = Some(name.to_string());
        self.last_outcome = None;
        Ok(())
    }

    /// Back to [`SessionState::Empty`], keeping the configuration.
    pub fn reset(&mut self) {
        let config = std::mem::take(&mut self.config);
        let cancel = self.cancel.clone();
        *self = Self {
            config,
            cancel,
            ..Self::default()
        };
        self.cancel.reset();
    }

    /// Run the selected analysis on the working view.
    ///
    /// Errors are returned to the caller and leave the session unchanged, so
    /// the analysis can be retried or reconfigured. A cancellation requested
    /// before the run starts stops it at its first checkpoint; the request is
    /// cleared once the run returns.
    pub fn run_analysis(&mut self) -> Result<AnalysisOutcome> {
        let result = self.dispatch();
        self.cancel.reset();
        match &result {
            Ok(outcome) => {
                info!("{}", outcome.status_message());
                self.last_outcome = Some(outcome.clone());
            }
            Err(e) => warn!("Analysis failed: {}", e),
        }
        result
    }

    fn dispatch(&self) -> Result<AnalysisOutcome> {
        let view = self
            .view
            .as_ref()
            .filter(|v| v.height() > 0 && v.width() > 0)
            .ok_or_else(|| AuditError::invalid_input("No dataset available"))?;
        let algorithm = self
            .algorithm
            .ok_or_else(|| AuditError::invalid_input("No algorithm selected"))?;

        info!("Running {} on {} rows", algorithm, view.height());

        match algorithm {
            Algorithm::Correlation => {
                if self.sensitive.is_empty() {
                    return Err(AuditError::invalid_input("Sensitive variables not set"));
                }
                correlation::analyze(&self.sensitive, view).map(AnalysisOutcome::Correlation)
            }
            Algorithm::Redundancy => {
                let target = self
                    .target
                    .as_deref()
                    .ok_or_else(|| AuditError::invalid_input("Target variable not set"))?;
                if self.sensitive.is_empty() {
                    return Err(AuditError::invalid_input("Sensitive variables not set"));
                }
                let request = RedundancyRequest {
                    sensitive: &self.sensitive,
                    target: Some(target),
                    seed: self.seed,
                };
                redundancy::analyze(request, view, &self.config, &self.cancel)
                    .map(AnalysisOutcome::Redundancy)
            }
            Algorithm::RuleMining => {
                rules::analyze(&self.sensitive, view, self.seed, &self.config, &self.cancel)
                    .map(AnalysisOutcome::RuleMining)
            }
        }
    }
}

/// A session shared between threads.
///
/// Each call holds the lock for the whole transition. [`SharedSession::cancel`]
/// does not take the lock, so it can interrupt a running analysis.
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
    cancel: CancellationToken,
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new(Session::new())
    }
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        let cancel = session.cancellation_token();
        Self {
            inner: Arc::new(Mutex::new(session)),
            cancel,
        }
    }

    /// Exclusive access to the session.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Ask the running analysis, if any, to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the analysis on a background thread.
    ///
    /// Stale cancellations are cleared here, before the thread waits for the
    /// lock, so a [`SharedSession::cancel`] issued while the run is queued
    /// still stops it.
    pub fn spawn_analysis(&self) -> JoinHandle<Result<AnalysisOutcome>> {
        self.cancel.reset();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || inner.lock().run_analysis())
    }
}

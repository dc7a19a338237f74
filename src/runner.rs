//! End-to-end comparison run
//!
//! Wires the pipeline together: clean and validate the frame, stratified
//! train/test split, leakage-safe feature fitting, one grid search per
//! family, held-out evaluation, and the cross-model report. Family failures
//! are isolated; completed families always reach the report.

use crate::data::{self, LABEL_COLUMN};
use crate::error::{AttritionError, Result};
use crate::eval::{EvaluationResult, Evaluator, Scoring};
use crate::features::{FeaturePipeline, FeatureSpec, FittedState};
use crate::models::{FittedModel, ModelFamily};
use crate::report::ReportAggregator;
use crate::search::{CancelToken, Candidate, HyperparameterGrid, SearchEngine};
use crate::split::Splitter;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Everything a comparison run needs beyond the data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub test_fraction: f64,
    pub folds: usize,
    pub seed: u64,
    pub scoring: Scoring,
    pub features: FeatureSpec,
    pub families: Vec<(ModelFamily, HyperparameterGrid)>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            folds: 5,
            seed: 42,
            scoring: Scoring::Recall,
            features: FeatureSpec::hr_default(),
            families: ModelFamily::ALL
                .iter()
                .map(|&family| (family, family.default_grid()))
                .collect(),
        }
    }
}

impl RunConfig {
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Replace the competing families and their grids
    pub fn with_families(mut self, families: Vec<(ModelFamily, HyperparameterGrid)>) -> Self {
        self.families = families;
        self
    }
}

/// One family that made it all the way through
#[derive(Debug, Clone)]
pub struct FamilyOutcome {
    pub family: ModelFamily,
    pub candidate: Candidate,
    pub cv_score: f64,
    pub evaluation: EvaluationResult,
    /// Per-feature importances paired with encoded column names, where the
    /// family exposes them
    pub importances: Option<Vec<(String, f64)>>,
    pub model: FittedModel,
}

/// One family that did not
#[derive(Debug, Clone)]
pub struct FamilyFailure {
    pub family: ModelFamily,
    pub reason: String,
}

/// Results of a full comparison run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub outcomes: Vec<FamilyOutcome>,
    pub failures: Vec<FamilyFailure>,
    pub report: ReportAggregator,
    pub fitted_features: FittedState,
    pub n_train: usize,
    pub n_test: usize,
}

/// Run the full comparison over an already-loaded frame
pub fn run(df: &DataFrame, config: &RunConfig, cancel: &CancelToken) -> Result<RunOutcome> {
    let df = data::clean(df)?;

    let mut required = config.features.required_columns();
    required.push(LABEL_COLUMN);
    data::validate_columns(&df, &required)?;

    let labels = data::labels(&df, LABEL_COLUMN)?;
    info!(rows = df.height(), positives = labels.sum() as usize, "dataset ready");

    let splitter = Splitter::new(config.seed);
    let split = splitter.split(&labels, config.test_fraction, config.folds)?;

    let pipeline = FeaturePipeline::new(config.features.clone());
    let (train, fitted_features) = pipeline.fit_transform(&df, &split.train)?;
    let test = pipeline.transform(&df, &split.test, &fitted_features)?;

    let y_train = Array1::from_vec(split.train.iter().map(|&i| labels[i]).collect());
    let y_test = Array1::from_vec(split.test.iter().map(|&i| labels[i]).collect());

    // Folds index into the training matrix, so they are built over positions
    // within the train partition rather than dataset rows.
    let positions: Vec<usize> = (0..split.train.len()).collect();
    let folds = splitter.make_folds(&positions, &y_train, config.folds)?;

    let engine = SearchEngine::new(config.scoring, config.seed);
    let evaluator = Evaluator::new();

    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    let mut report = ReportAggregator::new();

    for (family, grid) in &config.families {
        let selected = match engine.search(family, &train.values, &y_train, grid, &folds, cancel) {
            Ok(selected) => selected,
            Err(AttritionError::Cancelled) => return Err(AttritionError::Cancelled),
            Err(err) => {
                warn!(family = %family, reason = %err, "family failed, continuing");
                failures.push(FamilyFailure {
                    family: *family,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let evaluation = evaluator.evaluate(&selected.model, &test.values, &y_test)?;
        info!(
            family = %family,
            candidate = %selected.candidate,
            cv_score = selected.cv_score,
            test_recall = evaluation.metrics.recall,
            "family complete"
        );

        let importances = selected.model.feature_importances().map(|imp| {
            let mut pairs: Vec<(String, f64)> = fitted_features
                .columns()
                .iter()
                .cloned()
                .zip(imp.iter().copied())
                .collect();
            pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            pairs
        });

        report.add(family.name(), evaluation.metrics);
        outcomes.push(FamilyOutcome {
            family: *family,
            candidate: selected.candidate,
            cv_score: selected.cv_score,
            evaluation,
            importances,
            model: selected.model,
        });
    }

    Ok(RunOutcome {
        outcomes,
        failures,
        report,
        fitted_features,
        n_train: split.train.len(),
        n_test: split.test.len(),
    })
}

/// Persisted artifact: the fitted model together with the feature state
/// needed to feed it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub family: ModelFamily,
    pub model: FittedModel,
    pub features: FittedState,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

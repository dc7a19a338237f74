//! Employee attrition model comparison
//!
//! A model-selection pipeline for predicting which employees will leave:
//! leakage-safe feature preparation, stratified partitioning, exhaustive
//! hyperparameter search with k-fold cross-validation, and a cross-model
//! comparison report on held-out data.
//!
//! # Modules
//!
//! - [`data`] - CSV loading, cleaning, label extraction
//! - [`features`] - Derived features, one-hot encoding, train-only scaling
//! - [`split`] - Stratified train/test split and CV folds
//! - [`search`] - Grid enumeration and parallel cross-validated search
//! - [`models`] - The competing classifier families
//! - [`eval`] - Classification metrics and ROC curves
//! - [`report`] - The cross-model summary table
//! - [`runner`] - The end-to-end comparison run
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod eval;
pub mod features;
pub mod models;
pub mod report;
pub mod search;
pub mod split;

pub mod runner;

pub mod cli;

pub use error::{AttritionError, Result};

/// Common imports for working with the pipeline
pub mod prelude {
    pub use crate::error::{AttritionError, Result};

    pub use crate::features::{FeaturePipeline, FeatureSpec, FittedState};
    pub use crate::split::{FoldSet, Split, Splitter};

    pub use crate::models::{Classifier, FittedModel, ModelFamily, Trainable};
    pub use crate::search::{CancelToken, Candidate, HyperparameterGrid, SearchEngine};

    pub use crate::eval::{EvaluationResult, Evaluator, MetricSet, Scoring};
    pub use crate::report::{ReportAggregator, SummaryRow};

    pub use crate::runner::{RunConfig, RunOutcome};
}

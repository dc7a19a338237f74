//! Hyperparameter search

pub mod engine;
pub mod grid;

pub use engine::{CancelToken, SearchEngine, SearchPhase, SelectedModel};
pub use grid::{Candidate, HyperparameterGrid, ParamValue};

//! Error types for the attrition model-selection pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AttritionError>;

/// Main error type for the attrition pipeline
#[derive(Error, Debug)]
pub enum AttritionError {
    /// A required column is missing or a value violates the fixed schema.
    /// Fatal, surfaced immediately.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A class is too small to stratify over the requested folds.
    /// Fatal for the split request that triggered it.
    #[error("Degenerate class {class}: {count} members, {folds} folds requested")]
    DegenerateClass {
        class: i64,
        count: usize,
        folds: usize,
    },

    /// Every hyperparameter configuration failed to train.
    /// Fatal for the affected model family only.
    #[error("Search exhausted for {family}: all {n_candidates} configurations failed")]
    SearchExhausted {
        family: String,
        n_candidates: usize,
    },

    /// The search was aborted; no partial aggregate is usable.
    #[error("Search cancelled")]
    Cancelled,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    NotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for AttritionError {
    fn from(err: polars::error::PolarsError) -> Self {
        AttritionError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for AttritionError {
    fn from(err: serde_json::Error) -> Self {
        AttritionError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AttritionError {
    fn from(err: ndarray::ShapeError) -> Self {
        AttritionError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AttritionError::Schema("column 'left' not found".to_string());
        assert_eq!(err.to_string(), "Schema error: column 'left' not found");
    }

    #[test]
    fn test_degenerate_class_display() {
        let err = AttritionError::DegenerateClass {
            class: 1,
            count: 3,
            folds: 5,
        };
        assert_eq!(
            err.to_string(),
            "Degenerate class 1: 3 members, 5 folds requested"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AttritionError = io_err.into();
        assert!(matches!(err, AttritionError::Io(_)));
    }
}

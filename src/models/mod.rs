//! Model families
//!
//! Three classifier families compete for the attrition task. Each family maps
//! grid candidates onto its own hyperparameters; the fitted results share the
//! [`Classifier`] surface the evaluator consumes.

pub mod decision_tree;
pub mod gradient_boosting;
pub mod logistic;
pub mod random_forest;

pub use decision_tree::{DecisionTree, TreeTask};
pub use gradient_boosting::GradientBoosting;
pub use logistic::{LogisticRegression, Penalty};
pub use random_forest::RandomForest;

use crate::error::{AttritionError, Result};
use crate::search::grid::{Candidate, HyperparameterGrid, ParamValue};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fitted binary classifier
pub trait Classifier {
    /// Hard 0/1 labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
    /// Positive-class probabilities
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Something the search engine can train: one candidate plus a seed in,
/// one fitted classifier out
pub trait Trainable: Sync {
    type Fitted: Classifier;

    fn train(&self, candidate: &Candidate, x: &Array2<f64>, y: &Array1<f64>, seed: u64)
        -> Result<Self::Fitted>;
}

/// The classifier families under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::LogisticRegression,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
        }
    }

    /// Search space each family competes with by default
    pub fn default_grid(&self) -> HyperparameterGrid {
        match self {
            ModelFamily::LogisticRegression => HyperparameterGrid::new()
                .with_floats("C", &[0.001, 0.01, 0.1, 1.0, 10.0])
                .with_texts("penalty", &["l1", "l2"])
                .with_texts("class_weight", &["balanced", "none"])
                .with_ints("max_iter", &[1000]),
            ModelFamily::RandomForest => HyperparameterGrid::new()
                .with_ints("n_estimators", &[100, 200])
                .with_axis(
                    "max_depth",
                    vec![ParamValue::Int(10), ParamValue::Int(20), ParamValue::None],
                )
                .with_ints("min_samples_split", &[2, 5])
                .with_ints("min_samples_leaf", &[1, 2])
                .with_texts("class_weight", &["balanced", "none"]),
            ModelFamily::GradientBoosting => HyperparameterGrid::new()
                .with_ints("n_estimators", &[100, 200])
                .with_floats("learning_rate", &[0.01, 0.1, 0.2])
                .with_ints("max_depth", &[3, 5, 7])
                .with_ints("min_samples_split", &[2, 5]),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn class_weight_balanced(candidate: &Candidate) -> Result<bool> {
    match candidate.get("class_weight") {
        None => Ok(false),
        Some(ParamValue::None) => Ok(false),
        Some(ParamValue::Text(v)) if v == "balanced" => Ok(true),
        Some(ParamValue::Text(v)) if v == "none" => Ok(false),
        Some(other) => Err(AttritionError::InvalidParameter {
            name: "class_weight".into(),
            value: other.to_string(),
            reason: "expected 'balanced' or 'none'".into(),
        }),
    }
}

impl Trainable for ModelFamily {
    type Fitted = FittedModel;

    fn train(
        &self,
        candidate: &Candidate,
        x: &Array2<f64>,
        y: &Array1<f64>,
        seed: u64,
    ) -> Result<FittedModel> {
        match self {
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new()
                    .with_c(candidate.float("C")?)
                    .with_penalty(Penalty::parse(candidate.text("penalty")?)?)
                    .with_balanced(class_weight_balanced(candidate)?)
                    .with_max_iter(candidate.usize("max_iter")?);
                model.fit(x, y)?;
                Ok(FittedModel::Logistic(model))
            }
            ModelFamily::RandomForest => {
                let mut model = RandomForest::new(candidate.usize("n_estimators")?)
                    .with_max_depth(candidate.optional_usize("max_depth")?)
                    .with_min_samples_split(candidate.usize("min_samples_split")?)
                    .with_min_samples_leaf(candidate.usize("min_samples_leaf")?)
                    .with_balanced(class_weight_balanced(candidate)?)
                    .with_seed(seed);
                model.fit(x, y)?;
                Ok(FittedModel::Forest(model))
            }
            ModelFamily::GradientBoosting => {
                let max_depth = candidate.usize("max_depth")?;
                let mut model = GradientBoosting::new(candidate.usize("n_estimators")?)
                    .with_learning_rate(candidate.float("learning_rate")?)
                    .with_max_depth(max_depth)
                    .with_min_samples_split(candidate.usize("min_samples_split")?)
                    .with_seed(seed);
                model.fit(x, y)?;
                Ok(FittedModel::Boosting(model))
            }
        }
    }
}

/// A fitted model from any family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Logistic(LogisticRegression),
    Forest(RandomForest),
    Boosting(GradientBoosting),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Logistic(_) => ModelFamily::LogisticRegression,
            FittedModel::Forest(_) => ModelFamily::RandomForest,
            FittedModel::Boosting(_) => ModelFamily::GradientBoosting,
        }
    }

    /// Impurity-based importances for the tree ensembles; logistic
    /// regression has none and returns `None`.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            FittedModel::Logistic(_) => None,
            FittedModel::Forest(m) => m.feature_importances(),
            FittedModel::Boosting(m) => m.feature_importances(),
        }
    }
}

impl Classifier for FittedModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::Logistic(m) => m.predict(x),
            FittedModel::Forest(m) => m.predict(x),
            FittedModel::Boosting(m) => m.predict(x),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::Logistic(m) => m.predict_proba(x),
            FittedModel::Forest(m) => m.predict_proba(x),
            FittedModel::Boosting(m) => m.predict_proba(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn tiny_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.2],
            [2.0, 0.1],
            [3.0, 0.3],
            [4.0, 0.2],
            [10.0, 0.9],
            [11.0, 0.8],
            [12.0, 0.7],
            [13.0, 0.9]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_default_grid_sizes() {
        assert_eq!(
            ModelFamily::LogisticRegression.default_grid().n_candidates(),
            5 * 2 * 2 * 1
        );
        assert_eq!(
            ModelFamily::RandomForest.default_grid().n_candidates(),
            2 * 3 * 2 * 2 * 2
        );
        assert_eq!(
            ModelFamily::GradientBoosting.default_grid().n_candidates(),
            2 * 3 * 3 * 2
        );
    }

    #[test]
    fn test_every_family_trains_its_first_candidate() {
        let (x, y) = tiny_data();
        for family in ModelFamily::ALL {
            let grid = family.default_grid();
            let candidate = &grid.candidates()[0];
            let fitted = family.train(candidate, &x, &y, 42).unwrap();
            assert_eq!(fitted.family(), family);
            let proba = fitted.predict_proba(&x).unwrap();
            assert_eq!(proba.len(), y.len());
        }
    }

    #[test]
    fn test_importances_only_for_tree_families() {
        let (x, y) = tiny_data();
        for family in ModelFamily::ALL {
            let grid = family.default_grid();
            let fitted = family.train(&grid.candidates()[0], &x, &y, 42).unwrap();
            match family {
                ModelFamily::LogisticRegression => {
                    assert!(fitted.feature_importances().is_none());
                }
                _ => {
                    let imp = fitted.feature_importances().unwrap();
                    assert_eq!(imp.len(), 2);
                }
            }
        }
    }

    #[test]
    fn test_class_weight_axis_parsing() {
        let grid = HyperparameterGrid::new().with_texts("class_weight", &["balanced", "none"]);
        let candidates = grid.candidates();
        assert!(class_weight_balanced(&candidates[0]).unwrap());
        assert!(!class_weight_balanced(&candidates[1]).unwrap());
    }

    #[test]
    fn test_bad_candidate_is_a_training_error_not_a_panic() {
        let (x, y) = tiny_data();
        // Missing every axis the family needs.
        let grid = HyperparameterGrid::new().with_ints("unrelated", &[1]);
        let candidate = &grid.candidates()[0];
        assert!(ModelFamily::RandomForest.train(candidate, &x, &y, 1).is_err());
    }
}

//! Gradient boosting classifier
//!
//! Boosts regression trees on the log-loss gradient in logit space.

use crate::error::{AttritionError, Result};
use crate::models::decision_tree::{DecisionTree, TreeTask};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(100)
    }
}

impl GradientBoosting {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            seed: 42,
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit boosting rounds sequentially; each tree targets the residual
    /// `y - p` of the current ensemble
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AttritionError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(AttritionError::InvalidParameter {
                name: "n_estimators".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(AttritionError::InvalidParameter {
                name: "learning_rate".into(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".into(),
            });
        }

        self.n_features = n_features;
        self.feature_importances = vec![0.0; n_features];
        self.trees = Vec::with_capacity(self.n_estimators);

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        for round in 0..self.n_estimators {
            let probs = log_odds.mapv(|z| 1.0 / (1.0 + (-z).exp()));
            let residuals = y - &probs;

            let mut tree = DecisionTree::new(TreeTask::Regression)
                .with_max_depth(self.max_depth)
                .with_min_samples_split(self.min_samples_split)
                .with_seed(self.seed.wrapping_add(round as u64));
            tree.fit(x, &residuals)?;

            let tree_pred = tree.predict(x)?;
            log_odds = log_odds + self.learning_rate * &tree_pred;

            if let Some(imp) = tree.feature_importances() {
                for (acc, v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                    *acc += v;
                }
            }

            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(self)
    }

    /// Positive-class probabilities from accumulated log-odds
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AttritionError::NotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            let tree_pred = tree.predict(x)?;
            log_odds = log_odds + self.learning_rate * &tree_pred;
        }

        Ok(log_odds.mapv(|z| 1.0 / (1.0 + (-z).exp())))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Accumulated impurity-decrease importances, normalized
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        Some(Array1::from_vec(self.feature_importances.clone()))
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }
}

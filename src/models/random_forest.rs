//! Random forest classifier

use crate::error::{AttritionError, Result};
use crate::models::decision_tree::{DecisionTree, TreeTask};
use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of classification trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Reweight the majority-class vote down when classes are imbalanced
    pub balanced: bool,
    pub seed: u64,
    n_features: usize,
    /// Vote weight applied to each tree's positive prediction
    positive_weight: f64,
    negative_weight: f64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            balanced: false,
            seed: 42,
            n_features: 0,
            positive_weight: 1.0,
            negative_weight: 1.0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the forest; trees are built in parallel with per-tree seeds
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

        self.n_features = n_features;
        if self.balanced {
            let positives = y.iter().filter(|&&v| v >= 0.5).count() as f64;
            let negatives = n_samples as f64 - positives;
            if positives == 0.0 || negatives == 0.0 {
                return Err(AttritionError::Training(
                    "balanced weighting needs both classes present".into(),
                ));
            }
            self.positive_weight = n_samples as f64 / (2.0 * positives);
            self.negative_weight = n_samples as f64 / (2.0 * negatives);
        } else {
            self.positive_weight = 1.0;
            self.negative_weight = 1.0;
        }

        // sqrt(n_features) per split, the usual forest default
        let max_features = (n_features as f64).sqrt().ceil() as usize;
        let base_seed = self.seed;

        let trees: Vec<Result<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                let mut tree = DecisionTree::new(TreeTask::Classification)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_seed(seed);
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees.into_iter().collect::<Result<Vec<_>>>()?;

        Ok(self)
    }

    /// Weighted fraction of trees voting for the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AttritionError::NotFitted);
        }

        let votes: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_rows = x.nrows();
        let mut proba = Array1::zeros(n_rows);
        for row in 0..n_rows {
            let mut pos = 0.0;
            let mut total = 0.0;
            for vote in &votes {
                if vote[row] >= 0.5 {
                    pos += self.positive_weight;
                    total += self.positive_weight;
                } else {
                    total += self.negative_weight;
                }
            }
            proba[row] = pos / total;
        }

        Ok(proba)
    }

    /// Predict class labels by majority vote
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Mean of per-tree impurity-decrease importances
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = Array1::zeros(self.n_features);
        let mut counted = 0usize;
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
                counted += 1;
            }
        }
        if counted == 0 {
            return None;
        }
        Some(total / counted as f64)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.push([i as f64 * 0.1, 1.0]);
            labels.push(0.0);
            rows.push([10.0 + i as f64 * 0.1, 1.0]);
            labels.push(1.0);
        }
        let x = Array2::from_shape_vec((40, 2), rows.concat()).unwrap();
        (x, Array1::from_vec(labels))
    }

    #[test]
    fn test_fit_and_predict_separable() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(25).with_seed(7);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 25);

        let predictions = forest.predict(&x).unwrap();
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        assert!(correct >= 38);
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let (x, y) = separable_data();
        let mut a = RandomForest::new(10).with_seed(3);
        let mut b = RandomForest::new(10).with_seed(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_proba_in_unit_interval() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(10).with_seed(1).with_balanced(true);
        forest.fit(&x, &y).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(0);
        assert!(matches!(
            forest.fit(&x, &y),
            Err(AttritionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(10).with_seed(5);
        forest.fit(&x, &y).unwrap();
        let imp = forest.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }
}

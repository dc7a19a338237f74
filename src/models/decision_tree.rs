//! Decision tree base learner
//!
//! Shared by the random forest (classification trees over bootstrap samples)
//! and gradient boosting (regression trees over residuals).

use crate::error::{AttritionError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// What the tree predicts at its leaves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TreeTask {
    /// Majority class of a binary label, Gini split criterion
    Classification,
    /// Mean target (residual), variance-reduction split criterion
    Regression,
}

/// Binary decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub task: TreeTask,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// When set, each split considers only this many randomly chosen features
    pub max_features: Option<usize>,
    pub seed: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl DecisionTree {
    pub fn new(task: TreeTask) -> Self {
        Self {
            root: None,
            task,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
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

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the tree
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AttritionError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < self.min_samples_split.max(1) {
            return Err(AttritionError::Training(format!(
                "need at least {} samples, got {}",
                self.min_samples_split, n_samples
            )));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || is_pure(&targets);

        if should_stop {
            return self.leaf(&targets, n_samples);
        }

        let Some((feature_idx, threshold, gain)) = self.best_split(x, y, indices, rng) else {
            return self.leaf(&targets, n_samples);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature_idx]] <= threshold);

        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return self.leaf(&targets, n_samples);
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_node(x, y, &left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build_node(x, y, &right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    fn leaf(&self, targets: &[f64], n_samples: usize) -> TreeNode {
        let value = match self.task {
            TreeTask::Classification => {
                let positives = targets.iter().filter(|&&t| t >= 0.5).count();
                if positives * 2 >= targets.len() && positives > 0 {
                    1.0
                } else {
                    0.0
                }
            }
            TreeTask::Regression => {
                if targets.is_empty() {
                    0.0
                } else {
                    targets.iter().sum::<f64>() / targets.len() as f64
                }
            }
        };
        TreeNode::Leaf { value, n_samples }
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let candidates: Vec<usize> = match self.max_features {
            Some(m) if m < n_features => {
                let mut all: Vec<usize> = (0..n_features).collect();
                all.shuffle(rng);
                all.truncate(m.max(1));
                all
            }
            _ => (0..n_features).collect(),
        };

        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = self.impurity(&targets);

        let mut best: Option<(usize, f64, f64)> = None;

        for &feature_idx in &candidates {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut acc_left = SplitAccumulator::default();
                let mut acc_right = SplitAccumulator::default();
                for &idx in indices {
                    let t = y[idx];
                    if x[[idx, feature_idx]] <= threshold {
                        acc_left.add(t);
                    } else {
                        acc_right.add(t);
                    }
                }

                if acc_left.count < self.min_samples_leaf || acc_right.count < self.min_samples_leaf
                {
                    continue;
                }

                let n = indices.len() as f64;
                let weighted = (acc_left.count as f64 * acc_left.impurity(self.task)
                    + acc_right.count as f64 * acc_right.impurity(self.task))
                    / n;
                let gain = parent_impurity - weighted;

                // Strict improvement; the first feature in candidate order
                // wins ties.
                if gain > best.map_or(0.0, |(_, _, g)| g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    fn impurity(&self, targets: &[f64]) -> f64 {
        let mut acc = SplitAccumulator::default();
        for &t in targets {
            acc.add(t);
        }
        acc.impurity(self.task)
    }

    /// Predict leaf values for each row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AttritionError::NotFitted)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                predict_row(root, &row.to_vec())
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Impurity-decrease feature importances, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

/// Running counts for one side of a candidate split
#[derive(Default)]
struct SplitAccumulator {
    count: usize,
    positives: usize,
    sum: f64,
    sq_sum: f64,
}

impl SplitAccumulator {
    fn add(&mut self, target: f64) {
        self.count += 1;
        if target >= 0.5 {
            self.positives += 1;
        }
        self.sum += target;
        self.sq_sum += target * target;
    }

    fn impurity(&self, task: TreeTask) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match task {
            TreeTask::Classification => {
                // Binary Gini: 2 p (1 - p)
                let p = self.positives as f64 / n;
                2.0 * p * (1.0 - p)
            }
            TreeTask::Regression => {
                // Var = E[X²] - E[X]²
                self.sq_sum / n - (self.sum / n).powi(2)
            }
        }
    }
}

fn is_pure(targets: &[f64]) -> bool {
    match targets.first() {
        None => true,
        Some(&first) => targets.iter().all(|&t| (t - first).abs() < 1e-10),
    }
}

fn predict_row(node: &TreeNode, row: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if row[*feature_idx] <= *threshold {
                predict_row(left, row)
            } else {
                predict_row(right, row)
            }
        }
    }
}

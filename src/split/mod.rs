//! Stratified partitioning
//!
//! Train/test splitting and k-fold generation that preserve class
//! proportions. Both operations are deterministic given the same seed.

use crate::error::{AttritionError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum allowed class-ratio deviation between a partition and the full set
pub const STRATIFY_TOLERANCE: f64 = 0.01;

/// Disjoint train/test row indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Disjoint, covering, stratified folds over the training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldSet {
    folds: Vec<Vec<usize>>,
}

impl FoldSet {
    pub fn k(&self) -> usize {
        self.folds.len()
    }

    /// Held-out validation rows for one fold
    pub fn validation(&self, fold: usize) -> &[usize] {
        &self.folds[fold]
    }

    /// Training rows for one fold: every other fold's rows
    pub fn complement(&self, fold: usize) -> Vec<usize> {
        self.folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fold)
            .flat_map(|(_, f)| f.iter().copied())
            .collect()
    }
}

/// Stratified splitter, seeded for reproducibility
#[derive(Debug, Clone)]
pub struct Splitter {
    seed: u64,
}

impl Splitter {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Partition rows into train and test, preserving class proportions.
    ///
    /// `folds` is the fold count the training partition will later be divided
    /// into; a class with fewer total members than `folds` cannot be
    /// stratified at all and fails the request.
    pub fn split(&self, labels: &Array1<f64>, test_fraction: f64, folds: usize) -> Result<Split> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(AttritionError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: test_fraction.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }

        if folds < 2 {
            return Err(AttritionError::InvalidParameter {
                name: "folds".to_string(),
                value: folds.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }

        let by_class = group_by_class(labels, (0..labels.len()).collect());
        for (&class, members) in &by_class {
            if members.len() < folds {
                return Err(AttritionError::DegenerateClass {
                    class,
                    count: members.len(),
                    folds,
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for members in by_class.values() {
            let mut shuffled = members.clone();
            shuffled.shuffle(&mut rng);

            // Per-class proportional allocation keeps the class ratio of each
            // partition within rounding of the full dataset's.
            let n_test = ((shuffled.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.clamp(1, shuffled.len() - 1);

            test.extend_from_slice(&shuffled[..n_test]);
            train.extend_from_slice(&shuffled[n_test..]);
        }

        train.sort_unstable();
        test.sort_unstable();

        Ok(Split { train, test })
    }

    /// Divide the training partition into k disjoint stratified folds
    pub fn make_folds(&self, train: &[usize], labels: &Array1<f64>, k: usize) -> Result<FoldSet> {
        if k < 2 {
            return Err(AttritionError::InvalidParameter {
                name: "folds".to_string(),
                value: k.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }

        let by_class = group_by_class(labels, train.to_vec());
        for (&class, members) in &by_class {
            if members.len() < k {
                return Err(AttritionError::DegenerateClass {
                    class,
                    count: members.len(),
                    folds: k,
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];

        // Round-robin within each class spreads every class evenly across folds
        for members in by_class.values() {
            let mut shuffled = members.clone();
            shuffled.shuffle(&mut rng);
            for (i, idx) in shuffled.into_iter().enumerate() {
                folds[i % k].push(idx);
            }
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }

        Ok(FoldSet { folds })
    }
}

/// Fraction of rows in `subset` whose label rounds to 1
pub fn positive_ratio(labels: &Array1<f64>, subset: &[usize]) -> f64 {
    if subset.is_empty() {
        return 0.0;
    }
    let positives = subset.iter().filter(|&&i| labels[i] >= 0.5).count();
    positives as f64 / subset.len() as f64
}

// BTreeMap keeps class iteration order stable, which keeps the RNG
// consumption order (and therefore the split) deterministic.
fn group_by_class(labels: &Array1<f64>, indices: Vec<usize>) -> BTreeMap<i64, Vec<usize>> {
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for idx in indices {
        by_class.entry(labels[idx].round() as i64).or_default().push(idx);
    }
    by_class
}

//! Grid search with k-fold cross-validation
//!
//! Trials (one candidate trained on one fold complement, scored on the fold)
//! are independent and run in parallel, each writing into its own result
//! slot. Fold scores are averaged per candidate; the winner is refit on the
//! full training data.

use crate::error::{AttritionError, Result};
use crate::eval::{Evaluator, Scoring};
use crate::models::Trainable;
use crate::search::grid::{Candidate, HyperparameterGrid};
use crate::split::FoldSet;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Lifecycle of one family's search, surfaced through tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Enumerating,
    Training,
    Aggregating,
    Selected,
    Failed,
}

/// The winner of one family's search
#[derive(Debug, Clone)]
pub struct SelectedModel<F> {
    pub model: F,
    pub candidate: Candidate,
    /// Position in grid enumeration order
    pub candidate_idx: usize,
    /// Mean validation score across folds
    pub cv_score: f64,
    /// Candidates that produced a score (failed ones are excluded)
    pub n_scored: usize,
}

/// Exhaustive search over a hyperparameter grid
#[derive(Debug, Clone)]
pub struct SearchEngine {
    pub scoring: Scoring,
    pub seed: u64,
}

impl SearchEngine {
    pub fn new(scoring: Scoring, seed: u64) -> Self {
        Self { scoring, seed }
    }

    /// Run every candidate through every fold, pick the best mean score, and
    /// refit the winner on all rows.
    ///
    /// A failed trial is excluded from its candidate's aggregate; the mean
    /// is taken over the surviving folds. A candidate drops out only when
    /// every one of its trials fails, and the search itself fails only when
    /// no candidate survives. Cancellation discards everything, including
    /// trials already finished.
    pub fn search<M>(
        &self,
        model: &M,
        x: &Array2<f64>,
        y: &Array1<f64>,
        grid: &HyperparameterGrid,
        folds: &FoldSet,
        cancel: &CancelToken,
    ) -> Result<SelectedModel<M::Fitted>>
    where
        M: Trainable + fmt::Display,
    {
        debug!(family = %model, phase = ?SearchPhase::Enumerating, "search phase");
        let candidates = grid.candidates();
        let k = folds.k();
        if candidates.is_empty() {
            debug!(family = %model, phase = ?SearchPhase::Failed, "search phase");
            return Err(AttritionError::SearchExhausted {
                family: model.to_string(),
                n_candidates: 0,
            });
        }

        info!(
            family = %model,
            candidates = candidates.len(),
            folds = k,
            scoring = %self.scoring,
            "starting grid search"
        );

        let evaluator = Evaluator::new();
        let n_trials = candidates.len() * k;
        debug!(family = %model, phase = ?SearchPhase::Training, trials = n_trials, "search phase");

        // One slot per trial. trial = candidate_idx * k + fold_idx, and the
        // trial index also derives the trial seed, so results do not depend
        // on scheduling.
        let trial_scores: Vec<Result<f64>> = (0..n_trials)
            .into_par_iter()
            .map(|trial_idx| {
                if cancel.is_cancelled() {
                    return Err(AttritionError::Cancelled);
                }
                let candidate_idx = trial_idx / k;
                let fold_idx = trial_idx % k;
                let seed = self.seed.wrapping_add(trial_idx as u64);

                let train_rows = folds.complement(fold_idx);
                let val_rows = folds.validation(fold_idx);

                let x_train = x.select(Axis(0), &train_rows);
                let y_train =
                    Array1::from_vec(train_rows.iter().map(|&i| y[i]).collect());
                let x_val = x.select(Axis(0), val_rows);
                let y_val = Array1::from_vec(val_rows.iter().map(|&i| y[i]).collect());

                let fitted = model.train(&candidates[candidate_idx], &x_train, &y_train, seed)?;
                evaluator.score(&fitted, &x_val, &y_val, self.scoring)
            })
            .collect();

        if cancel.is_cancelled() {
            debug!(family = %model, phase = ?SearchPhase::Failed, "search cancelled");
            return Err(AttritionError::Cancelled);
        }

        debug!(family = %model, phase = ?SearchPhase::Aggregating, "search phase");
        // Average each candidate over its surviving folds; failed trials are
        // excluded from the aggregate rather than vetoing the candidate.
        let mut best: Option<(usize, f64)> = None;
        let mut n_scored = 0usize;
        for (candidate_idx, candidate) in candidates.iter().enumerate() {
            let fold_scores = &trial_scores[candidate_idx * k..(candidate_idx + 1) * k];
            let mut sum = 0.0;
            let mut survived = 0usize;
            for trial in fold_scores {
                match trial {
                    Ok(score) => {
                        sum += score;
                        survived += 1;
                    }
                    Err(err) => {
                        warn!(
                            family = %model,
                            candidate = %candidate,
                            reason = %err,
                            "trial failed, excluded from aggregation"
                        );
                    }
                }
            }
            if survived == 0 {
                warn!(family = %model, candidate = %candidate, "candidate excluded, every trial failed");
                continue;
            }

            let mean = sum / survived as f64;
            n_scored += 1;
            debug!(family = %model, candidate = %candidate, score = mean, "candidate scored");

            // Strict improvement only, so earlier candidates win ties.
            if best.map_or(true, |(_, best_score)| mean > best_score) {
                best = Some((candidate_idx, mean));
            }
        }

        let Some((candidate_idx, cv_score)) = best else {
            debug!(family = %model, phase = ?SearchPhase::Failed, "search phase");
            return Err(AttritionError::SearchExhausted {
                family: model.to_string(),
                n_candidates: candidates.len(),
            });
        };
        let candidate = candidates[candidate_idx].clone();

        info!(
            family = %model,
            candidate = %candidate,
            score = cv_score,
            "search complete, refitting winner"
        );

        let fitted = model.train(&candidate, x, y, self.seed)?;
        debug!(family = %model, phase = ?SearchPhase::Selected, "search phase");

        Ok(SelectedModel {
            model: fitted,
            candidate,
            candidate_idx,
            cv_score,
            n_scored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classifier;
    use crate::search::grid::ParamValue;
    use crate::split::Splitter;

    /// Toy family: predicts positive when the feature clears `threshold`.
    /// A `fail` flag makes training error out, for failure-policy tests.
    struct ThresholdFamily;

    struct ThresholdModel {
        threshold: f64,
    }

    impl Classifier for ThresholdModel {
        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(x.column(0)
                .mapv(|v| if v > self.threshold { 1.0 } else { 0.0 }))
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            self.predict(x)
        }
    }

    impl Trainable for ThresholdFamily {
        type Fitted = ThresholdModel;

        fn train(
            &self,
            candidate: &Candidate,
            _x: &Array2<f64>,
            _y: &Array1<f64>,
            _seed: u64,
        ) -> Result<ThresholdModel> {
            if matches!(candidate.get("fail"), Some(ParamValue::Int(1))) {
                return Err(AttritionError::Training("forced failure".into()));
            }
            Ok(ThresholdModel {
                threshold: candidate.float("threshold")?,
            })
        }
    }

    impl fmt::Display for ThresholdFamily {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Threshold")
        }
    }

    fn fixture() -> (Array2<f64>, Array1<f64>, FoldSet) {
        // Positives cluster above 5.0, so threshold 5.0 is the best cut.
        let mut values = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            values.push(i as f64);
            labels.push(if i >= 6 { 1.0 } else { 0.0 });
        }
        let x = Array2::from_shape_vec((12, 1), values).unwrap();
        let y = Array1::from_vec(labels);

        let rows: Vec<usize> = (0..12).collect();
        let folds = Splitter::new(42).make_folds(&rows, &y, 3).unwrap();
        (x, y, folds)
    }

    #[test]
    fn test_selects_best_threshold() {
        let (x, y, folds) = fixture();
        let grid = HyperparameterGrid::new().with_floats("threshold", &[-1.0, 5.0, 100.0]);

        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let selected = engine
            .search(&ThresholdFamily, &x, &y, &grid, &folds, &CancelToken::new())
            .unwrap();

        assert_eq!(selected.candidate.float("threshold").unwrap(), 5.0);
        assert_eq!(selected.n_scored, 3);
        assert!((selected.cv_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tie_broken_by_enumeration_order() {
        let (x, y, folds) = fixture();
        // Both thresholds classify everything identically.
        let grid = HyperparameterGrid::new().with_floats("threshold", &[5.0, 5.5]);

        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let selected = engine
            .search(&ThresholdFamily, &x, &y, &grid, &folds, &CancelToken::new())
            .unwrap();

        assert_eq!(selected.candidate_idx, 0);
        assert_eq!(selected.candidate.float("threshold").unwrap(), 5.0);
    }

    #[test]
    fn test_failed_candidate_is_skipped() {
        let (x, y, folds) = fixture();
        let grid = HyperparameterGrid::new()
            .with_ints("fail", &[1, 0])
            .with_floats("threshold", &[5.0]);

        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let selected = engine
            .search(&ThresholdFamily, &x, &y, &grid, &folds, &CancelToken::new())
            .unwrap();

        assert_eq!(selected.n_scored, 1);
        assert_eq!(selected.candidate.int("fail").unwrap(), 0);
    }

    #[test]
    fn test_partial_fold_failure_still_selects() {
        // Fails on exactly one trial (seed base + 1); the other folds train.
        struct FlakyFamily;

        impl Trainable for FlakyFamily {
            type Fitted = ThresholdModel;

            fn train(
                &self,
                candidate: &Candidate,
                _x: &Array2<f64>,
                _y: &Array1<f64>,
                seed: u64,
            ) -> Result<ThresholdModel> {
                if seed == 43 {
                    return Err(AttritionError::Training("transient failure".into()));
                }
                Ok(ThresholdModel {
                    threshold: candidate.float("threshold")?,
                })
            }
        }

        impl fmt::Display for FlakyFamily {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("Flaky")
            }
        }

        let (x, y, folds) = fixture();
        let grid = HyperparameterGrid::new().with_floats("threshold", &[5.0]);

        // One candidate over 3 folds; the fold at trial index 1 fails, the
        // other two survive and must carry the candidate to selection.
        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let selected = engine
            .search(&FlakyFamily, &x, &y, &grid, &folds, &CancelToken::new())
            .unwrap();

        assert_eq!(selected.n_scored, 1);
        assert_eq!(selected.candidate.float("threshold").unwrap(), 5.0);
        // Mean over the two surviving folds, both perfectly classified.
        assert!((selected.cv_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_failures_exhaust_the_search() {
        let (x, y, folds) = fixture();
        let grid = HyperparameterGrid::new()
            .with_ints("fail", &[1])
            .with_floats("threshold", &[5.0, 6.0]);

        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let result = engine.search(&ThresholdFamily, &x, &y, &grid, &folds, &CancelToken::new());
        assert!(matches!(
            result,
            Err(AttritionError::SearchExhausted { n_candidates: 2, .. })
        ));
    }

    #[test]
    fn test_empty_grid_exhausts_immediately() {
        let (x, y, folds) = fixture();
        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let result = engine.search(
            &ThresholdFamily,
            &x,
            &y,
            &HyperparameterGrid::new(),
            &folds,
            &CancelToken::new(),
        );
        assert!(matches!(
            result,
            Err(AttritionError::SearchExhausted { n_candidates: 0, .. })
        ));
    }

    #[test]
    fn test_training_count_is_candidates_times_folds_plus_refit() {
        struct CountingFamily {
            trainings: std::sync::atomic::AtomicUsize,
        }

        impl Trainable for CountingFamily {
            type Fitted = ThresholdModel;

            fn train(
                &self,
                candidate: &Candidate,
                _x: &Array2<f64>,
                _y: &Array1<f64>,
                _seed: u64,
            ) -> Result<ThresholdModel> {
                self.trainings.fetch_add(1, Ordering::SeqCst);
                Ok(ThresholdModel {
                    threshold: candidate.float("threshold")?,
                })
            }
        }

        impl fmt::Display for CountingFamily {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("Counting")
            }
        }

        let (x, y, folds) = fixture();
        // 2 x 2 grid over 3 folds: 12 trials plus the winner's refit.
        let grid = HyperparameterGrid::new()
            .with_floats("threshold", &[5.0, 100.0])
            .with_ints("unused", &[0, 1]);

        let family = CountingFamily {
            trainings: std::sync::atomic::AtomicUsize::new(0),
        };
        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        engine
            .search(&family, &x, &y, &grid, &folds, &CancelToken::new())
            .unwrap();

        assert_eq!(family.trainings.load(Ordering::SeqCst), 4 * 3 + 1);
    }

    #[test]
    fn test_pre_cancelled_search_returns_cancelled() {
        let (x, y, folds) = fixture();
        let grid = HyperparameterGrid::new().with_floats("threshold", &[5.0]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let engine = SearchEngine::new(Scoring::Accuracy, 42);
        let result = engine.search(&ThresholdFamily, &x, &y, &grid, &folds, &cancel);
        assert!(matches!(result, Err(AttritionError::Cancelled)));
    }
}

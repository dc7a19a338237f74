//! Evaluation metrics
//!
//! Binary classification metrics with the convention that any zero-division
//! case (no predicted positives, no actual positives, a single class in the
//! truth vector) yields 0.0 rather than an error.

use crate::error::{AttritionError, Result};
use crate::models::Classifier;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric used to rank search trials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    Accuracy,
    Precision,
    Recall,
    F1,
    RocAuc,
}

impl Scoring {
    pub fn select(&self, metrics: &MetricSet) -> f64 {
        match self {
            Scoring::Accuracy => metrics.accuracy,
            Scoring::Precision => metrics.precision,
            Scoring::Recall => metrics.recall,
            Scoring::F1 => metrics.f1,
            Scoring::RocAuc => metrics.roc_auc,
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scoring::Accuracy => "accuracy",
            Scoring::Precision => "precision",
            Scoring::Recall => "recall",
            Scoring::F1 => "f1",
            Scoring::RocAuc => "roc_auc",
        };
        f.write_str(name)
    }
}

impl FromStr for Scoring {
    type Err = AttritionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accuracy" => Ok(Scoring::Accuracy),
            "precision" => Ok(Scoring::Precision),
            "recall" => Ok(Scoring::Recall),
            "f1" => Ok(Scoring::F1),
            "roc_auc" => Ok(Scoring::RocAuc),
            other => Err(AttritionError::InvalidParameter {
                name: "scoring".into(),
                value: other.into(),
                reason: "expected accuracy, precision, recall, f1 or roc_auc".into(),
            }),
        }
    }
}

/// The five headline metrics for one model on one dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

/// Confusion counts for the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AttritionError::Shape {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        let mut counts = ConfusionCounts::default();
        for (&truth, &pred) in y_true.iter().zip(y_pred.iter()) {
            match (truth >= 0.5, pred >= 0.5) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn accuracy(counts: &ConfusionCounts) -> f64 {
    let correct = (counts.true_positives + counts.true_negatives) as f64;
    let total = correct + (counts.false_positives + counts.false_negatives) as f64;
    safe_ratio(correct, total)
}

pub fn precision(counts: &ConfusionCounts) -> f64 {
    safe_ratio(
        counts.true_positives as f64,
        (counts.true_positives + counts.false_positives) as f64,
    )
}

pub fn recall(counts: &ConfusionCounts) -> f64 {
    safe_ratio(
        counts.true_positives as f64,
        (counts.true_positives + counts.false_negatives) as f64,
    )
}

pub fn f1(counts: &ConfusionCounts) -> f64 {
    let p = precision(counts);
    let r = recall(counts);
    safe_ratio(2.0 * p * r, p + r)
}

/// Area under the ROC curve via the rank statistic, with average ranks for
/// tied scores. A single-class truth vector yields 0.0.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(AttritionError::Shape {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }

    let n_pos = y_true.iter().filter(|&&v| v >= 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(0.0);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks across tie groups
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&truth, _)| truth >= 0.5)
        .map(|(_, &rank)| rank)
        .sum();

    let auc = (pos_rank_sum - n_pos as f64 * (n_pos as f64 + 1.0) / 2.0)
        / (n_pos as f64 * n_neg as f64);
    Ok(auc)
}

/// FPR/TPR pairs for the plotting collaborator, one point per distinct
/// score threshold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Sweep thresholds from high to low over the distinct scores
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<RocCurve> {
    if y_true.len() != scores.len() {
        return Err(AttritionError::Shape {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }

    let n_pos = y_true.iter().filter(|&&v| v >= 0.5).count();
    let n_neg = y_true.len() - n_pos;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        // Consume the whole tie group before emitting a point.
        while i < order.len() && scores[order[i]] == threshold {
            if y_true[order[i]] >= 0.5 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        curve.fpr.push(safe_ratio(fp as f64, n_neg as f64));
        curve.tpr.push(safe_ratio(tp as f64, n_pos as f64));
        curve.thresholds.push(threshold);
    }

    Ok(curve)
}

/// Everything one model produced on one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub predictions: Array1<f64>,
    pub probabilities: Array1<f64>,
    pub confusion: ConfusionCounts,
    pub metrics: MetricSet,
    pub curve: RocCurve,
}

/// Scores fitted models against held-out data
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// Compute all five metrics from labels and probability scores
    pub fn metrics_from_scores(
        &self,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        scores: &Array1<f64>,
    ) -> Result<MetricSet> {
        let counts = ConfusionCounts::from_predictions(y_true, y_pred)?;
        Ok(MetricSet {
            accuracy: accuracy(&counts),
            precision: precision(&counts),
            recall: recall(&counts),
            f1: f1(&counts),
            roc_auc: roc_auc(y_true, scores)?,
        })
    }

    /// Evaluate a fitted classifier on one dataset
    pub fn evaluate<C: Classifier>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y_true: &Array1<f64>,
    ) -> Result<EvaluationResult> {
        let probabilities = model.predict_proba(x)?;
        let predictions = probabilities.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
        let confusion = ConfusionCounts::from_predictions(y_true, &predictions)?;
        let metrics = self.metrics_from_scores(y_true, &predictions, &probabilities)?;
        let curve = roc_curve(y_true, &probabilities)?;
        Ok(EvaluationResult {
            predictions,
            probabilities,
            confusion,
            metrics,
            curve,
        })
    }

    /// Single scalar for trial ranking
    pub fn score<C: Classifier>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y_true: &Array1<f64>,
        scoring: Scoring,
    ) -> Result<f64> {
        let probabilities = model.predict_proba(x)?;
        let predictions = probabilities.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
        let metrics = self.metrics_from_scores(y_true, &predictions, &probabilities)?;
        Ok(scoring.select(&metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_counts() {
        let y_true = array![1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = array![1.0, 0.0, 0.0, 1.0, 1.0];
        let counts = ConfusionCounts::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(counts.true_positives, 2);
        assert_eq!(counts.false_negatives, 1);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.true_negatives, 1);
    }

    #[test]
    fn test_metrics_on_known_confusion() {
        let y_true = array![1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = array![1.0, 0.0, 0.0, 1.0, 1.0];
        let counts = ConfusionCounts::from_predictions(&y_true, &y_pred).unwrap();

        assert!((accuracy(&counts) - 0.6).abs() < 1e-12);
        assert!((precision(&counts) - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall(&counts) - 2.0 / 3.0).abs() < 1e-12);
        assert!((f1(&counts) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_worked_confusion_example() {
        let counts = ConfusionCounts {
            true_negatives: 80,
            false_positives: 5,
            false_negatives: 10,
            true_positives: 5,
        };
        assert!((precision(&counts) - 0.5).abs() < 1e-12);
        assert!((recall(&counts) - 1.0 / 3.0).abs() < 1e-12);
        assert!((f1(&counts) - 0.4).abs() < 1e-12);
        assert!((accuracy(&counts) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        // All-negative predictions: no predicted positives.
        let y_true = array![1.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let counts = ConfusionCounts::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(precision(&counts), 0.0);
        assert_eq!(f1(&counts), 0.0);

        // Single-class truth: recall and AUC collapse to 0.
        let y_true = array![0.0, 0.0, 0.0];
        let y_pred = array![0.0, 1.0, 0.0];
        let counts = ConfusionCounts::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(recall(&counts), 0.0);
        assert_eq!(roc_auc(&y_true, &array![0.1, 0.9, 0.2]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let perfect = array![0.1, 0.2, 0.8, 0.9];
        let inverted = array![0.9, 0.8, 0.2, 0.1];
        assert!((roc_auc(&y_true, &perfect).unwrap() - 1.0).abs() < 1e-12);
        assert!((roc_auc(&y_true, &inverted).unwrap() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_tied_scores() {
        // All scores equal: AUC must be exactly 0.5 by average-rank handling.
        let y_true = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.5, 0.5, 0.5, 0.5];
        assert!((roc_auc(&y_true, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scoring_parse_and_select() {
        let metrics = MetricSet {
            accuracy: 0.1,
            precision: 0.2,
            recall: 0.3,
            f1: 0.4,
            roc_auc: 0.5,
        };
        let scoring: Scoring = "recall".parse().unwrap();
        assert_eq!(scoring.select(&metrics), 0.3);
        assert!("jaccard".parse::<Scoring>().is_err());
    }

    #[test]
    fn test_roc_curve_endpoints_and_monotonicity() {
        let y_true = array![0.0, 1.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.9, 0.4, 0.6, 0.6];
        let curve = roc_curve(&y_true, &scores).unwrap();

        assert_eq!(curve.fpr[0], 0.0);
        assert_eq!(curve.tpr[0], 0.0);
        assert_eq!(*curve.fpr.last().unwrap(), 1.0);
        assert_eq!(*curve.tpr.last().unwrap(), 1.0);
        for pair in curve.fpr.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for pair in curve.tpr.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        // Tied scores collapse into a single point.
        assert_eq!(curve.thresholds.iter().filter(|&&t| t == 0.6).count(), 1);
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![1.0];
        assert!(ConfusionCounts::from_predictions(&y_true, &y_pred).is_err());
    }
}

//! Logistic regression

use crate::error::{AttritionError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regularization penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Penalty {
    L1,
    L2,
}

impl Penalty {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            other => Err(AttritionError::InvalidParameter {
                name: "penalty".into(),
                value: other.into(),
                reason: "expected 'l1' or 'l2'".into(),
            }),
        }
    }
}

/// Binary logistic regression fitted by gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength; smaller means stronger penalty
    pub c: f64,
    pub penalty: Penalty,
    /// Reweight classes inversely to their frequency
    pub balanced: bool,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            penalty: Penalty::L2,
            balanced: false,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sigmoid function
    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit the model using gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AttritionError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.c <= 0.0 {
            return Err(AttritionError::InvalidParameter {
                name: "C".into(),
                value: self.c.to_string(),
                reason: "must be positive".into(),
            });
        }

        let sample_weights = self.sample_weights(y)?;
        let weight_sum: f64 = sample_weights.sum();

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let alpha = 1.0 / (self.c * n_samples as f64);

        for _iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = (&predictions - y) * &sample_weights;
            let penalty_grad = match self.penalty {
                Penalty::L2 => alpha * &weights,
                Penalty::L1 => alpha * weights.mapv(f64::signum),
            };
            let dw = (x.t().dot(&errors) / weight_sum) + penalty_grad;
            let db = errors.sum() / weight_sum;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);

        Ok(self)
    }

    fn sample_weights(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.balanced {
            return Ok(Array1::ones(y.len()));
        }
        let n = y.len() as f64;
        let positives = y.iter().filter(|&&v| v >= 0.5).count() as f64;
        let negatives = n - positives;
        if positives == 0.0 || negatives == 0.0 {
            return Err(AttritionError::Training(
                "balanced weighting needs both classes present".into(),
            ));
        }
        // n / (2 * class count), so each class contributes half the loss
        let w_pos = n / (2.0 * positives);
        let w_neg = n / (2.0 * negatives);
        Ok(y.mapv(|v| if v >= 0.5 { w_pos } else { w_neg }))
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(AttritionError::NotFitted)?;
        let intercept = self.intercept.unwrap_or(0.0);

        let linear = x.dot(coefficients) + intercept;
        Ok(Self::sigmoid(&linear))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0],
            [-1.5],
            [-1.0],
            [-0.5],
            [0.5],
            [1.0],
            [1.5],
            [2.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_fit_separable() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new().with_max_iter(2000);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_proba_monotone_in_feature() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new().with_max_iter(2000);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        for pair in proba.to_vec().windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_stronger_penalty_shrinks_coefficients() {
        let (x, y) = separable_data();
        let mut weak = LogisticRegression::new().with_c(10.0).with_max_iter(2000);
        let mut strong = LogisticRegression::new().with_c(0.001).with_max_iter(2000);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let w = weak.coefficients.as_ref().unwrap()[0].abs();
        let s = strong.coefficients.as_ref().unwrap()[0].abs();
        assert!(s < w);
    }

    #[test]
    fn test_balanced_requires_both_classes() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut model = LogisticRegression::new().with_balanced(true);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_invalid_c_rejected() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new().with_c(0.0);
        assert!(matches!(
            model.fit(&x, &y),
            Err(AttritionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_penalty_parse() {
        assert_eq!(Penalty::parse("l1").unwrap(), Penalty::L1);
        assert_eq!(Penalty::parse("l2").unwrap(), Penalty::L2);
        assert!(Penalty::parse("elasticnet").is_err());
    }

    #[test]
    fn test_predict_unfitted_fails() {
        let model = LogisticRegression::new();
        let x = array![[1.0]];
        assert!(matches!(
            model.predict(&x),
            Err(AttritionError::NotFitted)
        ));
    }
}

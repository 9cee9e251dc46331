//! Binary logistic regression with L2 regularization and optional
//! class-balanced sample weighting.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this.
    pub tol: f64,
    /// Weight each class by `n_samples / (2 * class_count)`.
    pub balanced: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            balanced: true,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    fn sample_weights(&self, y: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        let n = y.len() as f64;
        let positives = y.iter().filter(|&&label| label >= 0.5).count() as f64;
        let negatives = n - positives;

        if positives == 0.0 {
            return Err(ModelError::SingleClass(0));
        }
        if negatives == 0.0 {
            return Err(ModelError::SingleClass(1));
        }

        if !self.balanced {
            return Ok(Array1::ones(y.len()));
        }

        let positive_weight = n / (2.0 * positives);
        let negative_weight = n / (2.0 * negatives);
        Ok(y.mapv(|label| {
            if label >= 0.5 {
                positive_weight
            } else {
                negative_weight
            }
        }))
    }

    /// Minimizes `mean(w_i * logloss_i) + ||coef||^2 / (2 * C * n)` by
    /// gradient descent with Armijo backtracking. The intercept is not
    /// penalized.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedLogistic, ModelError> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_samples != y.len() {
            return Err(ModelError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "C",
                value: self.c.to_string(),
                reason: "must be positive and finite",
            });
        }

        let weights = self.sample_weights(y)?;
        let penalty = 1.0 / (self.c * n_samples as f64);

        let objective = |coef: &Array1<f64>, intercept: f64| -> f64 {
            let z = x.dot(coef) + intercept;
            let data: f64 = z
                .iter()
                .zip(y.iter())
                .zip(weights.iter())
                .map(|((&z, &label), &w)| w * (softplus(z) - label * z))
                .sum();
            data / n_samples as f64 + 0.5 * penalty * coef.dot(coef)
        };

        let mut coef = Array1::<f64>::zeros(n_features);
        let mut intercept = 0.0;
        let mut loss = objective(&coef, intercept);
        let mut step: f64 = 1.0;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let z = x.dot(&coef) + intercept;
            let residual = (z.mapv(sigmoid) - y) * &weights;
            let grad_coef = x.t().dot(&residual) / n_samples as f64 + penalty * &coef;
            let grad_intercept = residual.sum() / n_samples as f64;

            let grad_sq = grad_coef.dot(&grad_coef) + grad_intercept * grad_intercept;
            if grad_sq.sqrt() < self.tol {
                converged = true;
                break;
            }

            // Grow the step again after successful iterations.
            step = (step * 2.0).min(64.0);
            loop {
                let candidate = &coef - &(step * &grad_coef);
                let candidate_intercept = intercept - step * grad_intercept;
                let candidate_loss = objective(&candidate, candidate_intercept);

                if candidate_loss <= loss - 1e-4 * step * grad_sq {
                    coef = candidate;
                    intercept = candidate_intercept;
                    loss = candidate_loss;
                    break;
                }

                step *= 0.5;
                if step < 1e-12 {
                    break;
                }
            }

            if step < 1e-12 {
                // No further decrease is representable.
                converged = true;
                break;
            }
        }

        if converged {
            tracing::debug!(iterations, loss, "logistic regression converged");
        } else {
            tracing::warn!(
                iterations,
                loss,
                "logistic regression reached max_iter without converging"
            );
        }

        Ok(FittedLogistic {
            coefficients: coef.to_vec(),
            intercept,
        })
    }
}

/// Fitted weights, serialized as part of the pipeline artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLogistic {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl FittedLogistic {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Probability of the positive class for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ModelError::Shape {
                expected: format!("{} columns", self.coefficients.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let coef = Array1::from(self.coefficients.clone());
        let linear = x.dot(&coef) + self.intercept;
        Ok(linear.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| u8::from(p >= 0.5)))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

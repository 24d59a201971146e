//! Multinomial logistic regression trained with proximal gradient descent.
//!
//! Minimizes
//!
//! ```text
//! (1/n) * sum_i w_i * CE(softmax(x_i W + b), y_i) + R(W) / (C * n)
//! ```
//!
//! where `w_i` is the sample's class weight and `R` is `||W||_1` or
//! `0.5 * ||W||_2^2`. The intercept is never penalized. The L1 penalty is
//! handled with soft-thresholding, so irrelevant coefficients end up exactly
//! zero.

use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError, Result};
use crate::models::classifier_trait::{
    check_fit_input, check_width, log_softmax_rows, sample_weights, softmax_rows, ClassifierModel,
};
use crate::params::{ClassWeights, ParamReader, ResolvedParams};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LogRegParams {
    /// Inverse regularization strength.
    pub c: f64,
    pub penalty: Penalty,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    pub class_weight: Option<ClassWeights>,
}

impl Default for LogRegParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            max_iter: 1000,
            tol: 1e-4,
            fit_intercept: true,
            class_weight: None,
        }
    }
}

impl LogRegParams {
    pub fn from_resolved(resolved: &ResolvedParams) -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut reader = ParamReader::new(&resolved.params);
        let c = reader.positive_f64("C", defaults.c)?;
        let penalty = match reader.string("penalty", "l2")?.as_str() {
            "l1" => Penalty::L1,
            "l2" => Penalty::L2,
            other => {
                return Err(ConfigError::invalid_param(
                    "penalty",
                    format!("expected l1 or l2, got {:?}", other),
                ))
            }
        };
        let max_iter = reader.usize("max_iter", defaults.max_iter)?;
        let tol = reader.positive_f64("tol", defaults.tol)?;
        let fit_intercept = reader.bool("fit_intercept", defaults.fit_intercept)?;
        reader.finish("logreg")?;

        if max_iter == 0 {
            return Err(ConfigError::invalid_param("max_iter", "must be at least 1"));
        }

        Ok(Self {
            c,
            penalty,
            max_iter,
            tol,
            fit_intercept,
            class_weight: resolved.class_weight.clone(),
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
struct LinearWeights {
    /// `(n_features, n_classes)`
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    params: LogRegParams,
    weights: Option<LinearWeights>,
    n_iter: usize,
}

impl LogisticRegression {
    pub fn new(params: LogRegParams) -> Self {
        Self {
            params,
            weights: None,
            n_iter: 0,
        }
    }

    pub fn params(&self) -> &LogRegParams {
        &self.params
    }

    /// Learned coefficients, `(n_features, n_classes)`.
    pub fn coef(&self) -> Option<&Array2<f64>> {
        self.weights.as_ref().map(|w| &w.coef)
    }

    pub fn intercept(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref().map(|w| &w.intercept)
    }

    /// Iterations used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or(ModelError::NotFitted("logistic regression has not been fitted"))?;
        check_width(weights.coef.nrows(), x)?;
        Ok(x.dot(&weights.coef) + &weights.intercept)
    }
}

impl ClassifierModel for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;
        let (n, d) = x.dim();
        let params = &self.params;

        let sw = Array1::from(sample_weights(y, params.class_weight.as_ref()));
        let mut targets = Array2::<f64>::zeros((n, n_classes));
        for (row, &class) in y.iter().enumerate() {
            targets[(row, class)] = 1.0;
        }

        let n_f = n.max(1) as f64;
        let reg = 1.0 / (params.c * n_f);
        let max_sw = sw.iter().cloned().fold(0.0f64, f64::max);
        let intercept_term = if params.fit_intercept { 1.0 } else { 0.0 };
        let mean_sq_norm =
            x.rows().into_iter().map(|r| r.dot(&r)).sum::<f64>() / n_f + intercept_term;
        let l2_term = match params.penalty {
            Penalty::L2 => reg,
            Penalty::L1 => 0.0,
        };
        // Lipschitz bound of the smooth part's gradient.
        let lipschitz = (0.5 * max_sw * mean_sq_norm + l2_term).max(1e-12);
        let step = 1.0 / lipschitz;

        let mut coef = Array2::<f64>::zeros((d, n_classes));
        let mut intercept = Array1::<f64>::zeros(n_classes);
        let sw_col = sw.insert_axis(Axis(1)) / n_f;

        let mut converged = false;
        let mut iter = 0;
        while iter < params.max_iter {
            iter += 1;
            let proba = softmax_rows(x.dot(&coef) + &intercept);
            let resid = (proba - &targets) * &sw_col;

            let mut grad = x.t().dot(&resid);
            if params.penalty == Penalty::L2 {
                grad.scaled_add(reg, &coef);
            }

            let mut next = &coef - &(grad * step);
            if params.penalty == Penalty::L1 {
                let threshold = step * reg;
                next.mapv_inplace(|v| v.signum() * (v.abs() - threshold).max(0.0));
            }

            let mut change = Zip::from(&next)
                .and(&coef)
                .fold(0.0f64, |acc, &a, &b| acc.max((a - b).abs()));

            if params.fit_intercept {
                let grad_b = resid.sum_axis(Axis(0));
                let next_b = &intercept - &(grad_b * step);
                change = Zip::from(&next_b)
                    .and(&intercept)
                    .fold(change, |acc, &a, &b| acc.max((a - b).abs()));
                intercept = next_b;
            }
            coef = next;

            // Norm of the gradient mapping.
            if change / step < params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::debug!(
                "Logistic regression did not converge within {} iterations",
                params.max_iter
            );
        }
        log::trace!("Logistic regression fitted {} features x {} classes in {} iterations", d, n_classes, iter);

        self.n_iter = iter;
        self.weights = Some(LinearWeights { coef, intercept });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(self.decision_function(x)?))
    }

    fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(log_softmax_rows(self.decision_function(x)?))
    }

    fn n_classes(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.intercept.len())
    }

    fn name(&self) -> &str {
        "logreg"
    }
}

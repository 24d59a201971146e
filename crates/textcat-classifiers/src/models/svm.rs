//! One-vs-rest linear SVM (L2-regularized, squared hinge loss) trained with
//! dual coordinate descent.
//!
//! Class probabilities are the softmax of the per-class margins.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError, Result};
use crate::models::classifier_trait::{
    check_fit_input, check_width, log_softmax_rows, sample_weights, softmax_rows, ClassifierModel,
};
use crate::params::{ClassWeights, ParamReader, ResolvedParams};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SvmParams {
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    pub random_state: Option<u64>,
    pub class_weight: Option<ClassWeights>,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-3,
            fit_intercept: true,
            random_state: None,
            class_weight: None,
        }
    }
}

impl SvmParams {
    pub fn from_resolved(resolved: &ResolvedParams) -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut reader = ParamReader::new(&resolved.params);
        let c = reader.positive_f64("C", defaults.c)?;
        let kernel = reader.string("kernel", "linear")?;
        let max_iter = reader.usize("max_iter", defaults.max_iter)?;
        let tol = reader.positive_f64("tol", defaults.tol)?;
        let fit_intercept = reader.bool("fit_intercept", defaults.fit_intercept)?;
        let random_state = reader.opt_u64("random_state")?;
        reader.finish("svm")?;

        if kernel != "linear" {
            return Err(ConfigError::invalid_param(
                "kernel",
                format!("only the linear kernel is supported, got {:?}", kernel),
            ));
        }
        if max_iter == 0 {
            return Err(ConfigError::invalid_param("max_iter", "must be at least 1"));
        }

        Ok(Self {
            c,
            max_iter,
            tol,
            fit_intercept,
            random_state,
            class_weight: resolved.class_weight.clone(),
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LinearSvm {
    params: SvmParams,
    /// `(n_features, n_classes)`
    coef: Option<Array2<f64>>,
    intercept: Option<Array1<f64>>,
}

impl LinearSvm {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            coef: None,
            intercept: None,
        }
    }

    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    /// Signed distance to each class's hyperplane.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coef, intercept) = self
            .coef
            .as_ref()
            .zip(self.intercept.as_ref())
            .ok_or(ModelError::NotFitted("svm has not been fitted"))?;
        check_width(coef.nrows(), x)?;
        Ok(x.dot(coef) + intercept)
    }
}

/// Binary problem `class` vs the rest. Returns `(w, b)`.
fn fit_binary(
    x: &Array2<f64>,
    y: &[usize],
    class: usize,
    costs: &[f64],
    params: &SvmParams,
    rng: &mut StdRng,
) -> (Array1<f64>, f64) {
    let (n, d) = x.dim();
    let bias_term = if params.fit_intercept { 1.0 } else { 0.0 };
    let signs: Vec<f64> = y.iter().map(|&c| if c == class { 1.0 } else { -1.0 }).collect();
    // Squared hinge: diagonal shift 1 / (2 C_i), no upper bound on alpha.
    let diag: Vec<f64> = costs
        .iter()
        .map(|&c| if c > 0.0 { 0.5 / c } else { f64::INFINITY })
        .collect();
    let q_ii: Vec<f64> = x
        .axis_iter(Axis(0))
        .zip(&diag)
        .map(|(row, &dii)| row.dot(&row) + bias_term + dii)
        .collect();

    let mut w = Array1::<f64>::zeros(d);
    let mut b = 0.0;
    let mut alpha = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).filter(|&i| costs[i] > 0.0).collect();

    for epoch in 0..params.max_iter {
        order.shuffle(rng);
        let mut max_violation = 0.0f64;
        for &i in &order {
            let row = x.row(i);
            let g = signs[i] * (row.dot(&w) + b) - 1.0 + diag[i] * alpha[i];
            let projected = if alpha[i] == 0.0 { g.min(0.0) } else { g };
            max_violation = max_violation.max(projected.abs());
            if projected.abs() > 1e-12 {
                let old = alpha[i];
                alpha[i] = (old - g / q_ii[i]).max(0.0);
                let delta = (alpha[i] - old) * signs[i];
                w.scaled_add(delta, &row);
                b += delta * bias_term;
            }
        }
        if max_violation < params.tol {
            log::trace!("svm class {} converged after {} epochs", class, epoch + 1);
            break;
        }
    }
    (w, b)
}

impl ClassifierModel for LinearSvm {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;
        let params = &self.params;
        let costs: Vec<f64> = sample_weights(y, params.class_weight.as_ref())
            .into_iter()
            .map(|w| w * params.c)
            .collect();
        let seed = params.random_state.unwrap_or_else(rand::random);

        let planes: Vec<(Array1<f64>, f64)> = (0..n_classes)
            .into_par_iter()
            .map(|class| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(class as u64));
                fit_binary(x, y, class, &costs, params, &mut rng)
            })
            .collect();

        let mut coef = Array2::<f64>::zeros((x.ncols(), n_classes));
        let mut intercept = Array1::<f64>::zeros(n_classes);
        for (class, (w, b)) in planes.into_iter().enumerate() {
            coef.column_mut(class).assign(&w);
            intercept[class] = b;
        }
        self.coef = Some(coef);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(self.decision_function(x)?))
    }

    fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(log_softmax_rows(self.decision_function(x)?))
    }

    fn n_classes(&self) -> Option<usize> {
        self.intercept.as_ref().map(Array1::len)
    }

    fn name(&self) -> &str {
        "svm"
    }
}

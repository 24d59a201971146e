//! Feature selection utilities.
//!
//! Univariate selection scores each feature on its own (ANOVA F-test);
//! model-based selection keeps the features an L1-penalized logistic
//! regression relies on.
pub mod from_model;
pub mod univariate_selection;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::SelectorKind;
use crate::error::{ModelError, Result};

use self::from_model::SelectFromModel;
use self::univariate_selection::SelectPercentile;

/// A fitted (or unfitted) column filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    kind: SelectorKind,
    n_features_in: usize,
    support: Option<Vec<usize>>,
    scores: Option<Array1<f64>>,
}

impl FeatureSelector {
    pub fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            n_features_in: 0,
            support: None,
            scores: None,
        }
    }

    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    /// Kept column indices, ascending.
    pub fn support(&self) -> Option<&[usize]> {
        self.support.as_deref()
    }

    /// Per-feature score used for the ranking (F-value or L1 importance).
    pub fn scores(&self) -> Option<&Array1<f64>> {
        self.scores.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let (support, scores) = match self.kind {
            SelectorKind::L1 => SelectFromModel::default().fit(x, y, n_classes)?,
            SelectorKind::FScore => SelectPercentile::default().fit(x, y, n_classes),
        };
        log::debug!("Selected {} of {} features", support.len(), x.ncols());
        self.n_features_in = x.ncols();
        self.support = Some(support);
        self.scores = Some(scores);
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let support = self
            .support
            .as_ref()
            .ok_or(ModelError::NotFitted("feature selector has not been fitted"))?;
        if x.ncols() != self.n_features_in {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features_in,
                actual: x.ncols(),
            });
        }
        Ok(x.select(Axis(1), support))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<Array2<f64>> {
        self.fit(x, y, n_classes)?;
        self.transform(x)
    }
}

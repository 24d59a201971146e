//! Selection from the coefficients of an L1-regularized model.
use ndarray::{Array1, Array2, Axis};

use crate::error::{ModelError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::logistic::{LogRegParams, LogisticRegression, Penalty};

/// Keeps the features an L1-penalized logistic regression gives non-zero
/// weight, summed over classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectFromModel {
    c: f64,
    threshold: f64,
}

impl Default for SelectFromModel {
    fn default() -> Self {
        Self {
            c: 1.0,
            threshold: 1e-5,
        }
    }
}

impl SelectFromModel {
    pub fn new(c: f64, threshold: f64) -> Self {
        Self { c, threshold }
    }

    /// Indices of the kept features in column order, with the importance
    /// (`sum |coef|` over classes) of every feature.
    pub fn fit(&self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<(Vec<usize>, Array1<f64>)> {
        let mut model = LogisticRegression::new(LogRegParams {
            c: self.c,
            penalty: Penalty::L1,
            ..LogRegParams::default()
        });
        model.fit(x, y, n_classes)?;

        let coef = model
            .coef()
            .ok_or(ModelError::NotFitted("l1 selection model has not been fitted"))?;
        let importance = coef.mapv(f64::abs).sum_axis(Axis(1));
        let selected: Vec<usize> = importance
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > self.threshold)
            .map(|(idx, _)| idx)
            .collect();

        if selected.is_empty() {
            log::warn!("L1 feature selection removed all {} features", x.ncols());
        }
        Ok((selected, importance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_drops_uninformative_columns() {
        let x = array![
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let (selected, importance) = SelectFromModel::default().fit(&x, &y, 2).unwrap();
        assert_eq!(selected, vec![0, 1]);
        assert_eq!(importance[2], 0.0);
    }
}

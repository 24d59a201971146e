use ndarray::{Array2, ArrayView1};

use crate::error::{ModelError, Result};
use crate::params::ClassWeights;

/// Contract shared by every multi-class classifier.
///
/// Class ids are dense `0..n_classes`. `n_classes` is passed explicitly
/// because a training subset (a cross-validation fold, a bootstrap sample)
/// may not contain every class.
pub trait ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// One row per example, one column per class. Rows sum to one.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Natural log of [`predict_proba`](Self::predict_proba). Zero
    /// probabilities become negative infinity.
    fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_proba(x)?.mapv(f64::ln))
    }

    /// Most probable class per row. Ties go to the lowest class id.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(argmax).collect())
    }

    fn n_classes(&self) -> Option<usize>;

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in row.iter().enumerate() {
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((idx, value));
        }
    }
    best.map_or(0, |(idx, _)| idx)
}

pub(crate) fn check_fit_input(x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            examples: x.nrows(),
            labels: y.len(),
        });
    }
    if n_classes == 0 {
        return Err(ModelError::DegenerateLabels(0));
    }
    if let Some(&bad) = y.iter().find(|&&class| class >= n_classes) {
        return Err(ModelError::UnknownClass(bad));
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(ModelError::FeatureMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

/// Per-sample weight derived from per-class weights. Classes missing from
/// the mapping weigh one.
pub(crate) fn sample_weights(y: &[usize], class_weight: Option<&ClassWeights>) -> Vec<f64> {
    match class_weight {
        None => vec![1.0; y.len()],
        Some(weights) => y
            .iter()
            .map(|class| weights.get(class).copied().unwrap_or(1.0))
            .collect(),
    }
}

/// Row-wise softmax, in place.
pub(crate) fn softmax_rows(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    z
}

/// Row-wise log-softmax, in place.
pub(crate) fn log_softmax_rows(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f64>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(array![0.2, 0.4, 0.4].view()), 1);
        assert_eq!(argmax(array![-5.0, -7.0].view()), 0);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let p = softmax_rows(array![[1.0, 2.0, 3.0], [1000.0, 1000.0, -1000.0]]);
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((p[(1, 0)] - 0.5).abs() < 1e-12);

        let lp = log_softmax_rows(array![[1.0, 2.0, 3.0]]);
        assert!((lp[(0, 2)].exp() - p[(0, 2)]).abs() < 1e-12);
    }

    #[test]
    fn test_sample_weights_default_to_one() {
        let weights = ClassWeights::from([(1, 3.0)]);
        assert_eq!(sample_weights(&[0, 1, 1], Some(&weights)), vec![1.0, 3.0, 3.0]);
        assert_eq!(sample_weights(&[0, 1], None), vec![1.0, 1.0]);
    }
}

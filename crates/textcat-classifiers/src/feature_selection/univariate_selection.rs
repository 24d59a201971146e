//! Univariate feature selection for classification targets.

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Compute the ANOVA F-value of each feature against a class target.
///
/// For every column the samples are grouped by class, and the ratio of the
/// between-class variance to the within-class variance is computed. Columns
/// that separate the classes well get large F-values and small p-values.
///
/// # Parameters
///
/// * `x` - A 2D array of shape (n_samples, n_features).
/// * `y` - Class ids of shape (n_samples,), each below `n_classes`.
/// * `n_classes` - Number of classes. Classes without samples are ignored.
/// * `force_finite` - Replace non-finite results. An infinite F (no
///   within-class spread) becomes `f64::MAX` with p-value 0; an undefined F
///   (constant column) becomes 0 with p-value 1.
///
/// # Returns
///
/// A tuple `(f_statistic, p_values)`, both of shape (n_features,).
///
/// # Examples
///
/// ```rust
/// use ndarray::array;
/// use textcat_classifiers::feature_selection::univariate_selection::f_classif;
///
/// let x = array![[1.0, 3.0], [1.1, 3.0], [5.0, 3.0], [5.2, 3.0]];
/// let (f, p) = f_classif(&x, &[0, 0, 1, 1], 2, true);
/// assert!(f[0] > 100.0);
/// assert_eq!(f[1], 0.0);
/// assert_eq!(p[1], 1.0);
/// ```
pub fn f_classif(x: &Array2<f64>, y: &[usize], n_classes: usize, force_finite: bool) -> (Array1<f64>, Array1<f64>) {
    let n_samples = x.nrows();
    let n_features = x.ncols();

    let mut counts = vec![0usize; n_classes];
    for &class in y {
        counts[class] += 1;
    }
    let present = counts.iter().filter(|&&c| c > 0).count();
    let df_between = present as f64 - 1.0;
    let df_within = n_samples as f64 - present as f64;

    let mut f_statistic = Array1::<f64>::zeros(n_features);
    for (j, col) in x.columns().into_iter().enumerate() {
        let mut sums = vec![0.0; n_classes];
        for (&v, &class) in col.iter().zip(y) {
            sums[class] += v;
        }
        let overall = col.sum() / n_samples as f64;
        let means: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();

        let ss_between: f64 = means
            .iter()
            .zip(&counts)
            .map(|(&m, &c)| c as f64 * (m - overall).powi(2))
            .sum();
        let ss_within: f64 = col
            .iter()
            .zip(y)
            .map(|(&v, &class)| (v - means[class]).powi(2))
            .sum();

        f_statistic[j] = (ss_between / df_between) / (ss_within / df_within);
    }

    // Degenerate degrees of freedom leave every p-value undefined.
    let f_dist = FisherSnedecor::new(df_between, df_within).ok();
    let mut p_values = f_statistic.mapv(|f| match &f_dist {
        Some(dist) if f.is_finite() => 1.0 - dist.cdf(f),
        Some(_) if f.is_infinite() => 0.0,
        _ => f64::NAN,
    });

    if force_finite {
        for i in 0..n_features {
            if f_statistic[i].is_infinite() {
                f_statistic[i] = f64::MAX;
                p_values[i] = 0.0;
            } else if f_statistic[i].is_nan() {
                f_statistic[i] = 0.0;
                p_values[i] = 1.0;
            } else if p_values[i].is_nan() {
                p_values[i] = 1.0;
            }
        }
    }

    (f_statistic, p_values)
}

/// Keeps the top percentile of features ranked by ANOVA F-value.
///
/// This follows scikit-learn's `SelectPercentile` with `f_classif` as the
/// scoring function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectPercentile {
    /// Percentage of features to keep, in (0, 100].
    percentile: f64,
}

impl Default for SelectPercentile {
    fn default() -> Self {
        Self { percentile: 10.0 }
    }
}

impl SelectPercentile {
    /// Creates a new SelectPercentile instance.
    ///
    /// # Arguments
    ///
    /// * `percentile` - Percentage of features to keep. Values are clamped
    ///   into (0, 100].
    pub fn new(percentile: f64) -> Self {
        SelectPercentile {
            percentile: percentile.clamp(f64::MIN_POSITIVE, 100.0),
        }
    }

    /// Number of features kept out of `n_features`: the percentile rounded
    /// up, but at least one.
    pub fn n_selected(&self, n_features: usize) -> usize {
        if n_features == 0 {
            return 0;
        }
        let k = (n_features as f64 * self.percentile / 100.0).ceil() as usize;
        k.clamp(1, n_features)
    }

    /// Scores the features and returns the indices of those kept, in
    /// column order, together with the F-scores.
    ///
    /// Ties in score go to the lower column index.
    ///
    /// # Arguments
    ///
    /// * `x` - The feature matrix (n_samples x n_features).
    /// * `y` - Class ids.
    /// * `n_classes` - Number of classes.
    pub fn fit(&self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> (Vec<usize>, Array1<f64>) {
        let (f_scores, _) = f_classif(x, y, n_classes, true);

        // Stable sort, highest score first.
        let mut indices: Vec<usize> = (0..f_scores.len()).collect();
        indices.sort_by(|&i, &j| {
            f_scores[j]
                .partial_cmp(&f_scores[i])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selected: Vec<usize> = indices
            .into_iter()
            .take(self.n_selected(f_scores.len()))
            .collect();
        selected.sort_unstable();
        (selected, f_scores)
    }
}

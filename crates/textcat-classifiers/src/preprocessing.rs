//! Feature scalers.
//!
//! Neither scaler centers the data, so columns that are mostly zero stay
//! mostly zero. Columns with no spread (or all zeros) are left unscaled.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ScalerKind;
use crate::error::{ModelError, Result};

/// Per-column divisor learned from the training matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    kind: ScalerKind,
    scale: Option<Array1<f64>>,
}

impl FeatureScaler {
    /// Divisors below this are treated as zero and replaced by one.
    const MIN_SCALE: f64 = 1e-12;

    pub fn new(kind: ScalerKind) -> Self {
        Self { kind, scale: None }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>) {
        let scale = match self.kind {
            ScalerKind::StdDev => column_std(x),
            ScalerKind::MaxAbs => column_max_abs(x),
        };
        self.scale = Some(scale.mapv(|s| if s < Self::MIN_SCALE { 1.0 } else { s }));
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scale = self
            .scale
            .as_ref()
            .ok_or(ModelError::NotFitted("feature scaler has not been fitted"))?;
        if scale.len() != x.ncols() {
            return Err(ModelError::FeatureMismatch {
                expected: scale.len(),
                actual: x.ncols(),
            });
        }
        Ok(x / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x);
        self.transform(x)
    }
}

/// Population standard deviation of each column.
fn column_std(x: &Array2<f64>) -> Array1<f64> {
    if x.nrows() == 0 {
        return Array1::ones(x.ncols());
    }
    x.std_axis(Axis(0), 0.0)
}

fn column_max_abs(x: &Array2<f64>) -> Array1<f64> {
    x.fold_axis(Axis(0), 0.0f64, |acc, v| acc.max(v.abs()))
}

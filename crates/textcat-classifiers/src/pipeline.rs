//! Feature maps to model-ready matrix: vectorize, then optionally scale, then
//! optionally select.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ScalerKind, SelectorKind};
use crate::error::{ConfigError, ModelError, Result};
use crate::feature_extraction::{DictVectorizer, FeatureMap};
use crate::feature_selection::FeatureSelector;
use crate::preprocessing::FeatureScaler;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    vectorizer: DictVectorizer,
    scaler: Option<FeatureScaler>,
    selector: Option<FeatureSelector>,
}

impl FeaturePipeline {
    pub fn new(scaler: Option<ScalerKind>, selector: Option<SelectorKind>) -> Self {
        Self {
            vectorizer: DictVectorizer::new(),
            scaler: scaler.map(FeatureScaler::new),
            selector: selector.map(FeatureSelector::new),
        }
    }

    pub fn from_config(config: &ModelConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(config.scaler_kind()?, config.selector_kind()?))
    }

    pub fn is_fitted(&self) -> bool {
        self.vectorizer.is_fitted()
    }

    pub fn vectorizer(&self) -> &DictVectorizer {
        &self.vectorizer
    }

    pub fn scaler(&self) -> Option<&FeatureScaler> {
        self.scaler.as_ref()
    }

    pub fn selector(&self) -> Option<&FeatureSelector> {
        self.selector.as_ref()
    }

    /// Width of the matrix handed to the classifier.
    pub fn n_features_out(&self) -> usize {
        match self.selector.as_ref().and_then(FeatureSelector::support) {
            Some(support) => support.len(),
            None => self.vectorizer.n_features(),
        }
    }

    /// Fit every stage on `feature_maps` and return the transformed matrix.
    /// `y` holds class ids and is only consulted by the selector.
    pub fn fit_transform(&mut self, feature_maps: &[FeatureMap], y: &[usize]) -> Result<Array2<f64>> {
        let (x, _) = self.build(feature_maps, Some(y), true)?;
        Ok(x)
    }

    pub fn transform(&self, feature_maps: &[FeatureMap]) -> Result<Array2<f64>> {
        let x = self.vectorizer.transform(feature_maps)?;
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(&x)?,
            None => x,
        };
        match &self.selector {
            Some(selector) => selector.transform(&x),
            None => Ok(x),
        }
    }

    /// Transform `feature_maps`, first fitting every stage when `fit` is set.
    /// In fit mode the labels are handed back alongside the matrix; in
    /// transform mode they are neither needed nor returned.
    pub fn build(
        &mut self,
        feature_maps: &[FeatureMap],
        y: Option<&[usize]>,
        fit: bool,
    ) -> Result<(Array2<f64>, Option<Vec<usize>>)> {
        if !fit {
            return Ok((self.transform(feature_maps)?, None));
        }
        if self.selector.is_some() && y.is_none() {
            return Err(ModelError::MissingLabels);
        }
        if let Some(y) = y {
            if y.len() != feature_maps.len() {
                return Err(ModelError::LengthMismatch {
                    examples: feature_maps.len(),
                    labels: y.len(),
                });
            }
        }

        let x = self.vectorizer.fit_transform(feature_maps)?;
        let x = match &mut self.scaler {
            Some(scaler) => scaler.fit_transform(&x)?,
            None => x,
        };
        let x = match (&mut self.selector, y) {
            (Some(selector), Some(y)) => {
                let n_classes = y.iter().max().map_or(0, |&m| m + 1);
                selector.fit_transform(&x, y, n_classes)?
            }
            _ => x,
        };
        Ok((x, y.map(<[usize]>::to_vec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_pipeline_stages_apply_in_order() {
        let maps = vec![
            features(&[("a", 2.0), ("noise", 1.0)]),
            features(&[("a", 4.0), ("noise", 2.0)]),
            features(&[("b", 3.0), ("noise", 1.0)]),
            features(&[("b", 6.0), ("noise", 2.0)]),
        ];
        let y = vec![0, 0, 1, 1];
        let mut pipeline = FeaturePipeline::new(Some(ScalerKind::MaxAbs), None);
        let x = pipeline.fit_transform(&maps, &y).unwrap();

        assert_eq!(x.shape(), &[4, 3]);
        assert_eq!(x[(1, 0)], 1.0);
        assert_eq!(x[(2, 1)], 0.5);
        assert_eq!(pipeline.transform(&maps).unwrap(), x);
    }

    #[test]
    fn test_selector_needs_labels() {
        let maps = vec![features(&[("a", 1.0)])];
        let mut pipeline = FeaturePipeline::new(None, Some(SelectorKind::FScore));
        assert!(matches!(
            pipeline.build(&maps, None, true),
            Err(ModelError::MissingLabels)
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let pipeline = FeaturePipeline::new(None, None);
        assert!(!pipeline.is_fitted());
        assert!(matches!(
            pipeline.transform(&[FeatureMap::new()]),
            Err(ModelError::NotFitted(_))
        ));
    }
}

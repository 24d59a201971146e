//! Named sparse features and their vectorization.
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ModelError, Result};
use crate::resources::Resources;

/// Sparse named features for a single example.
pub type FeatureMap = HashMap<String, f64>;

/// Derives a feature map from an example. Must be deterministic.
pub trait FeatureExtractor<E>: Send + Sync {
    fn extract(&self, example: &E, resources: &Resources) -> FeatureMap;
}

impl<E, F> FeatureExtractor<E> for F
where
    F: Fn(&E, &Resources) -> FeatureMap + Send + Sync,
{
    fn extract(&self, example: &E, resources: &Resources) -> FeatureMap {
        self(example, resources)
    }
}

/// Turns feature maps into a dense matrix with one column per feature name
/// seen during fitting. Columns are ordered by feature name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DictVectorizer {
    vocabulary: Option<BTreeMap<String, usize>>,
}

impl DictVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.as_ref().map_or(0, BTreeMap::len)
    }

    /// Feature names in column order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.vocabulary
            .as_ref()
            .map(|vocab| vocab.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn fit(&mut self, feature_maps: &[FeatureMap]) {
        let names: BTreeSet<&String> = feature_maps.iter().flat_map(|m| m.keys()).collect();
        let vocabulary = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        self.vocabulary = Some(vocabulary);
    }

    pub fn fit_transform(&mut self, feature_maps: &[FeatureMap]) -> Result<Array2<f64>> {
        self.fit(feature_maps);
        self.transform(feature_maps)
    }

    /// Unseen feature names are ignored.
    pub fn transform(&self, feature_maps: &[FeatureMap]) -> Result<Array2<f64>> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or(ModelError::NotFitted("feature vectorizer has not been fitted"))?;

        let mut x = Array2::zeros((feature_maps.len(), vocabulary.len()));
        for (row, features) in feature_maps.iter().enumerate() {
            for (name, &value) in features {
                if let Some(&col) = vocabulary.get(name) {
                    x[(row, col)] = value;
                }
            }
        }
        Ok(x)
    }
}

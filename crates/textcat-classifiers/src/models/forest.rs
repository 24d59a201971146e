//! Random forest of weighted CART trees, grown in parallel.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError, Result};
use crate::models::classifier_trait::{check_fit_input, sample_weights, ClassifierModel};
use crate::models::tree::{DecisionTree, MaxFeatures, TreeParams};
use crate::params::{ParamReader, ResolvedParams};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub bootstrap: bool,
    /// Shared by every tree. `tree.random_state` seeds the whole forest.
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            bootstrap: true,
            tree: TreeParams {
                max_features: MaxFeatures::Sqrt,
                ..TreeParams::default()
            },
        }
    }
}

impl ForestParams {
    pub fn from_resolved(resolved: &ResolvedParams) -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut reader = ParamReader::new(&resolved.params);
        let n_estimators = reader.usize("n_estimators", defaults.n_estimators)?;
        let bootstrap = reader.bool("bootstrap", defaults.bootstrap)?;
        let tree = TreeParams::read(&mut reader, MaxFeatures::Sqrt, resolved.class_weight.clone())?;
        reader.finish("rforest")?;

        if n_estimators == 0 {
            return Err(ConfigError::invalid_param("n_estimators", "must be at least 1"));
        }
        Ok(Self {
            n_estimators,
            bootstrap,
            tree,
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl ClassifierModel for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;
        let n = y.len();
        let seed = self.params.tree.random_state.unwrap_or_else(rand::random);
        let class_weights = sample_weights(y, self.params.tree.class_weight.as_ref());
        let bootstrap = self.params.bootstrap;
        let tree_params = &self.params.tree;

        let trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let mut weights = class_weights.clone();
                let samples: Vec<usize> = if bootstrap && n > 0 {
                    // Draws with replacement, folded into per-row multiplicities.
                    let mut draws = vec![0usize; n];
                    for _ in 0..n {
                        draws[rng.gen_range(0..n)] += 1;
                    }
                    for (w, &d) in weights.iter_mut().zip(&draws) {
                        *w *= d as f64;
                    }
                    (0..n).filter(|&i| draws[i] > 0).collect()
                } else {
                    (0..n).collect()
                };

                let mut tree = DecisionTree::new(tree_params.clone());
                tree.fit_weighted(x, y, n_classes, samples, &weights, &mut rng)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Grew {} trees", trees.len());
        self.trees = trees;
        self.n_classes = n_classes;
        Ok(())
    }

    /// Mean of the trees' class distributions.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted("random forest has not been fitted"));
        }
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            proba += &tree.predict_proba(x)?;
        }
        Ok(proba / self.trees.len() as f64)
    }

    fn n_classes(&self) -> Option<usize> {
        (!self.trees.is_empty()).then_some(self.n_classes)
    }

    fn name(&self) -> &str {
        "rforest"
    }
}

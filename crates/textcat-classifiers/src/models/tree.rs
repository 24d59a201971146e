//! Weighted CART decision tree.
//!
//! Leaves store the weighted class distribution of the training samples that
//! reached them, so pure leaves predict a probability of exactly zero for the
//! other classes.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ModelError, Result};
use crate::models::classifier_trait::{check_fit_input, check_width, sample_weights, ClassifierModel};
use crate::params::{ClassWeights, ParamReader, ResolvedParams};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|&c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / total;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

/// Number of features considered at each split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    fn parse(value: Option<&Value>, default: MaxFeatures) -> std::result::Result<Self, ConfigError> {
        let invalid = |v: &Value| {
            ConfigError::invalid_param(
                "max_features",
                format!("expected \"sqrt\", \"log2\", \"all\", a count or a fraction, got {}", v),
            )
        };
        let Some(value) = value else {
            return Ok(default);
        };
        if let Some(s) = value.as_str() {
            return match s {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                _ => Err(invalid(value)),
            };
        }
        if let Some(count) = value.as_u64() {
            return if count > 0 {
                Ok(MaxFeatures::Count(count as usize))
            } else {
                Err(invalid(value))
            };
        }
        match value.as_f64() {
            Some(fraction) if fraction > 0.0 && fraction <= 1.0 => Ok(MaxFeatures::Fraction(fraction)),
            _ => Err(invalid(value)),
        }
    }

    /// Concrete feature count for a matrix with `n_features` columns.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::Count(count) => count,
            MaxFeatures::Fraction(fraction) => (fraction * n) as usize,
        };
        count.clamp(1, n_features.max(1))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub random_state: Option<u64>,
    pub class_weight: Option<ClassWeights>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: None,
            class_weight: None,
        }
    }
}

impl TreeParams {
    pub fn from_resolved(resolved: &ResolvedParams) -> std::result::Result<Self, ConfigError> {
        let mut reader = ParamReader::new(&resolved.params);
        let params = Self::read(&mut reader, MaxFeatures::All, resolved.class_weight.clone())?;
        reader.finish("dtree")?;
        Ok(params)
    }

    /// Reads the tree parameters, leaving any others for the caller.
    pub(crate) fn read(
        reader: &mut ParamReader<'_>,
        default_max_features: MaxFeatures,
        class_weight: Option<ClassWeights>,
    ) -> std::result::Result<Self, ConfigError> {
        let defaults = Self::default();
        let criterion = match reader.string("criterion", "gini")?.as_str() {
            "gini" => Criterion::Gini,
            "entropy" => Criterion::Entropy,
            other => {
                return Err(ConfigError::invalid_param(
                    "criterion",
                    format!("expected gini or entropy, got {:?}", other),
                ))
            }
        };
        let max_depth = reader.opt_usize("max_depth")?;
        let min_samples_split = reader.usize("min_samples_split", defaults.min_samples_split)?;
        let min_samples_leaf = reader.usize("min_samples_leaf", defaults.min_samples_leaf)?;
        let max_features = MaxFeatures::parse(reader.value("max_features"), default_max_features)?;
        let random_state = reader.opt_u64("random_state")?;

        if min_samples_split < 2 {
            return Err(ConfigError::invalid_param("min_samples_split", "must be at least 2"));
        }
        if min_samples_leaf < 1 {
            return Err(ConfigError::invalid_param("min_samples_leaf", "must be at least 1"));
        }

        Ok(Self {
            criterion,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features,
            random_state,
            class_weight,
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DecisionTree {
    params: TreeParams,
    root: Option<Node>,
    n_classes: usize,
    n_features: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Borrowed training data for one tree build.
struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    n_try: usize,
    params: &'a TreeParams,
}

impl<'a> Builder<'a> {
    fn class_totals(&self, samples: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &i in samples {
            totals[self.y[i]] += self.weights[i];
        }
        totals
    }

    fn leaf(&self, totals: &[f64]) -> Node {
        let total: f64 = totals.iter().sum();
        let distribution = if total > 0.0 {
            totals.iter().map(|&c| c / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        Node::Leaf { distribution }
    }

    fn build(&self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let totals = self.class_totals(&samples);
        let total: f64 = totals.iter().sum();
        let params = self.params;

        let depth_reached = params.max_depth.map_or(false, |max| depth >= max);
        if depth_reached
            || samples.len() < params.min_samples_split
            || samples.len() < 2 * params.min_samples_leaf
            || total <= 0.0
            || params.criterion.impurity(&totals, total) <= 0.0
        {
            return self.leaf(&totals);
        }

        let Some(split) = self.best_split(&samples, &totals, total, rng) else {
            return self.leaf(&totals);
        };
        log::trace!(
            "depth {} split on feature {} at {:.4} (gain {:.4})",
            depth,
            split.feature,
            split.threshold,
            split.gain
        );

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[(i, split.feature)] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn best_split(&self, samples: &[usize], totals: &[f64], total: f64, rng: &mut StdRng) -> Option<Split> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        if self.n_try < n_features {
            features.shuffle(rng);
        }

        let criterion = self.params.criterion;
        let min_leaf = self.params.min_samples_leaf;
        let parent = criterion.impurity(totals, total);
        let mut best: Option<Split> = None;
        let mut order = samples.to_vec();
        let mut visited = 0;

        // Constant features do not count towards `n_try`.
        for feature in features {
            if visited >= self.n_try {
                break;
            }
            order.sort_by(|&a, &b| {
                self.x[(a, feature)]
                    .partial_cmp(&self.x[(b, feature)])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let (Some(&first), Some(&last)) = (order.first(), order.last()) else {
                break;
            };
            if self.x[(last, feature)] <= self.x[(first, feature)] {
                continue;
            }
            visited += 1;

            let mut left = vec![0.0; self.n_classes];
            let mut left_total = 0.0;
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left[self.y[i]] += self.weights[i];
                left_total += self.weights[i];

                let value = self.x[(i, feature)];
                let next = self.x[(order[pos + 1], feature)];
                if next <= value {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
                let right_total = total - left_total;
                let child = (left_total * criterion.impurity(&left, left_total)
                    + right_total * criterion.impurity(&right, right_total))
                    / total;
                let gain = parent - child;

                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            root: None,
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Grow the tree on `samples` (row indices into `x`, repeats allowed)
    /// with explicit per-row weights.
    pub(crate) fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        samples: Vec<usize>,
        weights: &[f64],
        rng: &mut StdRng,
    ) -> Result<()> {
        check_fit_input(x, y, n_classes)?;
        let builder = Builder {
            x,
            y,
            weights,
            n_classes,
            n_try: self.params.max_features.resolve(x.ncols()),
            params: &self.params,
        };
        let root = builder.build(samples, 0, rng);

        self.root = Some(root);
        self.n_classes = n_classes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn leaf_distribution(&self, row: ArrayView1<f64>) -> Result<&[f64]> {
        let mut node = self
            .root
            .as_ref()
            .ok_or(ModelError::NotFitted("decision tree has not been fitted"))?;
        loop {
            match node {
                Node::Leaf { distribution } => return Ok(distribution.as_slice()),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }
}

impl ClassifierModel for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let weights = sample_weights(y, self.params.class_weight.as_ref());
        let mut rng = match self.params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.fit_weighted(x, y, n_classes, (0..y.len()).collect(), &weights, &mut rng)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.root.is_none() {
            return Err(ModelError::NotFitted("decision tree has not been fitted"));
        }
        check_width(self.n_features, x)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (class, &p) in self.leaf_distribution(row)?.iter().enumerate() {
                proba[(i, class)] = p;
            }
        }
        Ok(proba)
    }

    fn n_classes(&self) -> Option<usize> {
        self.root.as_ref().map(|_| self.n_classes)
    }

    fn name(&self) -> &str {
        "dtree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    #[test]
    fn test_tree_fits_training_data() {
        let x = array![[0.0, 1.0], [0.0, 2.0], [1.0, 1.0], [1.0, 2.0], [2.0, 5.0], [2.0, 6.0]];
        let y = vec![0, 0, 1, 1, 2, 2];
        let mut tree = DecisionTree::new(TreeParams {
            random_state: Some(7),
            ..TreeParams::default()
        });
        tree.fit(&x, &y, 3).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        let proba = tree.predict_proba(&x).unwrap();
        // pure leaves
        assert_eq!(proba[(0, 0)], 1.0);
        assert_eq!(proba[(0, 2)], 0.0);
        assert!(tree.predict_log_proba(&x).unwrap()[(0, 1)].is_infinite());
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = vec![0, 1, 0, 1];
        let mut tree = DecisionTree::new(TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        });
        tree.fit(&x, &y, 2).unwrap();
        assert!(tree.depth() <= 1);
        for row in tree.predict_proba(&x).unwrap().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_class_weight_shifts_leaf_distribution() {
        // identical rows cannot be split
        let x = array![[1.0], [1.0], [1.0]];
        let y = vec![0, 0, 1];
        let mut tree = DecisionTree::new(TreeParams {
            class_weight: Some(ClassWeights::from([(1, 2.0)])),
            ..TreeParams::default()
        });
        tree.fit(&x, &y, 2).unwrap();
        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!((proba[(0, 0)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_parsing() {
        let resolved = ResolvedParams {
            params: [
                ("max_features".to_string(), json!("log2")),
                ("max_depth".to_string(), json!(null)),
            ]
            .into_iter()
            .collect(),
            class_weight: None,
        };
        let params = TreeParams::from_resolved(&resolved).unwrap();
        assert_eq!(params.max_features, MaxFeatures::Log2);
        assert_eq!(params.max_depth, None);
        assert_eq!(MaxFeatures::Sqrt.resolve(100), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);

        let bad = ResolvedParams {
            params: [("n_estimators".to_string(), json!(5))].into_iter().collect(),
            class_weight: None,
        };
        assert!(TreeParams::from_resolved(&bad).is_err());
    }
}

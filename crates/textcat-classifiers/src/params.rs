//! Abstract hyperparameters and their resolution.
//!
//! Configurations describe classifier parameters as a flat `name -> value`
//! map (or `name -> [values]` for a search grid). Two entries get special
//! treatment before the map is handed to a classifier:
//!
//! * `class_weight`: a `label -> weight` mapping. Labels are translated to
//!   class ids.
//! * `class_bias`: a scalar in `[0, 1]` interpolating between uniform weights
//!   (`0`) and balanced weights (`1`). It is replaced by the equivalent
//!   `class_weight`.
//!
//! Everything else passes through untouched and is validated later by the
//! typed parameter structs of each classifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::encoders::ClassEncoder;
use crate::error::{ConfigError, ModelError, Result};

pub const CLASS_WEIGHT: &str = "class_weight";
pub const CLASS_BIAS: &str = "class_bias";

/// Flat `name -> value` parameter set.
pub type ParamMap = BTreeMap<String, Value>;
/// `name -> candidate values` search grid.
pub type ParamGrid = BTreeMap<String, Vec<Value>>;
/// Per-class weights keyed by class id.
pub type ClassWeights = BTreeMap<usize, f64>;

/// A single parameter set with its class weights already in class-id space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub params: ParamMap,
    pub class_weight: Option<ClassWeights>,
}

impl ResolvedParams {
    /// Back to a flat map, with `class_weight` keyed by class id.
    pub fn to_param_map(&self) -> ParamMap {
        let mut map = self.params.clone();
        if let Some(weights) = &self.class_weight {
            let weights = weights
                .iter()
                .map(|(id, w)| (id.to_string(), Value::from(*w)))
                .collect::<serde_json::Map<_, _>>();
            map.insert(CLASS_WEIGHT.to_string(), Value::Object(weights));
        }
        map
    }

    /// Back to a flat map, with `class_weight` keyed by raw label.
    pub fn to_labeled_param_map(&self, encoder: &ClassEncoder) -> Result<ParamMap> {
        let mut map = self.params.clone();
        if let Some(weights) = &self.class_weight {
            let mut labeled = serde_json::Map::new();
            for (&id, &w) in weights {
                let label = encoder
                    .inverse_transform(&[id])?
                    .pop()
                    .ok_or(ModelError::UnknownClass(id))?;
                labeled.insert(label, Value::from(w));
            }
            map.insert(CLASS_WEIGHT.to_string(), Value::Object(labeled));
        }
        Ok(map)
    }
}

/// A search grid with class weights resolved once per candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedGrid {
    pub params: ParamGrid,
    pub class_weight: Option<Vec<ClassWeights>>,
}

impl ResolvedGrid {
    /// Number of candidates in the cartesian product.
    pub fn len(&self) -> usize {
        let weights = self.class_weight.as_ref().map_or(1, Vec::len);
        self.params.values().map(Vec::len).product::<usize>() * weights
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the grid into individual candidates. Order is deterministic:
    /// parameter names in sorted order, class weights varying fastest.
    pub fn candidates(&self) -> Vec<ResolvedParams> {
        let mut candidates = vec![ResolvedParams::default()];
        for (name, values) in &self.params {
            candidates = candidates
                .into_iter()
                .flat_map(|candidate| {
                    values.iter().map(move |value| {
                        let mut next = candidate.clone();
                        next.params.insert(name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        if let Some(options) = &self.class_weight {
            candidates = candidates
                .into_iter()
                .flat_map(|candidate| {
                    options.iter().map(move |weights| ResolvedParams {
                        class_weight: Some(weights.clone()),
                        ..candidate.clone()
                    })
                })
                .collect();
        }
        candidates
    }
}

/// `total / (n_classes * count_c)` for every class. Classes without examples
/// get a neutral weight of one.
pub fn balanced_weights(class_counts: &[usize]) -> Vec<f64> {
    let total: usize = class_counts.iter().sum();
    let n_classes = class_counts.len() as f64;
    class_counts
        .iter()
        .map(|&count| {
            if count == 0 {
                1.0
            } else {
                total as f64 / (n_classes * count as f64)
            }
        })
        .collect()
}

/// `(1 - bias) + bias * balanced_c` for every class.
pub fn interpolated_weights(class_counts: &[usize], bias: f64) -> Vec<f64> {
    balanced_weights(class_counts)
        .into_iter()
        .map(|balanced| (1.0 - bias) + bias * balanced)
        .collect()
}

/// Resolves abstract parameters against a fitted class encoder and the
/// class distribution of the training labels.
#[derive(Debug)]
pub struct ParamResolver<'a> {
    encoder: &'a ClassEncoder,
    class_counts: Vec<usize>,
}

impl<'a> ParamResolver<'a> {
    pub fn new(encoder: &'a ClassEncoder, class_ids: &[usize]) -> Self {
        Self {
            encoder,
            class_counts: encoder.class_counts(class_ids),
        }
    }

    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    /// Resolve a single parameter set used for direct fitting.
    pub fn resolve(&self, params: &ParamMap) -> Result<ResolvedParams> {
        check_exclusive(params.contains_key(CLASS_WEIGHT), params.contains_key(CLASS_BIAS))?;

        let mut params = params.clone();
        let class_weight = if let Some(raw) = params.remove(CLASS_WEIGHT) {
            if raw.is_null() {
                None
            } else {
                Some(self.translate_weights(&raw)?)
            }
        } else if let Some(raw) = params.remove(CLASS_BIAS) {
            Some(self.bias_weights(parse_bias(&raw)?)?)
        } else {
            None
        };

        Ok(ResolvedParams {
            params,
            class_weight,
        })
    }

    /// Resolve a search grid. Each class-weight or class-bias candidate is
    /// resolved separately.
    pub fn resolve_grid(&self, grid: &ParamGrid) -> Result<ResolvedGrid> {
        check_exclusive(grid.contains_key(CLASS_WEIGHT), grid.contains_key(CLASS_BIAS))?;

        let mut params = grid.clone();
        let class_weight = if let Some(raw) = params.remove(CLASS_WEIGHT) {
            Some(
                raw.iter()
                    .map(|weights| self.translate_weights(weights))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else if let Some(raw) = params.remove(CLASS_BIAS) {
            Some(
                raw.iter()
                    .map(|bias| self.bias_weights(parse_bias(bias)?))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            None
        };

        log::trace!(
            "Resolved parameter grid with {} candidate(s)",
            ResolvedGrid {
                params: params.clone(),
                class_weight: class_weight.clone()
            }
            .len()
        );

        Ok(ResolvedGrid {
            params,
            class_weight,
        })
    }

    /// Translate `label -> weight` into `class id -> weight`. Keys that are not
    /// known labels but parse as integers are taken to be class ids already.
    fn translate_weights(&self, raw: &Value) -> Result<ClassWeights> {
        let mapping = raw.as_object().ok_or_else(|| {
            ConfigError::invalid_param(CLASS_WEIGHT, "expected a mapping from label to weight")
        })?;

        let mut weights = ClassWeights::new();
        for (key, value) in mapping {
            let class_id = match self.encoder.class_id(key) {
                Ok(id) => id,
                Err(ModelError::UnknownLabel(_)) => {
                    let id = key
                        .parse::<usize>()
                        .map_err(|_| ModelError::UnknownLabel(key.clone()))?;
                    let n_classes = self.encoder.n_classes();
                    if id >= n_classes {
                        return Err(ConfigError::invalid_param(
                            CLASS_WEIGHT,
                            format!("class id {} is out of range for {} classes", id, n_classes),
                        )
                        .into());
                    }
                    id
                }
                Err(e) => return Err(e),
            };
            let weight = value.as_f64().ok_or_else(|| {
                ConfigError::invalid_param(
                    CLASS_WEIGHT,
                    format!("weight for {:?} must be a number, got {}", key, value),
                )
            })?;
            weights.insert(class_id, weight);
        }
        Ok(weights)
    }

    fn bias_weights(&self, bias: f64) -> Result<ClassWeights> {
        Ok(interpolated_weights(&self.class_counts, bias)
            .into_iter()
            .enumerate()
            .collect())
    }
}

fn check_exclusive(has_weight: bool, has_bias: bool) -> std::result::Result<(), ConfigError> {
    if has_weight && has_bias {
        return Err(ConfigError::invalid_param(
            CLASS_BIAS,
            "class_bias and class_weight cannot both be set",
        ));
    }
    Ok(())
}

fn parse_bias(value: &Value) -> std::result::Result<f64, ConfigError> {
    let bias = value
        .as_f64()
        .ok_or_else(|| ConfigError::invalid_param(CLASS_BIAS, format!("expected a number, got {}", value)))?;
    if !(0.0..=1.0).contains(&bias) {
        return Err(ConfigError::invalid_param(
            CLASS_BIAS,
            format!("must be between 0 and 1, got {}", bias),
        ));
    }
    Ok(bias)
}

/// Reads typed values out of a parameter map, remembering which names were
/// consumed so that leftovers can be reported.
pub(crate) struct ParamReader<'a> {
    params: &'a ParamMap,
    used: BTreeSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(params: &'a ParamMap) -> Self {
        Self {
            params,
            used: BTreeSet::new(),
        }
    }

    /// The raw value, treating JSON `null` as absent.
    pub(crate) fn value(&mut self, name: &str) -> Option<&'a Value> {
        let (key, value) = self.params.get_key_value(name)?;
        self.used.insert(key.as_str());
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    pub(crate) fn f64(&mut self, name: &str, default: f64) -> std::result::Result<f64, ConfigError> {
        match self.value(name) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| ConfigError::invalid_param(name, format!("expected a number, got {}", v))),
        }
    }

    pub(crate) fn positive_f64(&mut self, name: &str, default: f64) -> std::result::Result<f64, ConfigError> {
        let value = self.f64(name, default)?;
        if value > 0.0 && value.is_finite() {
            Ok(value)
        } else {
            Err(ConfigError::invalid_param(name, format!("must be positive, got {}", value)))
        }
    }

    pub(crate) fn opt_usize(&mut self, name: &str) -> std::result::Result<Option<usize>, ConfigError> {
        self.value(name).map(|v| as_usize(name, v)).transpose()
    }

    pub(crate) fn usize(&mut self, name: &str, default: usize) -> std::result::Result<usize, ConfigError> {
        Ok(self.opt_usize(name)?.unwrap_or(default))
    }

    pub(crate) fn opt_u64(&mut self, name: &str) -> std::result::Result<Option<u64>, ConfigError> {
        self.value(name)
            .map(|v| {
                v.as_u64().ok_or_else(|| {
                    ConfigError::invalid_param(name, format!("expected a non-negative integer, got {}", v))
                })
            })
            .transpose()
    }

    pub(crate) fn bool(&mut self, name: &str, default: bool) -> std::result::Result<bool, ConfigError> {
        match self.value(name) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| ConfigError::invalid_param(name, format!("expected a boolean, got {}", v))),
        }
    }

    pub(crate) fn string(&mut self, name: &str, default: &str) -> std::result::Result<String, ConfigError> {
        match self.value(name) {
            None => Ok(default.to_string()),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ConfigError::invalid_param(name, format!("expected a string, got {}", v))),
        }
    }

    /// Fails on any parameter name that was never read.
    pub(crate) fn finish(self, classifier: &str) -> std::result::Result<(), ConfigError> {
        match self
            .params
            .keys()
            .find(|name| !self.used.contains(name.as_str()))
        {
            Some(name) => Err(ConfigError::invalid_param(
                name,
                format!("not a parameter of the {} classifier", classifier),
            )),
            None => Ok(()),
        }
    }
}

fn as_usize(name: &str, value: &Value) -> std::result::Result<usize, ConfigError> {
    if let Some(v) = value.as_u64() {
        return Ok(v as usize);
    }
    match value.as_f64() {
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        _ => Err(ConfigError::invalid_param(
            name,
            format!("expected a non-negative integer, got {}", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fitted_encoder(labels: &[&str]) -> (ClassEncoder, Vec<usize>) {
        let raw: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let mut encoder = ClassEncoder::new();
        let ids = encoder.fit_transform(&raw).unwrap();
        (encoder, ids)
    }

    #[test]
    fn test_interpolated_weights_three_to_one() {
        let weights = interpolated_weights(&[3, 1], 0.5);
        let balanced = balanced_weights(&[3, 1]);
        assert!((balanced[0] - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(balanced[1], 2.0);
        assert!((weights[0] - 0.8333333333).abs() < 1e-6);
        assert!((weights[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_bias_extremes() {
        for counts in [vec![3usize, 1], vec![5, 2, 9], vec![1, 1, 1, 7]] {
            assert!(interpolated_weights(&counts, 0.0).iter().all(|&w| w == 1.0));
            assert_eq!(interpolated_weights(&counts, 1.0), balanced_weights(&counts));
        }
    }

    #[test]
    fn test_class_bias_replaced_by_class_weight() {
        let (encoder, ids) = fitted_encoder(&["a", "a", "a", "b"]);
        let resolver = ParamResolver::new(&encoder, &ids);
        let params = ParamMap::from([
            ("class_bias".to_string(), json!(0.5)),
            ("C".to_string(), json!(10)),
        ]);
        let resolved = resolver.resolve(&params).unwrap();

        assert!(!resolved.params.contains_key(CLASS_BIAS));
        assert_eq!(resolved.params.get("C"), Some(&json!(10)));
        let weights = resolved.class_weight.unwrap();
        assert!((weights[&0] - 0.8333333333).abs() < 1e-6);
        assert!((weights[&1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_class_weight_labels_translated() {
        let (encoder, ids) = fitted_encoder(&["weather", "greet", "exit"]);
        let resolver = ParamResolver::new(&encoder, &ids);
        let params = ParamMap::from([(
            "class_weight".to_string(),
            json!({"weather": 2.0, "1": 3.5}),
        )]);
        let weights = resolver.resolve(&params).unwrap().class_weight.unwrap();
        // weather is class 2, "1" is not a label so it is taken as a class id
        assert_eq!(weights, ClassWeights::from([(2, 2.0), (1, 3.5)]));
    }

    #[test]
    fn test_unknown_class_weight_label() {
        let (encoder, ids) = fitted_encoder(&["a", "b"]);
        let resolver = ParamResolver::new(&encoder, &ids);
        let params = ParamMap::from([("class_weight".to_string(), json!({"zzz": 1.0}))]);
        assert!(matches!(resolver.resolve(&params), Err(ModelError::UnknownLabel(_))));
    }

    #[test]
    fn test_class_weight_id_out_of_range() {
        let (encoder, ids) = fitted_encoder(&["g", "e"]);
        let resolver = ParamResolver::new(&encoder, &ids);

        let params = ParamMap::from([("class_weight".to_string(), json!({"7": 5.0}))]);
        let err = resolver.resolve(&params).unwrap_err();
        assert!(err.is_config_error());

        let grid = ParamGrid::from([("class_weight".to_string(), vec![json!({"7": 5.0})])]);
        assert!(resolver.resolve_grid(&grid).unwrap_err().is_config_error());

        let params = ParamMap::from([("class_weight".to_string(), json!({"1": 5.0}))]);
        assert_eq!(
            resolver.resolve(&params).unwrap().class_weight,
            Some(ClassWeights::from([(1, 5.0)]))
        );
    }

    #[test]
    fn test_grid_resolves_each_bias() {
        let (encoder, ids) = fitted_encoder(&["a", "a", "a", "b"]);
        let resolver = ParamResolver::new(&encoder, &ids);
        let grid = ParamGrid::from([
            ("class_bias".to_string(), vec![json!(0.0), json!(1.0)]),
            ("C".to_string(), vec![json!(1), json!(10), json!(100)]),
        ]);
        let resolved = resolver.resolve_grid(&grid).unwrap();
        let options = resolved.class_weight.as_ref().unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0], ClassWeights::from([(0, 1.0), (1, 1.0)]));
        assert_eq!(options[1][&1], 2.0);
        assert_eq!(resolved.len(), 6);
        assert_eq!(resolved.candidates().len(), 6);
    }

    #[test]
    fn test_bias_out_of_range_and_exclusive() {
        let (encoder, ids) = fitted_encoder(&["a", "b"]);
        let resolver = ParamResolver::new(&encoder, &ids);

        let params = ParamMap::from([("class_bias".to_string(), json!(1.5))]);
        assert!(matches!(resolver.resolve(&params), Err(ModelError::Config(_))));

        let params = ParamMap::from([
            ("class_bias".to_string(), json!(0.5)),
            ("class_weight".to_string(), json!({"a": 1.0})),
        ]);
        assert!(matches!(resolver.resolve(&params), Err(ModelError::Config(_))));
    }

    #[test]
    fn test_labeled_param_map_round_trips() {
        let (encoder, ids) = fitted_encoder(&["x", "y", "y"]);
        let resolver = ParamResolver::new(&encoder, &ids);
        let params = ParamMap::from([("class_weight".to_string(), json!({"y": 4.0}))]);
        let resolved = resolver.resolve(&params).unwrap();

        let labeled = resolved.to_labeled_param_map(&encoder).unwrap();
        assert_eq!(labeled, params);
        assert_eq!(resolver.resolve(&labeled).unwrap(), resolved);
    }

    #[test]
    fn test_param_reader_rejects_unknown_names() {
        let params = ParamMap::from([
            ("C".to_string(), json!(2.0)),
            ("gamma".to_string(), json!(0.1)),
        ]);
        let mut reader = ParamReader::new(&params);
        assert_eq!(reader.positive_f64("C", 1.0).unwrap(), 2.0);
        let err = reader.finish("logreg").unwrap_err();
        assert!(err.to_string().contains("gamma"));
    }
}

//! The text model: trains a configured classifier on feature maps extracted
//! from examples, serves label predictions, and persists its fitted state.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::{ModelConfig, ParamSelection};
use crate::encoders::{ClassEncoder, LabelEncoder, StringLabelEncoder};
use crate::error::{ConfigError, ModelError, Result};
use crate::evaluation::{EvaluatedExample, ModelEvaluation};
use crate::feature_extraction::{FeatureExtractor, FeatureMap};
use crate::model_selection::{GridSearch, ParamSearch};
use crate::models::factory::build_seeded;
use crate::models::{Classifier, ClassifierModel};
use crate::params::{ParamMap, ParamResolver};
use crate::pipeline::FeaturePipeline;
use crate::resources::{PersistedResources, Resources};

/// Stand-in for negative infinity in log-probabilities, which JSON cannot
/// represent.
pub const NEG_INF_SENTINEL: f64 = -1e10;

/// Everything learned by a successful training call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub class_encoder: ClassEncoder,
    pub pipeline: FeaturePipeline,
    pub classifier: Classifier,
    /// Parameters the classifier was trained with.
    pub current_params: Option<ParamMap>,
    /// Cross-validation score of the selected parameters, if a search ran.
    pub cv_score: Option<f64>,
}

/// Serializable snapshot of a [`TextModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTextModel {
    pub config: ModelConfig,
    pub state: Option<FittedState>,
    #[serde(default)]
    pub resources: PersistedResources,
}

/// A predicted label with the probability of every class.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<L> {
    pub label: L,
    /// `(label, probability)` in class-id order.
    pub probabilities: Vec<(L, f64)>,
}

impl<L: PartialEq> Prediction<L> {
    pub fn probability(&self, label: &L) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }
}

/// Class encoder, pipeline and matrix built from one training set.
struct Prepared {
    class_encoder: ClassEncoder,
    pipeline: FeaturePipeline,
    x: Array2<f64>,
    y: Vec<usize>,
}

pub struct TextModel<E, L = String> {
    config: ModelConfig,
    extractor: Box<dyn FeatureExtractor<E>>,
    label_encoder: Box<dyn LabelEncoder<L>>,
    searcher: Box<dyn ParamSearch>,
    resources: Resources,
    rng: StdRng,
    state: Option<FittedState>,
}

impl<E> TextModel<E, String> {
    pub fn with_string_labels(config: ModelConfig, extractor: impl FeatureExtractor<E> + 'static) -> Self {
        Self::new(config, extractor, StringLabelEncoder)
    }
}

impl<E, L: Clone> TextModel<E, L> {
    pub fn new(
        config: ModelConfig,
        extractor: impl FeatureExtractor<E> + 'static,
        label_encoder: impl LabelEncoder<L> + 'static,
    ) -> Self {
        let rng = seeded_rng(&config);
        Self {
            config,
            extractor: Box::new(extractor),
            label_encoder: Box::new(label_encoder),
            searcher: Box::new(GridSearch),
            resources: Resources::new(),
            rng,
            state: None,
        }
    }

    /// Replace the parameter search strategy.
    pub fn with_search(mut self, searcher: impl ParamSearch + 'static) -> Self {
        self.searcher = Box::new(searcher);
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn fitted_state(&self) -> Option<&FittedState> {
        self.state.as_ref()
    }

    pub fn current_params(&self) -> Option<&ParamMap> {
        self.state.as_ref().and_then(|s| s.current_params.as_ref())
    }

    pub fn cv_score(&self) -> Option<f64> {
        self.state.as_ref().and_then(|s| s.cv_score)
    }

    /// The configuration as actually trained: fixed params replaced by the
    /// params of the fitted state, parameter selection removed.
    pub fn effective_config(&self) -> ModelConfig {
        let mut config = self.config.clone();
        config.params = self.current_params().cloned();
        config.param_selection = None;
        config
    }

    /// Train on `examples`, using the model's own random source for shuffling.
    pub fn fit(&mut self, examples: &[E], labels: &[L], params: Option<ParamMap>) -> Result<()> {
        let mut rng = self.rng.clone();
        let result = self.fit_with_rng(examples, labels, params, &mut rng);
        self.rng = rng;
        result
    }

    /// Train on `examples`.
    ///
    /// Explicit `params` (or configured fixed params, or the absence of
    /// parameter selection settings) fit the classifier directly; otherwise
    /// the configured grid is searched. Fewer than two distinct labels leave
    /// the model untouched.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &mut self,
        examples: &[E],
        labels: &[L],
        params: Option<ParamMap>,
        rng: &mut R,
    ) -> Result<()> {
        let kind = self.config.validate()?;
        check_lengths(examples.len(), labels.len())?;

        let mut order: Vec<usize> = (0..examples.len()).collect();
        order.shuffle(rng);
        let examples: Vec<&E> = order.iter().map(|&i| &examples[i]).collect();
        let labels: Vec<L> = order.iter().map(|&i| labels[i].clone()).collect();

        let raw_labels = self.label_encoder.encode(&labels);
        let n_distinct = count_distinct(&raw_labels);
        if n_distinct <= 1 {
            log::warn!(
                "Not training {} model: need at least two distinct labels, got {}",
                kind,
                n_distinct
            );
            return Ok(());
        }

        let seed: u64 = rng.gen();
        let params = params.or_else(|| self.config.params.clone());
        let prepared = self.prepare(&examples, &raw_labels)?;
        let n_classes = prepared.class_encoder.n_classes();
        log::info!(
            "Training {} model on {} examples, {} classes, {} features",
            kind,
            prepared.y.len(),
            n_classes,
            prepared.x.ncols()
        );

        let state = match (params, &self.config.param_selection) {
            (None, Some(selection)) => {
                let resolver = ParamResolver::new(&prepared.class_encoder, &prepared.y);
                let grid = resolver.resolve_grid(&selection.grid)?;
                let groups: Vec<usize> = (0..prepared.y.len()).collect();
                let outcome = self.searcher.search(
                    kind,
                    &prepared.x,
                    &prepared.y,
                    &groups,
                    n_classes,
                    &grid,
                    selection,
                    seed,
                )?;
                let current_params = outcome.params.to_labeled_param_map(&prepared.class_encoder)?;
                FittedState {
                    class_encoder: prepared.class_encoder,
                    pipeline: prepared.pipeline,
                    classifier: outcome.classifier,
                    current_params: Some(current_params),
                    cv_score: Some(outcome.score),
                }
            }
            (params, _) => {
                let params = params.unwrap_or_default();
                let resolver = ParamResolver::new(&prepared.class_encoder, &prepared.y);
                let resolved = resolver.resolve(&params)?;
                let mut classifier = build_seeded(kind, &resolved, seed)?;
                classifier.fit(&prepared.x, &prepared.y, n_classes)?;
                FittedState {
                    class_encoder: prepared.class_encoder,
                    pipeline: prepared.pipeline,
                    classifier,
                    current_params: Some(params),
                    cv_score: None,
                }
            }
        };

        self.state = Some(state);
        Ok(())
    }

    /// Run only the parameter search and adopt its winner. `selection`
    /// defaults to the configured settings. Returns the winning parameters.
    pub fn select_params(
        &mut self,
        examples: &[E],
        labels: &[L],
        selection: Option<ParamSelection>,
    ) -> Result<ParamMap> {
        let kind = self.config.validate()?;
        let selection = selection
            .or_else(|| self.config.param_selection.clone())
            .ok_or_else(|| ConfigError::InvalidSelection("no parameter selection settings given".to_string()))?;
        selection.validate()?;
        check_lengths(examples.len(), labels.len())?;

        let raw_labels = self.label_encoder.encode(labels);
        let n_distinct = count_distinct(&raw_labels);
        if n_distinct <= 1 {
            return Err(ModelError::DegenerateLabels(n_distinct));
        }

        let seed: u64 = self.rng.gen();
        let examples: Vec<&E> = examples.iter().collect();
        let prepared = self.prepare(&examples, &raw_labels)?;
        let n_classes = prepared.class_encoder.n_classes();
        let resolver = ParamResolver::new(&prepared.class_encoder, &prepared.y);
        let grid = resolver.resolve_grid(&selection.grid)?;
        let groups: Vec<usize> = (0..prepared.y.len()).collect();
        let outcome = self.searcher.search(
            kind,
            &prepared.x,
            &prepared.y,
            &groups,
            n_classes,
            &grid,
            &selection,
            seed,
        )?;
        let selected = outcome.params.to_labeled_param_map(&prepared.class_encoder)?;

        let current_params = self.state.as_ref().and_then(|s| s.current_params.clone());
        self.state = Some(FittedState {
            class_encoder: prepared.class_encoder,
            pipeline: prepared.pipeline,
            classifier: outcome.classifier,
            current_params,
            cv_score: Some(outcome.score),
        });
        Ok(selected)
    }

    pub fn predict(&self, examples: &[E]) -> Result<Vec<L>> {
        let state = self.fitted()?;
        let x = self.transform(state, examples)?;
        let class_ids = state.classifier.predict(&x)?;
        let raw_labels = state.class_encoder.inverse_transform(&class_ids)?;
        Ok(self.label_encoder.decode(&raw_labels))
    }

    pub fn predict_proba(&self, examples: &[E]) -> Result<Vec<Prediction<L>>> {
        let state = self.fitted()?;
        let x = self.transform(state, examples)?;
        let proba = state.classifier.predict_proba(&x)?;
        self.decode_rows(state, &proba)
    }

    /// Like [`predict_proba`](Self::predict_proba) with log-probabilities;
    /// negative infinity is replaced by [`NEG_INF_SENTINEL`].
    pub fn predict_log_proba(&self, examples: &[E]) -> Result<Vec<Prediction<L>>> {
        let state = self.fitted()?;
        let x = self.transform(state, examples)?;
        let log_proba = state
            .classifier
            .predict_log_proba(&x)?
            .mapv(|v| if v == f64::NEG_INFINITY { NEG_INF_SENTINEL } else { v });
        self.decode_rows(state, &log_proba)
    }

    pub fn evaluate(&self, examples: &[E], labels: &[L]) -> Result<ModelEvaluation<E, L>>
    where
        E: Clone,
        L: PartialEq,
    {
        check_lengths(examples.len(), labels.len())?;
        let predictions = self.predict_proba(examples)?;
        let config = self.effective_config();
        let label_type = config.label_type;

        let results = examples
            .iter()
            .zip(labels)
            .zip(predictions)
            .map(|((example, expected), prediction)| EvaluatedExample {
                example: example.clone(),
                expected: expected.clone(),
                predicted: prediction.label,
                probabilities: prediction.probabilities,
                label_type,
            })
            .collect();
        Ok(ModelEvaluation::new(config, results))
    }

    pub fn to_serialized(&self) -> SerializedTextModel {
        SerializedTextModel {
            config: self.config.clone(),
            state: self.state.clone(),
            resources: PersistedResources::from(&self.resources),
        }
    }

    /// Rebuild a model from a snapshot. The collaborators are not part of the
    /// snapshot and must be supplied again.
    pub fn from_serialized(
        serialized: SerializedTextModel,
        extractor: impl FeatureExtractor<E> + 'static,
        label_encoder: impl LabelEncoder<L> + 'static,
    ) -> Self {
        let mut model = Self::new(serialized.config, extractor, label_encoder);
        model.resources = Resources::from(serialized.resources);
        model.state = serialized.state;
        model
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_serialized())?)
    }

    pub fn from_json(
        json: &str,
        extractor: impl FeatureExtractor<E> + 'static,
        label_encoder: impl LabelEncoder<L> + 'static,
    ) -> Result<Self> {
        let serialized: SerializedTextModel = serde_json::from_str(json)?;
        Ok(Self::from_serialized(serialized, extractor, label_encoder))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, &self.to_serialized())?;
        log::info!("Saved model to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
        extractor: impl FeatureExtractor<E> + 'static,
        label_encoder: impl LabelEncoder<L> + 'static,
    ) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let serialized: SerializedTextModel = serde_json::from_reader(reader)?;
        log::debug!("Loaded model from {}", path.as_ref().display());
        Ok(Self::from_serialized(serialized, extractor, label_encoder))
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state
            .as_ref()
            .ok_or(ModelError::NotFitted("text model has not been fitted"))
    }

    fn extract<'a>(&self, examples: impl IntoIterator<Item = &'a E>) -> Vec<FeatureMap>
    where
        E: 'a,
    {
        examples
            .into_iter()
            .map(|example| self.extractor.extract(example, &self.resources))
            .collect()
    }

    fn prepare(&self, examples: &[&E], raw_labels: &[String]) -> Result<Prepared> {
        let mut class_encoder = ClassEncoder::new();
        let y = class_encoder.fit_transform(raw_labels)?;
        let feature_maps = self.extract(examples.iter().copied());
        let mut pipeline = FeaturePipeline::from_config(&self.config)?;
        let (x, _) = pipeline.build(&feature_maps, Some(&y), true)?;
        Ok(Prepared {
            class_encoder,
            pipeline,
            x,
            y,
        })
    }

    fn transform(&self, state: &FittedState, examples: &[E]) -> Result<Array2<f64>> {
        let feature_maps = self.extract(examples);
        state.pipeline.transform(&feature_maps)
    }

    /// Pair every column with its label and pick the top label per row. The
    /// first column wins on exact ties.
    fn decode_rows(&self, state: &FittedState, scores: &Array2<f64>) -> Result<Vec<Prediction<L>>> {
        let class_ids: Vec<usize> = (0..scores.ncols()).collect();
        let raw_labels = state.class_encoder.inverse_transform(&class_ids)?;
        let labels = self.label_encoder.decode(&raw_labels);

        scores
            .rows()
            .into_iter()
            .map(|row| {
                let mut best: Option<(usize, f64)> = None;
                let probabilities: Vec<(L, f64)> = row
                    .iter()
                    .enumerate()
                    .map(|(idx, &p)| {
                        if best.map_or(true, |(_, b)| p > b) {
                            best = Some((idx, p));
                        }
                        (labels[idx].clone(), p)
                    })
                    .collect();
                let (top, _) = best.ok_or(ModelError::NotFitted("classifier produced no classes"))?;
                Ok(Prediction {
                    label: labels[top].clone(),
                    probabilities,
                })
            })
            .collect()
    }
}

fn seeded_rng(config: &ModelConfig) -> StdRng {
    match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn check_lengths(examples: usize, labels: usize) -> Result<()> {
    if examples != labels {
        return Err(ModelError::LengthMismatch { examples, labels });
    }
    Ok(())
}

fn count_distinct(raw_labels: &[String]) -> usize {
    raw_labels.iter().collect::<BTreeSet<_>>().len()
}

//! Per-example evaluation records and their aggregate.
use std::collections::BTreeMap;

use crate::config::{LabelType, ModelConfig};

/// The outcome of predicting one labeled example.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedExample<E, L> {
    pub example: E,
    pub expected: L,
    pub predicted: L,
    /// Probability of every class, in class-id order.
    pub probabilities: Vec<(L, f64)>,
    pub label_type: LabelType,
}

impl<E, L: PartialEq> EvaluatedExample<E, L> {
    pub fn is_correct(&self) -> bool {
        self.expected == self.predicted
    }

    /// Probability the model gave to the expected label.
    pub fn expected_probability(&self) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(label, _)| *label == self.expected)
            .map(|(_, p)| *p)
    }
}

/// All evaluated examples of a test set, with the configuration the model
/// was effectively trained with.
#[derive(Debug, Clone)]
pub struct ModelEvaluation<E, L> {
    pub config: ModelConfig,
    pub results: Vec<EvaluatedExample<E, L>>,
}

impl<E, L: PartialEq> ModelEvaluation<E, L> {
    pub fn new(config: ModelConfig, results: Vec<EvaluatedExample<E, L>>) -> Self {
        Self { config, results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn correct_results(&self) -> impl Iterator<Item = &EvaluatedExample<E, L>> {
        self.results.iter().filter(|r| r.is_correct())
    }

    pub fn incorrect_results(&self) -> impl Iterator<Item = &EvaluatedExample<E, L>> {
        self.results.iter().filter(|r| !r.is_correct())
    }

    /// Fraction of correct predictions; `None` for an empty evaluation.
    pub fn accuracy(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        Some(self.correct_results().count() as f64 / self.results.len() as f64)
    }
}

impl<E, L: Ord + Clone> ModelEvaluation<E, L> {
    /// `(expected, predicted) -> count`.
    pub fn confusion_counts(&self) -> BTreeMap<(L, L), usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts
                .entry((result.expected.clone(), result.predicted.clone()))
                .or_insert(0) += 1;
        }
        counts
    }
}

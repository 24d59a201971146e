//! Label and class encoders.
//!
//! A [`LabelEncoder`] maps application-facing labels to canonical raw label
//! strings and back. The [`ClassEncoder`] maps raw label strings to the dense
//! class ids the classifiers work with.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ModelError, Result};

/// Translates between application labels and raw label strings.
///
/// Implementations must be a pure bijection: `decode(encode(x)) == x`.
pub trait LabelEncoder<L>: Send + Sync {
    fn encode(&self, labels: &[L]) -> Vec<String>;

    fn decode(&self, raw_labels: &[String]) -> Vec<L>;
}

/// Identity encoder for models whose labels already are strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLabelEncoder;

impl LabelEncoder<String> for StringLabelEncoder {
    fn encode(&self, labels: &[String]) -> Vec<String> {
        labels.to_vec()
    }

    fn decode(&self, raw_labels: &[String]) -> Vec<String> {
        raw_labels.to_vec()
    }
}

/// Maps raw label strings to class ids `0..n_classes`, in sorted label order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassEncoder {
    classes: Option<Vec<String>>,
}

impl ClassEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.classes.is_some()
    }

    /// The learned classes, indexed by class id.
    pub fn classes(&self) -> Result<&[String]> {
        self.classes
            .as_deref()
            .ok_or(ModelError::NotFitted("class encoder has not been fitted"))
    }

    pub fn n_classes(&self) -> usize {
        self.classes.as_ref().map_or(0, Vec::len)
    }

    pub fn fit(&mut self, raw_labels: &[String]) {
        let classes: BTreeSet<&String> = raw_labels.iter().collect();
        self.classes = Some(classes.into_iter().cloned().collect());
    }

    pub fn fit_transform(&mut self, raw_labels: &[String]) -> Result<Vec<usize>> {
        self.fit(raw_labels);
        self.transform(raw_labels)
    }

    pub fn transform(&self, raw_labels: &[String]) -> Result<Vec<usize>> {
        raw_labels.iter().map(|label| self.class_id(label)).collect()
    }

    pub fn class_id(&self, raw_label: &str) -> Result<usize> {
        let classes = self.classes()?;
        classes
            .binary_search_by(|class| class.as_str().cmp(raw_label))
            .map_err(|_| ModelError::UnknownLabel(raw_label.to_string()))
    }

    pub fn inverse_transform(&self, class_ids: &[usize]) -> Result<Vec<String>> {
        let classes = self.classes()?;
        class_ids
            .iter()
            .map(|&id| {
                classes
                    .get(id)
                    .cloned()
                    .ok_or(ModelError::UnknownClass(id))
            })
            .collect()
    }

    /// Number of occurrences of each class id in `class_ids`.
    pub fn class_counts(&self, class_ids: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes()];
        for &id in class_ids {
            if let Some(count) = counts.get_mut(id) {
                *count += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_class_encoder_sorts_classes() {
        let mut encoder = ClassEncoder::new();
        let ids = encoder
            .fit_transform(&raw(&["weather", "greet", "weather", "exit"]))
            .unwrap();

        assert_eq!(encoder.classes().unwrap(), raw(&["exit", "greet", "weather"]).as_slice());
        assert_eq!(ids, vec![2, 1, 2, 0]);
        assert_eq!(encoder.class_counts(&ids), vec![1, 1, 2]);
    }

    #[test]
    fn test_inverse_transform_round_trips() {
        let mut encoder = ClassEncoder::new();
        let labels = raw(&["b", "a", "c"]);
        let ids = encoder.fit_transform(&labels).unwrap();
        assert_eq!(encoder.inverse_transform(&ids).unwrap(), labels);
    }

    #[test]
    fn test_unfitted_encoder_is_a_usage_error() {
        let encoder = ClassEncoder::new();
        assert!(matches!(
            encoder.inverse_transform(&[0]),
            Err(ModelError::NotFitted(_))
        ));
        assert!(matches!(encoder.transform(&raw(&["a"])), Err(ModelError::NotFitted(_))));
    }

    #[test]
    fn test_unknown_label_and_class() {
        let mut encoder = ClassEncoder::new();
        encoder.fit(&raw(&["a", "b"]));
        assert!(matches!(encoder.class_id("z"), Err(ModelError::UnknownLabel(_))));
        assert!(matches!(
            encoder.inverse_transform(&[5]),
            Err(ModelError::UnknownClass(5))
        ));
    }
}

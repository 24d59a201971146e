use anyhow::{Context, Result};

use textcat_classifiers::TextModel;

use crate::classify::features::{build_resources, NgramExtractor};
use crate::classify::load_data::{load_text_records, split_labeled};
use crate::classify::model_file::save_model;

use super::input::TrainConfig;

/// Accuracies reported after training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub n_examples: usize,
    pub n_classes: usize,
    pub cv_score: Option<f64>,
    pub train_accuracy: Option<f64>,
    pub validation_accuracy: Option<f64>,
}

pub fn run_training(config: &TrainConfig) -> Result<TrainSummary> {
    let classifier = config.model.validate()?;
    log::info!("Training a {} text model", classifier);

    let records = load_text_records(&config.train_data, true)
        .context("Failed to load training data")?;
    let (texts, labels) = split_labeled(records);
    log::info!("Loaded {} training examples", texts.len());

    let validation = match &config.validation_data {
        Some(path) => {
            let records = load_text_records(path, true).context("Failed to load validation data")?;
            log::info!("Loaded {} validation examples", records.len());
            Some(split_labeled(records))
        }
        None => {
            log::warn!("No validation data provided.");
            None
        }
    };

    let resources = build_resources(&texts);
    let mut model = TextModel::with_string_labels(
        config.model.clone(),
        NgramExtractor::new(config.features.clone()),
    )
    .with_resources(resources);

    model.fit(&texts, &labels, None)?;
    let state = match model.fitted_state() {
        Some(state) => state,
        None => anyhow::bail!("Training data needs at least two distinct labels; no model was written"),
    };
    let n_classes = state.class_encoder.n_classes();

    if let Some(params) = model.current_params() {
        log::info!("Trained with params: {}", serde_json::to_string(params)?);
    }
    if let Some(score) = model.cv_score() {
        log::info!("Cross-validation score: {:.4}", score);
    }

    let train_accuracy = model.evaluate(&texts, &labels)?.accuracy();
    if let Some(accuracy) = train_accuracy {
        log::info!("Training accuracy: {:.4}", accuracy);
    }

    let validation_accuracy = match &validation {
        Some((val_texts, val_labels)) => {
            let accuracy = model.evaluate(val_texts, val_labels)?.accuracy();
            if let Some(accuracy) = accuracy {
                log::info!("Validation accuracy: {:.4}", accuracy);
            }
            accuracy
        }
        None => None,
    };

    save_model(&model, &config.features, &config.output_file)?;

    Ok(TrainSummary {
        n_examples: texts.len(),
        n_classes,
        cv_score: model.cv_score(),
        train_accuracy,
        validation_accuracy,
    })
}

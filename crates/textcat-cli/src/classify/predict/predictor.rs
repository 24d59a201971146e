use anyhow::{Context, Result};

use textcat_classifiers::evaluation::ModelEvaluation;
use textcat_classifiers::Prediction;

use crate::classify::load_data::{load_text_records, split_labeled};
use crate::classify::model_file::load_model;

use super::input::PredictConfig;
use super::output::{open_output, write_evaluation, write_predictions};

pub fn run_prediction(config: &PredictConfig) -> Result<Vec<Prediction<String>>> {
    let model = load_model(&config.model_path)?;

    let texts: Vec<String> = load_text_records(&config.data, false)
        .context("Failed to load prediction data")?
        .into_iter()
        .map(|record| record.text)
        .collect();
    log::info!("Predicting labels for {} texts", texts.len());

    let predictions = model.predict_proba(&texts)?;

    let (writer, delimiter) = open_output(config.output_file.as_deref())?;
    write_predictions(writer, delimiter, &texts, &predictions)?;
    if let Some(path) = &config.output_file {
        log::info!("Wrote predictions to {:?}", path);
    }
    Ok(predictions)
}

pub fn run_evaluation(config: &PredictConfig) -> Result<ModelEvaluation<String, String>> {
    let model = load_model(&config.model_path)?;

    let records = load_text_records(&config.data, true).context("Failed to load evaluation data")?;
    let (texts, labels) = split_labeled(records);

    let evaluation = model.evaluate(&texts, &labels)?;
    match evaluation.accuracy() {
        Some(accuracy) => log::info!(
            "Accuracy: {:.4} ({} of {} correct)",
            accuracy,
            evaluation.correct_results().count(),
            evaluation.len()
        ),
        None => log::warn!("Evaluation data is empty"),
    }
    for ((expected, predicted), count) in evaluation.confusion_counts() {
        if expected != predicted {
            log::debug!("{} predicted as {}: {}", expected, predicted, count);
        }
    }

    if let Some(path) = &config.output_file {
        let (writer, delimiter) = open_output(Some(path))?;
        write_evaluation(writer, delimiter, &evaluation)?;
        log::info!("Wrote evaluation results to {:?}", path);
    }
    Ok(evaluation)
}

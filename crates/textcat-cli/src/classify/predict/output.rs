use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use textcat_classifiers::evaluation::ModelEvaluation;
use textcat_classifiers::Prediction;

use crate::classify::util::delimiter_for;

/// Open `path` for writing, or stdout when no path is given. The delimiter
/// follows the file extension; stdout gets tabs.
pub fn open_output(path: Option<&Path>) -> Result<(Box<dyn Write>, u8)> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Ok((Box::new(BufWriter::new(file)), delimiter_for(path)))
        }
        None => Ok((Box::new(io::stdout().lock()), b'\t')),
    }
}

/// One row per text: the text, the predicted label, its probability, then one
/// `p_<label>` column per class.
pub fn write_predictions<W: Write>(
    writer: W,
    delimiter: u8,
    texts: &[String],
    predictions: &[Prediction<String>],
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let classes: Vec<&String> = predictions
        .first()
        .map(|p| p.probabilities.iter().map(|(label, _)| label).collect())
        .unwrap_or_default();

    let mut header = vec!["text".to_string(), "label".to_string(), "probability".to_string()];
    header.extend(classes.iter().map(|class| format!("p_{}", class)));
    writer.write_record(&header)?;

    for (text, prediction) in texts.iter().zip(predictions) {
        let mut row = vec![
            text.clone(),
            prediction.label.clone(),
            format_probability(prediction.probability(&prediction.label).unwrap_or(0.0)),
        ];
        row.extend(prediction.probabilities.iter().map(|(_, p)| format_probability(*p)));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// One row per evaluated example.
pub fn write_evaluation<W: Write>(
    writer: W,
    delimiter: u8,
    evaluation: &ModelEvaluation<String, String>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    writer.write_record(["text", "expected", "predicted", "expected_probability", "correct"])?;
    for result in &evaluation.results {
        let expected_probability = result
            .expected_probability()
            .map_or(String::new(), format_probability);
        writer.write_record([
            result.example.as_str(),
            result.expected.as_str(),
            result.predicted.as_str(),
            expected_probability.as_str(),
            if result.is_correct() { "true" } else { "false" },
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn format_probability(p: f64) -> String {
    format!("{:.4}", p)
}

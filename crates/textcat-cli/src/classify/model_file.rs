//! On-disk format of a trained CLI model: the text model snapshot plus the
//! feature settings needed to rebuild its extractor.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use textcat_classifiers::encoders::StringLabelEncoder;
use textcat_classifiers::{SerializedTextModel, TextModel};

use crate::classify::features::{FeatureSettings, NgramExtractor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub version: String,
    #[serde(default)]
    pub features: FeatureSettings,
    pub model: SerializedTextModel,
}

pub fn save_model<P: AsRef<Path>>(
    model: &TextModel<String>,
    features: &FeatureSettings,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let saved = SavedModel {
        version: clap::crate_version!().to_string(),
        features: features.clone(),
        model: model.to_serialized(),
    };
    let file = File::create(path).with_context(|| format!("Failed to create model file: {:?}", path))?;
    serde_json::to_writer(BufWriter::new(file), &saved)
        .with_context(|| format!("Failed to write model file: {:?}", path))?;
    log::info!("Saved model to {:?}", path);
    Ok(())
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TextModel<String>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open model file: {:?}", path))?;
    let saved: SavedModel = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse model file: {:?}", path))?;
    log::debug!("Loaded model written by textcat {}", saved.version);

    let model = TextModel::from_serialized(
        saved.model,
        NgramExtractor::new(saved.features),
        StringLabelEncoder,
    );
    if !model.is_fitted() {
        anyhow::bail!("Model file {:?} holds an untrained model", path);
    }
    Ok(model)
}

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use textcat_classifiers::ModelConfig;

use crate::classify::features::FeatureSettings;
use crate::classify::util::validate_tsv_or_csv_file;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub train_data: String,
    pub validation_data: Option<String>,
    pub output_file: String,
    pub model: ModelConfig,
    pub features: FeatureSettings,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            train_data: String::new(),
            validation_data: None,
            output_file: String::from("textcat_model.json"),
            model: ModelConfig::default(),
            features: FeatureSettings::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: TrainConfig = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        // Apply CLI overrides
        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        validate_tsv_or_csv_file(&config.train_data)?;

        if let Some(validation_data) = matches.get_one::<String>("validation_data") {
            config.validation_data = Some(validation_data.clone());
        }
        if let Some(val_data) = &config.validation_data {
            validate_tsv_or_csv_file(val_data)?;
        }

        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = output_file.clone();
        }

        if let Some(classifier) = matches.get_one::<String>("classifier") {
            config.model.model_settings.classifier_type = classifier.clone();
        }

        if let Some(seed) = matches.get_one::<u64>("seed") {
            config.model.random_seed = Some(*seed);
        }

        Ok(config)
    }
}

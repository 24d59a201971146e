use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use crate::classify::util::validate_tsv_or_csv_file;

/// Inputs of the `predict` and `evaluate` commands.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictConfig {
    pub model_path: PathBuf,
    pub data: PathBuf,
    /// `None` writes to stdout.
    pub output_file: Option<PathBuf>,
}

impl PredictConfig {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let model_path = matches
            .get_one::<PathBuf>("model_path")
            .cloned()
            .context("A model file is required (--model)")?;
        if !model_path.exists() {
            anyhow::bail!("Model file does not exist: {:?}", model_path);
        }

        let data = matches
            .get_one::<PathBuf>("data")
            .cloned()
            .context("A data file is required (--data)")?;
        validate_tsv_or_csv_file(&data.to_string_lossy())?;

        let output_file = matches.get_one::<PathBuf>("output_file").cloned();

        Ok(PredictConfig {
            model_path,
            data,
            output_file,
        })
    }
}

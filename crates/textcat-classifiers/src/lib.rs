//! textcat-classifiers: multi-class statistical text classification.
//!
//! A [`TextModel`](text_model::TextModel) turns examples into named feature
//! maps through a caller-supplied extractor, vectorizes (and optionally scales
//! and selects) them, and trains one of several interchangeable classifiers
//! (`logreg`, `dtree`, `rforest`, `svm`). Hyperparameters are written in a
//! normalized form; `class_bias` in particular interpolates between uniform
//! and balanced class weights. Parameters can be fixed or picked by
//! cross-validated grid search.
//!
//! Fitted models serialize to JSON together with the word and query frequency
//! tables the extractor relies on.
pub mod config;
pub mod encoders;
pub mod error;
pub mod evaluation;
pub mod feature_extraction;
pub mod feature_selection;
pub mod model_selection;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod preprocessing;
pub mod resources;
pub mod text_model;

pub use config::{ClassifierKind, LabelType, ModelConfig, ParamSelection, Scoring};
pub use error::{ConfigError, ModelError, Result};
pub use text_model::{Prediction, SerializedTextModel, TextModel};

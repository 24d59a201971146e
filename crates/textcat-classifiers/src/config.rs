use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::params::{ParamGrid, ParamMap};

/// Central configuration for a text model.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub model_type: String,
    pub label_type: LabelType,
    pub model_settings: ModelSettings,
    /// Fixed parameters. When present, parameter selection is skipped.
    pub params: Option<ParamMap>,
    pub param_selection: Option<ParamSelection>,
    /// Seed for the trainer's shuffling source. `None` seeds from entropy.
    pub random_seed: Option<u64>,
}

impl ModelConfig {
    pub fn new(classifier_type: &str) -> Self {
        Self {
            model_settings: ModelSettings {
                classifier_type: classifier_type.to_string(),
                ..ModelSettings::default()
            },
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_param_selection(mut self, selection: ParamSelection) -> Self {
        self.param_selection = Some(selection);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn classifier_kind(&self) -> Result<ClassifierKind, ConfigError> {
        self.model_settings.classifier_type.parse()
    }

    pub fn scaler_kind(&self) -> Result<Option<ScalerKind>, ConfigError> {
        self.model_settings
            .feature_scaler
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    pub fn selector_kind(&self) -> Result<Option<SelectorKind>, ConfigError> {
        self.model_settings
            .feature_selector
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Check every enumerated setting. Returns the classifier kind on success.
    pub fn validate(&self) -> Result<ClassifierKind, ConfigError> {
        let kind = self.classifier_kind()?;
        self.scaler_kind()?;
        self.selector_kind()?;
        if let Some(selection) = &self.param_selection {
            selection.validate()?;
        }
        Ok(kind)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: "text".to_string(),
            label_type: LabelType::Class,
            model_settings: ModelSettings::default(),
            params: None,
            param_selection: None,
            random_seed: None,
        }
    }
}

/// Free-form settings that pick the classifier and the optional pipeline stages.
///
/// Kinds are kept as strings so that a configuration naming an unsupported
/// kind still loads; it is rejected when training starts.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub classifier_type: String,
    pub feature_selector: Option<String>,
    pub feature_scaler: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            classifier_type: ClassifierKind::LogReg.as_str().to_string(),
            feature_selector: None,
            feature_scaler: None,
        }
    }
}

/// Semantic type of the labels a model predicts.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    #[default]
    Class,
    Entities,
}

/// Supported classifier kinds.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    #[serde(rename = "logreg")]
    LogReg,
    #[serde(rename = "dtree")]
    DecisionTree,
    #[serde(rename = "rforest")]
    RandomForest,
    #[serde(rename = "svm")]
    Svm,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 4] = [
        ClassifierKind::LogReg,
        ClassifierKind::DecisionTree,
        ClassifierKind::RandomForest,
        ClassifierKind::Svm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::LogReg => "logreg",
            ClassifierKind::DecisionTree => "dtree",
            ClassifierKind::RandomForest => "rforest",
            ClassifierKind::Svm => "svm",
        }
    }
}

impl FromStr for ClassifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logreg" => Ok(ClassifierKind::LogReg),
            "dtree" => Ok(ClassifierKind::DecisionTree),
            "rforest" => Ok(ClassifierKind::RandomForest),
            "svm" => Ok(ClassifierKind::Svm),
            _ => Err(ConfigError::UnknownClassifier(s.to_string())),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalerKind {
    /// Divide by the standard deviation without centering, so sparse inputs stay sparse.
    #[serde(rename = "std-dev")]
    StdDev,
    #[serde(rename = "max-abs")]
    MaxAbs,
}

impl FromStr for ScalerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "std-dev" => Ok(ScalerKind::StdDev),
            "max-abs" => Ok(ScalerKind::MaxAbs),
            _ => Err(ConfigError::UnknownScaler(s.to_string())),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// Keep features with non-zero weight in an L1-regularized logistic regression.
    #[serde(rename = "l1")]
    L1,
    /// Keep the top percentile of features ranked by ANOVA F-score.
    #[serde(rename = "f")]
    FScore,
}

impl FromStr for SelectorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l1" => Ok(SelectorKind::L1),
            "f" => Ok(SelectorKind::FScore),
            _ => Err(ConfigError::UnknownSelector(s.to_string())),
        }
    }
}

/// How candidates are compared during parameter selection.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    Accuracy,
    LogLoss,
}

/// Settings for cross-validated parameter selection.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ParamSelection {
    pub grid: ParamGrid,
    /// Number of folds.
    pub k: usize,
    pub scoring: Scoring,
}

impl ParamSelection {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k < 2 {
            return Err(ConfigError::InvalidSelection(format!(
                "k must be at least 2, got {}",
                self.k
            )));
        }
        if let Some((name, _)) = self.grid.iter().find(|(_, values)| values.is_empty()) {
            return Err(ConfigError::InvalidSelection(format!(
                "grid entry {:?} has no candidate values",
                name
            )));
        }
        Ok(())
    }
}

impl Default for ParamSelection {
    fn default() -> Self {
        Self {
            grid: BTreeMap::new(),
            k: 5,
            scoring: Scoring::Accuracy,
        }
    }
}

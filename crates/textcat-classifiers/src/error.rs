use thiserror::Error;

/// Problems with a model configuration or its parameters. These are raised
/// before any training data is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Classifier type {0:?} not recognized. Valid options are: logreg, dtree, rforest, svm")]
    UnknownClassifier(String),

    #[error("Feature scaler {0:?} not recognized. Valid options are: std-dev, max-abs")]
    UnknownScaler(String),

    #[error("Feature selector {0:?} not recognized. Valid options are: l1, f")]
    UnknownSelector(String),

    #[error("Invalid value for parameter {name:?}: {message}")]
    InvalidParam { name: String, message: String },

    #[error("Invalid parameter selection settings: {0}")]
    InvalidSelection(String),
}

impl ConfigError {
    pub(crate) fn invalid_param(name: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidParam {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Error type for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model not fitted: {0}")]
    NotFitted(&'static str),

    #[error("Unknown label {0:?}")]
    UnknownLabel(String),

    #[error("Class id {0} is out of range")]
    UnknownClass(usize),

    #[error("Got {examples} examples but {labels} labels")]
    LengthMismatch { examples: usize, labels: usize },

    #[error("Expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Training requires at least two distinct labels, got {0}")]
    DegenerateLabels(usize),

    #[error("Labels are required to fit the feature selector")]
    MissingLabels,

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// True for errors caused by the configuration rather than the data.
    pub fn is_config_error(&self) -> bool {
        matches!(self, ModelError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

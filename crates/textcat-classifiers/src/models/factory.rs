use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierKind;
use crate::error::{ConfigError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::logistic::{LogRegParams, LogisticRegression};
use crate::models::svm::{LinearSvm, SvmParams};
use crate::models::tree::{DecisionTree, TreeParams};
use crate::params::ResolvedParams;

/// Validated, typed parameters for one classifier kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierParams {
    LogReg(LogRegParams),
    DecisionTree(TreeParams),
    RandomForest(ForestParams),
    Svm(SvmParams),
}

impl ClassifierParams {
    /// Type-check resolved parameters for `kind`. Unknown parameter names
    /// are rejected.
    pub fn from_resolved(kind: ClassifierKind, resolved: &ResolvedParams) -> std::result::Result<Self, ConfigError> {
        Ok(match kind {
            ClassifierKind::LogReg => ClassifierParams::LogReg(LogRegParams::from_resolved(resolved)?),
            ClassifierKind::DecisionTree => ClassifierParams::DecisionTree(TreeParams::from_resolved(resolved)?),
            ClassifierKind::RandomForest => ClassifierParams::RandomForest(ForestParams::from_resolved(resolved)?),
            ClassifierKind::Svm => ClassifierParams::Svm(SvmParams::from_resolved(resolved)?),
        })
    }

    /// Fill in `random_state` where the kind uses one and none was given.
    pub fn with_default_seed(mut self, seed: u64) -> Self {
        let random_state = match &mut self {
            ClassifierParams::LogReg(_) => None,
            ClassifierParams::DecisionTree(p) => Some(&mut p.random_state),
            ClassifierParams::RandomForest(p) => Some(&mut p.tree.random_state),
            ClassifierParams::Svm(p) => Some(&mut p.random_state),
        };
        if let Some(random_state) = random_state {
            random_state.get_or_insert(seed);
        }
        self
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            ClassifierParams::LogReg(_) => ClassifierKind::LogReg,
            ClassifierParams::DecisionTree(_) => ClassifierKind::DecisionTree,
            ClassifierParams::RandomForest(_) => ClassifierKind::RandomForest,
            ClassifierParams::Svm(_) => ClassifierKind::Svm,
        }
    }
}

/// Any supported classifier, serialized as `{"<kind>": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    #[serde(rename = "logreg")]
    LogReg(LogisticRegression),
    #[serde(rename = "dtree")]
    DecisionTree(DecisionTree),
    #[serde(rename = "rforest")]
    RandomForest(RandomForest),
    #[serde(rename = "svm")]
    Svm(LinearSvm),
}

impl Classifier {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::LogReg(_) => ClassifierKind::LogReg,
            Classifier::DecisionTree(_) => ClassifierKind::DecisionTree,
            Classifier::RandomForest(_) => ClassifierKind::RandomForest,
            Classifier::Svm(_) => ClassifierKind::Svm,
        }
    }

    fn inner(&self) -> &dyn ClassifierModel {
        match self {
            Classifier::LogReg(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::RandomForest(m) => m,
            Classifier::Svm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClassifierModel {
        match self {
            Classifier::LogReg(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::RandomForest(m) => m,
            Classifier::Svm(m) => m,
        }
    }
}

impl ClassifierModel for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        log::debug!(
            "Fitting {} on {} examples x {} features, {} classes",
            self.name(),
            x.nrows(),
            x.ncols(),
            n_classes
        );
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_log_proba(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        self.inner().predict(x)
    }

    fn n_classes(&self) -> Option<usize> {
        self.inner().n_classes()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// Build an unfitted classifier from typed parameters.
pub fn build_model(params: ClassifierParams) -> Classifier {
    match params {
        ClassifierParams::LogReg(p) => Classifier::LogReg(LogisticRegression::new(p)),
        ClassifierParams::DecisionTree(p) => Classifier::DecisionTree(DecisionTree::new(p)),
        ClassifierParams::RandomForest(p) => Classifier::RandomForest(RandomForest::new(p)),
        ClassifierParams::Svm(p) => Classifier::Svm(LinearSvm::new(p)),
    }
}

/// Build an unfitted classifier of `kind` from resolved parameters.
pub fn build_from_resolved(kind: ClassifierKind, resolved: &ResolvedParams) -> Result<Classifier> {
    Ok(build_model(ClassifierParams::from_resolved(kind, resolved)?))
}

/// Like [`build_from_resolved`], seeding randomized classifiers with `seed`
/// unless the parameters carry their own `random_state`.
pub fn build_seeded(kind: ClassifierKind, resolved: &ResolvedParams, seed: u64) -> Result<Classifier> {
    Ok(build_model(
        ClassifierParams::from_resolved(kind, resolved)?.with_default_seed(seed),
    ))
}

pub mod classifier_trait;
pub mod factory;
pub mod forest;
pub mod logistic;
pub mod svm;
pub mod tree;

pub use classifier_trait::ClassifierModel;
pub use factory::{build_model, Classifier, ClassifierParams};

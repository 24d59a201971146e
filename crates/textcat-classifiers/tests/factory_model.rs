use ndarray::Array2;
use serde_json::json;
use textcat_classifiers::config::ClassifierKind;
use textcat_classifiers::models::factory::{self, ClassifierParams};
use textcat_classifiers::models::{Classifier, ClassifierModel};
use textcat_classifiers::params::ResolvedParams;

fn tiny_dataset() -> (Array2<f64>, Vec<usize>) {
    let x = Array2::from_shape_vec(
        (9, 3),
        vec![
            1.0, 0.0, 0.0, // class 0
            0.0, 1.0, 0.0, // class 1
            0.0, 0.0, 1.0, // class 2
            1.1, 0.1, 0.0, // class 0
            0.1, 0.9, 0.0, // class 1
            0.0, 0.1, 1.2, // class 2
            0.9, 0.0, 0.1, // class 0
            0.0, 1.1, 0.1, // class 1
            0.1, 0.0, 0.9, // class 2
        ],
    )
    .expect("failed to create feature matrix");
    (x, vec![0, 1, 2, 0, 1, 2, 0, 1, 2])
}

fn seeded(kind: ClassifierKind) -> ResolvedParams {
    let mut resolved = ResolvedParams::default();
    match kind {
        ClassifierKind::LogReg => {
            resolved.params.insert("C".to_string(), json!(100.0));
        }
        ClassifierKind::RandomForest => {
            resolved.params.insert("random_state".to_string(), json!(11));
            resolved.params.insert("max_features".to_string(), json!("all"));
            resolved.params.insert("n_estimators".to_string(), json!(15));
        }
        ClassifierKind::DecisionTree | ClassifierKind::Svm => {
            resolved.params.insert("random_state".to_string(), json!(11));
        }
    }
    resolved
}

#[test]
fn test_factory_builds_and_predicts() {
    let (x, y) = tiny_dataset();

    for kind in ClassifierKind::ALL {
        let mut model = factory::build_from_resolved(kind, &seeded(kind)).expect("valid params");
        assert_eq!(model.kind(), kind);
        model.fit(&x, &y, 3).expect("fit");

        let probs = model.predict_proba(&x).expect("predict_proba");
        assert_eq!(probs.dim(), (x.nrows(), 3), "{}", kind);
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9, "{} rows must sum to one", kind);
        }
        assert_eq!(model.predict(&x).expect("predict"), y, "{}", kind);
        assert_eq!(model.n_classes(), Some(3));
    }
}

#[test]
fn test_fitted_models_round_trip_through_json() {
    let (x, y) = tiny_dataset();

    for kind in ClassifierKind::ALL {
        let mut model = factory::build_from_resolved(kind, &seeded(kind)).unwrap();
        model.fit(&x, &y, 3).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: Classifier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict_proba(&x).unwrap(), model.predict_proba(&x).unwrap());
    }
}

#[test]
fn test_unfitted_and_mismatched_inputs() {
    let (x, y) = tiny_dataset();
    let model = factory::build_model(
        ClassifierParams::from_resolved(ClassifierKind::Svm, &ResolvedParams::default()).unwrap(),
    );
    assert!(model.predict(&x).is_err());

    let mut model = factory::build_from_resolved(ClassifierKind::LogReg, &ResolvedParams::default()).unwrap();
    model.fit(&x, &y, 3).unwrap();
    let narrow = Array2::<f64>::zeros((2, 2));
    assert!(model.predict_proba(&narrow).is_err());
}

#[test]
fn test_fold_missing_a_class_still_reports_all_classes() {
    // only classes 0 and 1 present, three declared
    let x = Array2::from_shape_vec((4, 1), vec![0.0, 0.1, 1.0, 1.1]).unwrap();
    let y = vec![0, 0, 1, 1];

    for kind in ClassifierKind::ALL {
        let mut model = factory::build_from_resolved(kind, &seeded(kind)).unwrap();
        model.fit(&x, &y, 3).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.ncols(), 3, "{}", kind);
    }
}

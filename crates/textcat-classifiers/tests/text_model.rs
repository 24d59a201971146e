use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::BTreeMap;
use textcat_classifiers::config::{ClassifierKind, ModelConfig, ParamSelection, Scoring};
use textcat_classifiers::encoders::{LabelEncoder, StringLabelEncoder};
use textcat_classifiers::feature_extraction::FeatureMap;
use textcat_classifiers::params::{ParamGrid, ParamMap};
use textcat_classifiers::resources::{FrequencyTable, Resources, QUERY_FREQ_RSC, WORD_FREQ_RSC};
use textcat_classifiers::text_model::{TextModel, NEG_INF_SENTINEL};
use textcat_classifiers::ModelError;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn bag_of_words(example: &String, _: &Resources) -> FeatureMap {
    let mut features = FeatureMap::new();
    for word in example.split_whitespace() {
        *features.entry(format!("bag|{}", word)).or_insert(0.0) += 1.0;
    }
    features
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn intent_data() -> (Vec<String>, Vec<String>) {
    let examples = strings(&[
        "hello there",
        "hi there friend",
        "hello friend",
        "good morning hello",
        "what is the weather",
        "weather today please",
        "is it raining today",
        "the weather tomorrow",
        "goodbye for now",
        "bye bye",
        "see you later bye",
        "goodbye friend",
    ]);
    let labels = strings(&[
        "greet", "greet", "greet", "greet", "weather", "weather", "weather", "weather", "exit", "exit", "exit",
        "exit",
    ]);
    (examples, labels)
}

fn model(classifier: &str) -> TextModel<String> {
    TextModel::with_string_labels(ModelConfig::new(classifier).with_seed(7), bag_of_words)
}

// ---------------------------------------------------------------------------
// Training and prediction
// ---------------------------------------------------------------------------

#[test]
fn test_every_classifier_learns_intents() {
    init_logging();
    let (examples, labels) = intent_data();

    for kind in ["logreg", "dtree", "rforest", "svm"] {
        let mut m = model(kind);
        let params = match kind {
            "logreg" => Some(ParamMap::from([("C".to_string(), json!(100))])),
            "rforest" => Some(ParamMap::from([
                ("random_state".to_string(), json!(5)),
                ("n_estimators".to_string(), json!(25)),
                ("bootstrap".to_string(), json!(false)),
                ("max_features".to_string(), json!("all")),
            ])),
            _ => Some(ParamMap::from([("random_state".to_string(), json!(5))])),
        };
        m.fit(&examples, &labels, params).unwrap();

        let predicted = m.predict(&examples).unwrap();
        let correct = predicted.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(correct >= 11, "{} got {}/12 on its training data", kind, correct);

        for prediction in m.predict_proba(&examples).unwrap() {
            let total: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9, "{} probabilities sum to {}", kind, total);
            let best = prediction
                .probabilities
                .iter()
                .map(|(_, p)| *p)
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(prediction.probability(&prediction.label), Some(best));
        }
    }
}

#[test]
fn test_probabilities_are_listed_in_class_order() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    m.fit(&examples, &labels, None).unwrap();

    let prediction = &m.predict_proba(&strings(&["hello friend"])).unwrap()[0];
    let names: Vec<&str> = prediction.probabilities.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(names, vec!["exit", "greet", "weather"]);
}

#[test]
fn test_log_proba_uses_sentinel_for_zero_probability() {
    let (examples, labels) = intent_data();
    let mut m = model("dtree");
    m.fit(&examples, &labels, Some(ParamMap::from([("random_state".to_string(), json!(1))])))
        .unwrap();

    let mut saw_sentinel = false;
    for prediction in m.predict_log_proba(&examples).unwrap() {
        for (_, lp) in &prediction.probabilities {
            assert!(lp.is_finite());
            if *lp == NEG_INF_SENTINEL {
                saw_sentinel = true;
            }
        }
        // the top label is still the most likely one
        let best = prediction
            .probabilities
            .iter()
            .map(|(_, p)| *p)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(prediction.probability(&prediction.label), Some(best));
    }
    // pure leaves give zero probability to the other classes
    assert!(saw_sentinel);
}

#[test]
fn test_class_bias_records_params_as_given() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    let params = ParamMap::from([("class_bias".to_string(), json!(0.5))]);
    m.fit(&examples, &labels, Some(params.clone())).unwrap();

    assert_eq!(m.current_params(), Some(&params));
    assert_eq!(m.effective_config().params, Some(params));
}

#[test]
fn test_invalid_params_are_config_errors() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    let err = m
        .fit(&examples, &labels, Some(ParamMap::from([("gamma".to_string(), json!(1.0))])))
        .unwrap_err();
    assert!(err.is_config_error());
    assert!(!m.is_fitted());

    let err = m
        .fit(&examples, &labels, Some(ParamMap::from([("class_bias".to_string(), json!(2.0))])))
        .unwrap_err();
    assert!(err.is_config_error());
}

// ---------------------------------------------------------------------------
// Degenerate input and configuration errors
// ---------------------------------------------------------------------------

#[test]
fn test_single_label_leaves_unfitted_model_unfitted() {
    init_logging();
    let mut m = model("logreg");
    m.fit(&strings(&["a", "b", "c"]), &strings(&["x", "x", "x"]), None)
        .unwrap();

    assert!(!m.is_fitted());
    assert!(matches!(
        m.predict(&strings(&["a"])),
        Err(ModelError::NotFitted(_))
    ));
}

#[test]
fn test_single_label_leaves_fitted_state_untouched() {
    let (examples, labels) = intent_data();
    let mut m = model("svm");
    m.fit(&examples, &labels, None).unwrap();
    let before = m.to_json().unwrap();

    m.fit(&strings(&["something else"]), &strings(&["greet"]), None)
        .unwrap();
    assert_eq!(m.to_json().unwrap(), before);
}

#[test]
fn test_unknown_classifier_is_reported_before_training() {
    let (examples, labels) = intent_data();
    let mut m = model("bogus");
    let err = m.fit(&examples, &labels, None).unwrap_err();

    assert!(err.is_config_error());
    assert!(err.to_string().contains("bogus"));
}

#[test]
fn test_length_mismatch() {
    let mut m = model("logreg");
    let err = m
        .fit(&strings(&["a", "b"]), &strings(&["x"]), None)
        .unwrap_err();
    assert!(matches!(err, ModelError::LengthMismatch { examples: 2, labels: 1 }));
}

#[test]
fn test_out_of_range_class_weight_fails_in_both_modes() {
    let (examples, labels) = intent_data();
    let weights = json!({"7": 5.0});

    let mut m = TextModel::with_string_labels(ModelConfig::new("logreg"), bag_of_words);
    let params = ParamMap::from([("class_weight".to_string(), weights.clone())]);
    assert!(m.fit(&examples, &labels, Some(params)).unwrap_err().is_config_error());
    assert!(!m.is_fitted());

    let config = ModelConfig::new("logreg").with_param_selection(ParamSelection {
        grid: ParamGrid::from([("class_weight".to_string(), vec![weights])]),
        k: 2,
        scoring: Scoring::Accuracy,
    });
    let mut m = TextModel::with_string_labels(config, bag_of_words);
    assert!(m.fit(&examples, &labels, None).unwrap_err().is_config_error());
    assert!(!m.is_fitted());
}

#[test]
fn test_seeded_fits_are_reproducible() {
    init_logging();
    let (examples, labels) = intent_data();

    for kind in ClassifierKind::ALL {
        let fit_once = || {
            let mut m = TextModel::with_string_labels(ModelConfig::new(kind.as_str()), bag_of_words);
            m.fit_with_rng(&examples, &labels, None, &mut StdRng::seed_from_u64(5))
                .unwrap();
            m.to_json().unwrap()
        };
        assert_eq!(fit_once(), fit_once(), "{}", kind);
    }
}

#[test]
fn test_configured_seed_reproduces_search() {
    let (examples, labels) = intent_data();
    let selection = ParamSelection {
        grid: ParamGrid::from([("max_depth".to_string(), vec![json!(2), json!(null)])]),
        k: 3,
        scoring: Scoring::LogLoss,
    };

    for kind in ["dtree", "rforest", "svm"] {
        let fit_once = || {
            let config = ModelConfig::new(kind).with_seed(11);
            let config = if kind == "svm" {
                config.with_param_selection(ParamSelection {
                    grid: ParamGrid::from([("C".to_string(), vec![json!(0.1), json!(10)])]),
                    ..selection.clone()
                })
            } else {
                config.with_param_selection(selection.clone())
            };
            let mut m = TextModel::with_string_labels(config, bag_of_words);
            m.fit(&examples, &labels, None).unwrap();
            m.to_json().unwrap()
        };
        assert_eq!(fit_once(), fit_once(), "{}", kind);
    }
}

// ---------------------------------------------------------------------------
// Parameter selection
// ---------------------------------------------------------------------------

fn selection() -> ParamSelection {
    ParamSelection {
        grid: ParamGrid::from([
            ("C".to_string(), vec![json!(0.01), json!(100)]),
            ("class_bias".to_string(), vec![json!(0.0), json!(1.0)]),
        ]),
        k: 4,
        scoring: Scoring::Accuracy,
    }
}

#[test]
fn test_fit_runs_configured_search() {
    init_logging();
    let (examples, labels) = intent_data();
    let config = ModelConfig::new("logreg").with_seed(3).with_param_selection(selection());
    let mut m = TextModel::with_string_labels(config, bag_of_words);
    m.fit(&examples, &labels, None).unwrap();

    let params = m.current_params().unwrap();
    assert!(params.contains_key("C"));
    // class_bias is replaced by the equivalent per-label weights
    let weights = params.get("class_weight").unwrap().as_object().unwrap();
    assert_eq!(weights.len(), 3);
    assert!(weights.contains_key("greet"));
    assert!(m.cv_score().is_some());
    assert!(m.effective_config().param_selection.is_none());
}

#[test]
fn test_explicit_params_skip_search() {
    let (examples, labels) = intent_data();
    let config = ModelConfig::new("logreg").with_seed(3).with_param_selection(selection());
    let mut m = TextModel::with_string_labels(config, bag_of_words);
    let params = ParamMap::from([("C".to_string(), json!(5))]);
    m.fit(&examples, &labels, Some(params.clone())).unwrap();

    assert_eq!(m.current_params(), Some(&params));
    assert_eq!(m.cv_score(), None);
}

#[test]
fn test_select_params_keeps_training_params() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    let params = ParamMap::from([("C".to_string(), json!(5))]);
    m.fit(&examples, &labels, Some(params.clone())).unwrap();

    let winner = m.select_params(&examples, &labels, Some(selection())).unwrap();
    assert!(winner.contains_key("C"));
    assert_eq!(m.current_params(), Some(&params));
    assert!(m.cv_score().is_some());
}

#[test]
fn test_select_params_errors() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    let err = m.select_params(&examples, &labels, None).unwrap_err();
    assert!(err.is_config_error());

    let err = m
        .select_params(&strings(&["a", "b"]), &strings(&["x", "x"]), Some(selection()))
        .unwrap_err();
    assert!(matches!(err, ModelError::DegenerateLabels(1)));
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[test]
fn test_evaluate_uses_effective_config() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    m.fit(&examples, &labels, Some(ParamMap::from([("C".to_string(), json!(100))])))
        .unwrap();

    let evaluation = m.evaluate(&examples, &labels).unwrap();
    assert_eq!(evaluation.len(), examples.len());
    assert!(evaluation.accuracy().unwrap() > 0.9);
    assert_eq!(
        evaluation.config.params,
        Some(ParamMap::from([("C".to_string(), json!(100))]))
    );
    let first = &evaluation.results[0];
    assert_eq!(first.example, examples[0]);
    assert_eq!(first.probabilities.len(), 3);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_save_and_load_reproduce_predictions() {
    let (examples, labels) = intent_data();
    let mut m = model("rforest");
    m.resources_mut()
        .insert(WORD_FREQ_RSC, FrequencyTable::from([("hello".to_string(), 2)]));
    m.resources_mut()
        .insert(QUERY_FREQ_RSC, FrequencyTable::from([("bye bye".to_string(), 1)]));
    m.resources_mut()
        .insert("gazetteer", FrequencyTable::from([("paris".to_string(), 1)]));
    m.fit(&examples, &labels, Some(ParamMap::from([("random_state".to_string(), json!(9))])))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    m.save(&path).unwrap();
    let restored: TextModel<String> = TextModel::load(&path, bag_of_words, StringLabelEncoder).unwrap();

    assert_eq!(restored.predict_proba(&examples).unwrap(), m.predict_proba(&examples).unwrap());
    assert_eq!(restored.predict(&examples).unwrap(), m.predict(&examples).unwrap());
    assert_eq!(
        restored.resources().word_freq().and_then(|t| t.get("hello")),
        Some(&2)
    );
    assert_eq!(restored.resources().query_freq().map(|t| t.len()), Some(1));
    assert!(restored.resources().get("gazetteer").is_none());
}

#[test]
fn test_missing_resources_default_to_empty() {
    let (examples, labels) = intent_data();
    let mut m = model("logreg");
    m.fit(&examples, &labels, None).unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("resources");
    let restored: TextModel<String> =
        TextModel::from_json(&value.to_string(), bag_of_words, StringLabelEncoder).unwrap();

    assert_eq!(restored.resources().word_freq().map(|t| t.len()), Some(0));
    assert_eq!(restored.resources().query_freq().map(|t| t.len()), Some(0));
    assert_eq!(restored.predict(&examples).unwrap(), m.predict(&examples).unwrap());
}

// ---------------------------------------------------------------------------
// Custom label types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Intent {
    Greet,
    Weather,
    Exit,
}

struct IntentEncoder;

impl LabelEncoder<Intent> for IntentEncoder {
    fn encode(&self, labels: &[Intent]) -> Vec<String> {
        labels.iter().map(|l| format!("{:?}", l).to_lowercase()).collect()
    }

    fn decode(&self, raw_labels: &[String]) -> Vec<Intent> {
        let names: BTreeMap<&str, Intent> = [
            ("greet", Intent::Greet),
            ("weather", Intent::Weather),
            ("exit", Intent::Exit),
        ]
        .into_iter()
        .collect();
        raw_labels.iter().map(|raw| names[raw.as_str()]).collect()
    }
}

#[test]
fn test_label_encoder_round_trips_custom_labels() {
    let (examples, labels) = intent_data();
    let intents: Vec<Intent> = labels
        .iter()
        .map(|l| match l.as_str() {
            "greet" => Intent::Greet,
            "weather" => Intent::Weather,
            _ => Intent::Exit,
        })
        .collect();

    let mut m: TextModel<String, Intent> =
        TextModel::new(ModelConfig::new("logreg").with_seed(2), bag_of_words, IntentEncoder);
    m.fit(&examples, &intents, Some(ParamMap::from([("C".to_string(), json!(100))])))
        .unwrap();

    let predicted = m.predict(&strings(&["hello friend", "weather today"])).unwrap();
    assert_eq!(predicted, vec![Intent::Greet, Intent::Weather]);
}

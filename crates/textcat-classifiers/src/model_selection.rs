//! Cross-validated hyperparameter search.
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::{ClassifierKind, ParamSelection, Scoring};
use crate::error::{ConfigError, Result};
use crate::models::classifier_trait::argmax;
use crate::models::{build_model, Classifier, ClassifierModel, ClassifierParams};
use crate::params::{ResolvedGrid, ResolvedParams};

/// Lower clip for probabilities when computing the log loss.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Result of a parameter search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The winning configuration refit on all of the data.
    pub classifier: Classifier,
    pub params: ResolvedParams,
    /// Mean cross-validation score of the winner. Higher is better.
    pub score: f64,
}

/// Picks the best parameters for a classifier kind from a resolved grid.
pub trait ParamSearch: Send + Sync {
    /// `groups` assigns every row to a group; rows sharing a group always
    /// land in the same fold. `seed` seeds randomized classifiers whose
    /// parameters do not set `random_state`.
    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        kind: ClassifierKind,
        x: &Array2<f64>,
        y: &[usize],
        groups: &[usize],
        n_classes: usize,
        grid: &ResolvedGrid,
        selection: &ParamSelection,
        seed: u64,
    ) -> Result<SearchOutcome>;
}

/// Exhaustive search over the grid with stratified k-fold cross-validation.
/// Candidates are evaluated in parallel; the first of equally scoring
/// candidates wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl ParamSearch for GridSearch {
    fn search(
        &self,
        kind: ClassifierKind,
        x: &Array2<f64>,
        y: &[usize],
        groups: &[usize],
        n_classes: usize,
        grid: &ResolvedGrid,
        selection: &ParamSelection,
        seed: u64,
    ) -> Result<SearchOutcome> {
        selection.validate()?;
        let candidates = grid.candidates();
        let typed = candidates
            .iter()
            .map(|candidate| {
                ClassifierParams::from_resolved(kind, candidate).map(|params| params.with_default_seed(seed))
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        let folds = stratified_group_folds(y, groups, selection.k)?;

        log::info!(
            "Searching {} {} candidate(s) with {}-fold cross-validation",
            typed.len(),
            kind,
            folds.len()
        );

        let scores = typed
            .par_iter()
            .map(|params| cross_val_score(params, x, y, n_classes, &folds, selection.scoring))
            .collect::<Result<Vec<f64>>>()?;

        let mut best = 0;
        for (idx, &score) in scores.iter().enumerate() {
            log::debug!("candidate {:?}: {:.4}", candidates[idx].to_param_map(), score);
            if score > scores[best] {
                best = idx;
            }
        }

        let mut classifier = build_model(typed[best].clone());
        classifier.fit(x, y, n_classes)?;
        log::info!(
            "Best {} parameters {:?} scored {:.4}",
            kind,
            candidates[best].to_param_map(),
            scores[best]
        );

        Ok(SearchOutcome {
            classifier,
            params: candidates[best].clone(),
            score: scores[best],
        })
    }
}

/// Row indices of a single train/test split.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows into `k` folds, keeping groups together and spreading each
/// class's groups evenly across folds.
///
/// A group's class is the class of its first row. Groups are ordered by
/// class, then by first appearance, and dealt to folds round-robin.
pub fn stratified_group_folds(y: &[usize], groups: &[usize], k: usize) -> std::result::Result<Vec<Fold>, ConfigError> {
    if groups.len() != y.len() {
        return Err(ConfigError::InvalidSelection(format!(
            "got {} groups for {} examples",
            groups.len(),
            y.len()
        )));
    }

    // group -> (class, rows), in order of first appearance
    let mut order: Vec<usize> = Vec::new();
    let mut members: BTreeMap<usize, (usize, Vec<usize>)> = BTreeMap::new();
    for (row, (&group, &class)) in groups.iter().zip(y).enumerate() {
        members
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                (class, Vec::new())
            })
            .1
            .push(row);
    }

    if order.len() < k {
        return Err(ConfigError::InvalidSelection(format!(
            "cannot split {} group(s) into {} folds",
            order.len(),
            k
        )));
    }

    // Stable sort keeps first-appearance order within a class.
    order.sort_by_key(|group| members[group].0);

    let mut fold_of_row = vec![0usize; y.len()];
    for (position, group) in order.iter().enumerate() {
        for &row in &members[group].1 {
            fold_of_row[row] = position % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&row| fold_of_row[row] == fold);
            Fold { train, test }
        })
        .collect())
}

/// Mean score of `params` over the folds.
pub fn cross_val_score(
    params: &ClassifierParams,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    folds: &[Fold],
    scoring: Scoring,
) -> Result<f64> {
    let mut total = 0.0;
    for fold in folds {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train: Vec<usize> = fold.train.iter().map(|&i| y[i]).collect();
        let x_test = x.select(Axis(0), &fold.test);
        let y_test: Vec<usize> = fold.test.iter().map(|&i| y[i]).collect();

        let mut model = build_model(params.clone());
        model.fit(&x_train, &y_train, n_classes)?;
        let proba = model.predict_proba(&x_test)?;
        total += score(&proba, &y_test, scoring);
    }
    Ok(total / folds.len().max(1) as f64)
}

/// Higher is better for every scoring rule, so log loss is negated.
pub fn score(proba: &Array2<f64>, y: &[usize], scoring: Scoring) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let n = y.len() as f64;
    match scoring {
        Scoring::Accuracy => {
            let correct = proba
                .rows()
                .into_iter()
                .zip(y)
                .filter(|(row, class)| argmax(row.view()) == **class)
                .count();
            correct as f64 / n
        }
        Scoring::LogLoss => {
            let loss: f64 = proba
                .rows()
                .into_iter()
                .zip(y)
                .map(|(row, &class)| -row[class].clamp(LOG_LOSS_EPS, 1.0).ln())
                .sum();
            -loss / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    #[test]
    fn test_folds_are_stratified_and_disjoint() {
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let groups: Vec<usize> = (0..8).collect();
        let folds = stratified_group_folds(&y, &groups, 2).unwrap();

        assert_eq!(folds.len(), 2);
        for fold in &folds {
            assert_eq!(fold.test.len(), 4);
            assert_eq!(fold.test.iter().filter(|&&i| y[i] == 0).count(), 2);
            assert!(fold.test.iter().all(|i| !fold.train.contains(i)));
        }
    }

    #[test]
    fn test_groups_stay_together() {
        let y = vec![0, 0, 1, 1, 0, 1];
        let groups = vec![7, 7, 3, 3, 9, 4];
        let folds = stratified_group_folds(&y, &groups, 2).unwrap();
        for fold in &folds {
            assert_eq!(fold.test.contains(&0), fold.test.contains(&1));
            assert_eq!(fold.test.contains(&2), fold.test.contains(&3));
        }
        assert!(stratified_group_folds(&y, &groups, 5).is_err());
    }

    #[test]
    fn test_score_rules() {
        let proba = array![[0.9, 0.1], [0.4, 0.6], [0.5, 0.5]];
        assert!((score(&proba, &[0, 1, 1], Scoring::Accuracy) - 2.0 / 3.0).abs() < 1e-12);
        let expected = -(-(0.9f64.ln()) - 0.6f64.ln() - 0.5f64.ln()) / 3.0;
        assert!((score(&proba, &[0, 1, 1], Scoring::LogLoss) - expected).abs() < 1e-12);
        // clipped instead of infinite
        assert!(score(&array![[1.0, 0.0]], &[1], Scoring::LogLoss).is_finite());
    }

    #[test]
    fn test_grid_search_first_best_wins() {
        let x = array![
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 1.0],
            [0.0, 1.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let groups: Vec<usize> = (0..6).collect();
        let grid = ResolvedGrid {
            params: [(
                "max_depth".to_string(),
                vec![json!(3), json!(4), json!(5)],
            )]
            .into_iter()
            .collect(),
            class_weight: None,
        };
        let selection = ParamSelection {
            k: 3,
            ..ParamSelection::default()
        };

        let outcome = GridSearch
            .search(ClassifierKind::DecisionTree, &x, &y, &groups, 2, &grid, &selection, 0)
            .unwrap();
        // every depth scores perfectly, so the first candidate is kept
        assert_eq!(outcome.params.params.get("max_depth"), Some(&json!(3)));
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.classifier.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_grid_search_rejects_unknown_param() {
        let x = array![[1.0], [0.0], [1.0], [0.0]];
        let y = vec![0, 1, 0, 1];
        let groups: Vec<usize> = (0..4).collect();
        let grid = ResolvedGrid {
            params: [("gamma".to_string(), vec![json!(0.1)])].into_iter().collect(),
            class_weight: None,
        };
        let selection = ParamSelection {
            k: 2,
            ..ParamSelection::default()
        };
        let err = GridSearch
            .search(ClassifierKind::LogReg, &x, &y, &groups, 2, &grid, &selection, 0)
            .unwrap_err();
        assert!(err.is_config_error());
    }
}

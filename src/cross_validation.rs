//! # Cross-Validation
//!
//! Judged queries are partitioned into folds so the optimizer can apply
//! selection pressure on one subset while reporting fitness on held-out
//! queries. Fold assignment is driven by the injectable generator, so a
//! fixed seed reproduces the same folds run after run.

use crate::error::{Result, TuneError};
use crate::judgments::JudgmentList;
use crate::rng::RandomNumberGenerator;

/// One train/test partition of the judged-query set.
#[derive(Debug, Clone)]
pub struct Fold {
    pub train: JudgmentList,
    pub test: JudgmentList,
}

/// Splits a judgment list into `n_folds` disjoint, approximately equal
/// groups; fold `i` tests on group `i` and trains on the union of the rest.
///
/// `n_folds == 1` degenerates to train == test == the full set.
///
/// # Errors
///
/// Zero folds, an empty judgment list, or more folds than judged queries
/// are configuration errors.
pub fn split(
    judgment_list: &JudgmentList,
    n_folds: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<Vec<Fold>> {
    if n_folds == 0 {
        return Err(TuneError::Configuration(
            "nFolds must be >= 1".to_string(),
        ));
    }
    if judgment_list.is_empty() {
        return Err(TuneError::Configuration(
            "cannot cross-validate an empty judgment list".to_string(),
        ));
    }
    if n_folds > judgment_list.len() {
        return Err(TuneError::Configuration(format!(
            "nFolds {} exceeds the {} judged queries available",
            n_folds,
            judgment_list.len()
        )));
    }
    if n_folds == 1 {
        return Ok(vec![Fold {
            train: judgment_list.clone(),
            test: judgment_list.clone(),
        }]);
    }

    let mut order: Vec<usize> = (0..judgment_list.len()).collect();
    rng.shuffle(&mut order);

    // group[i % n_folds] gets the i-th shuffled query
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_folds];
    for (i, idx) in order.into_iter().enumerate() {
        groups[i % n_folds].push(idx);
    }

    let all = judgment_list.judgments();
    let mut folds = Vec::with_capacity(n_folds);
    for test_group in 0..n_folds {
        let mut train = JudgmentList::new();
        let mut test = JudgmentList::new();
        for (group, members) in groups.iter().enumerate() {
            for &idx in members {
                if group == test_group {
                    test.add(all[idx].clone());
                } else {
                    train.add(all[idx].clone());
                }
            }
        }
        folds.push(Fold { train, test });
    }
    Ok(folds)
}

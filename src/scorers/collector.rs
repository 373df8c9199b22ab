//! Per-query score distributions.
//!
//! Evaluation workers append concurrently, so the ledgers sit behind
//! mutexes; everything else in a scorer is read-only during a generation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::judgments::QueryInfo;
use crate::scorers::ERROR_VALUE;

/// Which role a recorded score plays in cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreRole {
    Train,
    Test,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: f64,
    weight: f64,
}

/// Internally synchronized per-query score ledger, split by role.
///
/// Sentinel scores ([`ERROR_VALUE`]) contribute 0.0 to aggregates so that a
/// configuration returning nothing is maximally penalized without poisoning
/// the mean.
#[derive(Debug, Default)]
pub struct ScoreCollector {
    train: Mutex<BTreeMap<String, Entry>>,
    test: Mutex<BTreeMap<String, Entry>>,
}

impl ScoreCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, role: ScoreRole) -> &Mutex<BTreeMap<String, Entry>> {
        match role {
            ScoreRole::Train => &self.train,
            ScoreRole::Test => &self.test,
        }
    }

    /// Records one query's score. A repeated query id overwrites, so the
    /// ledger holds the most recently scored experiment's value for that
    /// query; reporting clears the ledger before recording the winner.
    pub fn record(&self, role: ScoreRole, query_info: &QueryInfo, score: f64) {
        let mut ledger = self
            .ledger(role)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.insert(
            query_info.query_id().to_string(),
            Entry {
                score,
                weight: query_info.weight(),
            },
        );
    }

    /// Clears one role's ledger; called between generations.
    pub fn clear(&self, role: ScoreRole) {
        self.ledger(role)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Weighted mean over recorded scores, sentinels contributing 0.0.
    /// `None` when nothing has been recorded.
    pub fn mean(&self, role: ScoreRole) -> Option<f64> {
        let ledger = self
            .ledger(role)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if ledger.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for entry in ledger.values() {
            let score = if entry.score == ERROR_VALUE {
                0.0
            } else {
                entry.score
            };
            sum += score * entry.weight;
            weight_sum += entry.weight;
        }
        if weight_sum == 0.0 {
            return Some(0.0);
        }
        Some(sum / weight_sum)
    }

    /// Unweighted median over recorded scores, sentinels mapped to 0.0.
    pub fn median(&self, role: ScoreRole) -> Option<f64> {
        let ledger = self
            .ledger(role)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if ledger.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = ledger
            .values()
            .map(|e| if e.score == ERROR_VALUE { 0.0 } else { e.score })
            .collect();
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        if values.len() % 2 == 1 {
            Some(values[mid])
        } else {
            Some((values[mid - 1] + values[mid]) / 2.0)
        }
    }

    /// Raw per-query scores for offline analysis (the p-matrix export).
    pub fn scores(&self, role: ScoreRole) -> BTreeMap<String, f64> {
        self.ledger(role)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(id, entry)| (id.clone(), entry.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgments::QueryStrings;

    fn info(id: &str, weight: f64) -> QueryInfo {
        QueryInfo::new(id, "", QueryStrings::single(id), weight)
    }

    #[test]
    fn weighted_mean_respects_query_weights() {
        let collector = ScoreCollector::new();
        collector.record(ScoreRole::Train, &info("q1", 1.0), 1.0);
        collector.record(ScoreRole::Train, &info("q2", 3.0), 0.0);
        let mean = collector.mean(ScoreRole::Train).unwrap();
        assert!((mean - 0.25).abs() < 1e-9);
    }

    #[test]
    fn sentinel_scores_count_as_zero() {
        let collector = ScoreCollector::new();
        collector.record(ScoreRole::Train, &info("q1", 1.0), ERROR_VALUE);
        collector.record(ScoreRole::Train, &info("q2", 1.0), 0.5);
        let mean = collector.mean(ScoreRole::Train).unwrap();
        assert!((mean - 0.25).abs() < 1e-9);
    }

    #[test]
    fn roles_are_independent() {
        let collector = ScoreCollector::new();
        collector.record(ScoreRole::Train, &info("q1", 1.0), 0.9);
        assert!(collector.mean(ScoreRole::Test).is_none());
    }

    #[test]
    fn median_of_even_count_averages_middle_pair() {
        let collector = ScoreCollector::new();
        collector.record(ScoreRole::Test, &info("q1", 1.0), 0.2);
        collector.record(ScoreRole::Test, &info("q2", 1.0), 0.8);
        assert!((collector.median(ScoreRole::Test).unwrap() - 0.5).abs() < 1e-9);
    }
}

//! Judged fraction of the returned page.

use crate::judgments::Judgments;
use crate::scorers::{Scorer, ScorerBase};
use crate::search::SearchResultSet;

pub const KIND: &str = "precisionAtN";

/// Counts how many of the first `min(n, len)` returned ids carry any
/// judgment, divided by the *result set size*.
///
/// The denominator is deliberately the number of returned documents, not
/// `n`: the metric measures the judged fraction of whatever came back,
/// weighting toward smaller result sets. Persisted regression runs depend
/// on this exact behavior.
#[derive(Debug)]
pub struct PrecisionAtN {
    base: ScorerBase,
}

impl PrecisionAtN {
    pub fn new(at_n: usize) -> Self {
        Self {
            base: ScorerBase::new(KIND, at_n),
        }
    }
}

impl Scorer for PrecisionAtN {
    fn base(&self) -> &ScorerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScorerBase {
        &mut self.base
    }

    fn compute(&self, judgments: &Judgments, results: &SearchResultSet) -> f64 {
        let mut hits = 0usize;
        for id in results.ids().iter().take(self.base.at_n()) {
            if judgments.contains_judgment(id) {
                hits += 1;
            }
        }
        hits as f64 / results.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgments::{QueryInfo, QueryStrings};
    use crate::scorers::{ScoreRole, ERROR_VALUE};

    fn judged() -> Judgments {
        let mut j = Judgments::new(QueryInfo::new(
            "q1",
            "",
            QueryStrings::single("query1"),
            1.0,
        ));
        j.add_judgment("id1", 2.0).unwrap();
        j.add_judgment("id2", 4.0).unwrap();
        j.add_judgment("id5", 6.0).unwrap();
        j
    }

    #[test]
    fn divides_by_result_set_size_not_n() {
        let scorer = PrecisionAtN::new(3);
        let results = SearchResultSet::new(vec![
            "id2".to_string(),
            "id9".to_string(),
            "id5".to_string(),
        ]);
        let score = scorer.score(ScoreRole::Train, &judged(), &results);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn short_result_set_weights_upward() {
        let scorer = PrecisionAtN::new(10);
        let results = SearchResultSet::new(vec!["id2".to_string(), "id9".to_string()]);
        let score = scorer.score(ScoreRole::Train, &judged(), &results);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_result_set_scores_the_sentinel() {
        let scorer = PrecisionAtN::new(3);
        let results = SearchResultSet::default();
        let score = scorer.score(ScoreRole::Train, &judged(), &results);
        assert_eq!(score, ERROR_VALUE);
    }

    #[test]
    fn only_the_first_n_ids_can_hit() {
        let scorer = PrecisionAtN::new(1);
        let results = SearchResultSet::new(vec![
            "id9".to_string(),
            "id2".to_string(),
            "id5".to_string(),
        ]);
        let score = scorer.score(ScoreRole::Train, &judged(), &results);
        assert_eq!(score, 0.0);
    }
}

//! Judged documents recovered within the first n.

use crate::judgments::Judgments;
use crate::scorers::{Scorer, ScorerBase};
use crate::search::SearchResultSet;

pub const KIND: &str = "recallAtN";

/// Fraction of the query's judged documents appearing among the first
/// `min(n, len)` returned ids. A query with no judgments scores 0.0.
#[derive(Debug)]
pub struct RecallAtN {
    base: ScorerBase,
}

impl RecallAtN {
    pub fn new(at_n: usize) -> Self {
        Self {
            base: ScorerBase::new(KIND, at_n),
        }
    }
}

impl Scorer for RecallAtN {
    fn base(&self) -> &ScorerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScorerBase {
        &mut self.base
    }

    fn compute(&self, judgments: &Judgments, results: &SearchResultSet) -> f64 {
        if judgments.judgment_count() == 0 {
            return 0.0;
        }
        let hits = results
            .ids()
            .iter()
            .take(self.base.at_n())
            .filter(|id| judgments.contains_judgment(id))
            .count();
        hits as f64 / judgments.judgment_count() as f64
    }
}

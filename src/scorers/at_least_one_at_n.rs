//! Did anything judged make the first page?

use crate::judgments::Judgments;
use crate::scorers::{Scorer, ScorerBase};
use crate::search::SearchResultSet;

pub const KIND: &str = "atLeastOneAtN";

/// 1.0 when any of the first `min(n, len)` returned ids carries a judgment,
/// else 0.0. A coarse success indicator for navigational-style queries.
#[derive(Debug)]
pub struct AtLeastOneAtN {
    base: ScorerBase,
}

impl AtLeastOneAtN {
    pub fn new(at_n: usize) -> Self {
        Self {
            base: ScorerBase::new(KIND, at_n),
        }
    }
}

impl Scorer for AtLeastOneAtN {
    fn base(&self) -> &ScorerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ScorerBase {
        &mut self.base
    }

    fn compute(&self, judgments: &Judgments, results: &SearchResultSet) -> f64 {
        let hit = results
            .ids()
            .iter()
            .take(self.base.at_n())
            .any(|id| judgments.contains_judgment(id));
        if hit {
            1.0
        } else {
            0.0
        }
    }
}

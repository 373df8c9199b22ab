//! # Scorers
//!
//! A scorer turns one query's judgments plus the ranked result set returned
//! for that query into a scalar. Scores accumulate into per-query
//! distributions, split by role (training vs. testing), for aggregate
//! reporting.
//!
//! All scorers share two contracts: inputs are never mutated, and an empty
//! result set scores the [`ERROR_VALUE`] sentinel — the configuration that
//! returned nothing is maximally penalized instead of being excluded from
//! ranking.

pub mod at_least_one_at_n;
pub mod collector;
pub mod precision_at_n;
pub mod recall_at_n;

pub use at_least_one_at_n::AtLeastOneAtN;
pub use collector::{ScoreCollector, ScoreRole};
pub use precision_at_n::PrecisionAtN;
pub use recall_at_n::RecallAtN;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TuneError};
use crate::judgments::Judgments;
use crate::search::SearchResultSet;

/// Sentinel recorded when a configuration produced no results for a judged
/// query: the maximum representable score, treated as "maximum possible
/// error" by every aggregation.
pub const ERROR_VALUE: f64 = f64::MAX;

/// Common state shared by every scorer variant: identity, role flags, free
/// parameters, and the per-query score ledger.
#[derive(Debug)]
pub struct ScorerBase {
    kind: String,
    at_n: usize,
    use_for_train: bool,
    use_for_test: bool,
    export_p_matrix: bool,
    params: BTreeMap<String, String>,
    collector: ScoreCollector,
}

impl ScorerBase {
    pub fn new(kind: &str, at_n: usize) -> Self {
        Self {
            kind: kind.to_string(),
            at_n,
            use_for_train: false,
            use_for_test: false,
            export_p_matrix: false,
            params: BTreeMap::new(),
            collector: ScoreCollector::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn at_n(&self) -> usize {
        self.at_n
    }

    pub fn collector(&self) -> &ScoreCollector {
        &self.collector
    }

    pub fn set_use_for_train(&mut self) {
        self.use_for_train = true;
    }

    pub fn set_use_for_test(&mut self) {
        self.use_for_test = true;
    }

    pub fn set_export_p_matrix(&mut self) {
        self.export_p_matrix = true;
    }

    pub fn set_params(&mut self, params: BTreeMap<String, String>) {
        self.params = params;
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

/// A pluggable relevance metric.
///
/// Implementors provide the pure metric in [`Scorer::compute`]; the shared
/// empty-result sentinel handling and score recording live in the default
/// [`Scorer::score`].
pub trait Scorer: Send + Sync + fmt::Debug {
    fn base(&self) -> &ScorerBase;

    fn base_mut(&mut self) -> &mut ScorerBase;

    /// The pure metric over a non-empty result set.
    fn compute(&self, judgments: &Judgments, results: &SearchResultSet) -> f64;

    /// Scores one (query, result set) pair and records the value into the
    /// per-query distribution for `role`.
    fn score(&self, role: ScoreRole, judgments: &Judgments, results: &SearchResultSet) -> f64 {
        let value = if results.is_empty() {
            ERROR_VALUE
        } else {
            self.compute(judgments, results)
        };
        self.base()
            .collector
            .record(role, judgments.query_info(), value);
        value
    }

    /// Records a value directly, bypassing the metric; used when a
    /// connector failure must land as the sentinel for one query.
    fn record(&self, role: ScoreRole, query_info: &crate::judgments::QueryInfo, value: f64) {
        self.base().collector.record(role, query_info, value);
    }

    /// Display name, e.g. `precisionAtN@10`.
    fn name(&self) -> String {
        format!("{}@{}", self.base().kind(), self.base().at_n())
    }

    fn at_n(&self) -> usize {
        self.base().at_n()
    }

    fn use_for_train(&self) -> bool {
        self.base().use_for_train
    }

    fn use_for_test(&self) -> bool {
        self.base().use_for_test
    }

    fn export_p_matrix(&self) -> bool {
        self.base().export_p_matrix
    }

    /// The serializable registration for this scorer.
    fn spec(&self) -> ScorerSpec {
        let base = self.base();
        ScorerSpec {
            scorer: base.kind.clone(),
            at_n: base.at_n,
            use_for_train: base.use_for_train,
            use_for_test: base.use_for_test,
            export_p_matrix: base.export_p_matrix,
            params: base.params.clone(),
        }
    }
}

/// A scorer registration as it appears in configuration files and the
/// experiment store. `build` resolves the kind against the closed set of
/// known variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorerSpec {
    pub scorer: String,
    #[serde(default)]
    pub at_n: usize,
    #[serde(default)]
    pub use_for_train: bool,
    #[serde(default)]
    pub use_for_test: bool,
    #[serde(default)]
    pub export_p_matrix: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ScorerSpec {
    pub fn new(scorer: &str, at_n: usize) -> Self {
        Self {
            scorer: scorer.to_string(),
            at_n,
            use_for_train: false,
            use_for_test: false,
            export_p_matrix: false,
            params: BTreeMap::new(),
        }
    }

    /// Instantiates the scorer this spec names.
    pub fn build(&self) -> Result<Box<dyn Scorer>> {
        let mut scorer: Box<dyn Scorer> = match self.scorer.as_str() {
            precision_at_n::KIND => Box::new(PrecisionAtN::new(self.at_n)),
            at_least_one_at_n::KIND => Box::new(AtLeastOneAtN::new(self.at_n)),
            recall_at_n::KIND => Box::new(RecallAtN::new(self.at_n)),
            other => {
                return Err(TuneError::Configuration(format!(
                    "unknown scorer kind '{}'",
                    other
                )))
            }
        };
        let base = scorer.base_mut();
        if self.use_for_train {
            base.set_use_for_train();
        }
        if self.use_for_test {
            base.set_use_for_test();
        }
        if self.export_p_matrix {
            base.set_export_p_matrix();
        }
        base.set_params(self.params.clone());
        Ok(scorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_round_trips_through_a_scorer() {
        let mut spec = ScorerSpec::new(precision_at_n::KIND, 10);
        spec.use_for_train = true;
        let scorer = spec.build().unwrap();
        assert!(scorer.use_for_train());
        assert!(!scorer.use_for_test());
        assert_eq!(scorer.spec(), spec);
    }

    #[test]
    fn unknown_scorer_kind_fails() {
        assert!(ScorerSpec::new("meanAveragePrecision", 10).build().is_err());
    }
}

//! # Query Model
//!
//! A closed set of query variants with an explicit `"type"` discriminator.
//! The user's query string is transient: it is injected per judged query at
//! evaluation time and never serialized with an experiment, so a stored
//! experiment describes *how* to search, not *what* was searched.
//!
//! A `Query` held by an [`crate::experiment::Experiment`] acts as a shared
//! template across parallel evaluations; callers must work on
//! [`Query::deep_copy`] results, never on the canonical instance.

use serde::{Deserialize, Serialize};

use crate::features::{FloatFeature, WeightableListFeature};

/// Names of the tunable feature slots an edismax-style query exposes.
pub const QF: &str = "qf";
pub const PF: &str = "pf";
pub const TIE: &str = "tie";
pub const MM: &str = "mm";

/// A structured boolean/edismax-style query with tunable boost features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EDisMaxQuery {
    /// Transient user query; filled in per judged query at evaluation time.
    #[serde(skip)]
    query_string: String,
    qf: WeightableListFeature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pf: Option<WeightableListFeature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tie: Option<FloatFeature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mm: Option<FloatFeature>,
}

impl EDisMaxQuery {
    pub fn new(query_string: &str) -> Self {
        Self {
            query_string: query_string.to_string(),
            qf: WeightableListFeature::new(QF),
            pf: None,
            tie: None,
            mm: None,
        }
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn qf(&self) -> &WeightableListFeature {
        &self.qf
    }

    pub fn qf_mut(&mut self) -> &mut WeightableListFeature {
        &mut self.qf
    }

    pub fn set_qf(&mut self, qf: WeightableListFeature) {
        self.qf = qf;
    }

    pub fn pf(&self) -> Option<&WeightableListFeature> {
        self.pf.as_ref()
    }

    pub fn set_pf(&mut self, pf: WeightableListFeature) {
        self.pf = Some(pf);
    }

    pub fn tie(&self) -> Option<&FloatFeature> {
        self.tie.as_ref()
    }

    pub fn set_tie(&mut self, tie: FloatFeature) {
        self.tie = Some(tie);
    }

    pub fn mm(&self) -> Option<&FloatFeature> {
        self.mm.as_ref()
    }

    pub fn set_mm(&mut self, mm: FloatFeature) {
        self.mm = Some(mm);
    }
}

/// A query executable through the search connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Matches the whole collection (`*:*`).
    MatchAll,
    /// Id-set lookup over a single field; used by the contrast analyzer to
    /// restrict faceting to the judged document set.
    Terms { field: String, terms: Vec<String> },
    /// A literal query string against a default field; the shape of filter
    /// queries.
    Lucene {
        default_field: String,
        query_string: String,
    },
    /// Structured query with tunable boosts.
    #[serde(rename = "edismax")]
    EDisMax(EDisMaxQuery),
}

impl Query {
    /// An independent copy safe for exclusive use by one evaluator.
    pub fn deep_copy(&self) -> Query {
        self.clone()
    }

    /// Injects the user query string. Variants without a free query slot
    /// (match-all, term sets) ignore it.
    pub fn set_query_string(&mut self, query_string: &str) {
        match self {
            Query::MatchAll | Query::Terms { .. } => {}
            Query::Lucene {
                query_string: qs, ..
            } => *qs = query_string.to_string(),
            Query::EDisMax(q) => q.query_string = query_string.to_string(),
        }
    }

    pub fn query_string(&self) -> Option<&str> {
        match self {
            Query::MatchAll | Query::Terms { .. } => None,
            Query::Lucene { query_string, .. } => Some(query_string),
            Query::EDisMax(q) => Some(&q.query_string),
        }
    }

    /// The tunable list feature in the named slot, if this variant has one.
    pub fn list_feature(&self, name: &str) -> Option<&WeightableListFeature> {
        match self {
            Query::EDisMax(q) => match name {
                QF => Some(q.qf()),
                PF => q.pf(),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set_list_feature(&mut self, name: &str, feature: WeightableListFeature) {
        if let Query::EDisMax(q) = self {
            match name {
                QF => q.set_qf(feature),
                PF => q.set_pf(feature),
                _ => {}
            }
        }
    }

    /// The tunable scalar feature in the named slot, if present.
    pub fn float_feature(&self, name: &str) -> Option<&FloatFeature> {
        match self {
            Query::EDisMax(q) => match name {
                TIE => q.tie(),
                MM => q.mm(),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set_float_feature(&mut self, name: &str, feature: FloatFeature) {
        if let Query::EDisMax(q) = self {
            match name {
                TIE => q.set_tie(feature),
                MM => q.set_mm(feature),
                _ => {}
            }
        }
    }

    /// Every tunable feature of this query behind the closed [`Feature`]
    /// view, in slot order.
    pub fn features(&self) -> Vec<crate::features::Feature> {
        use crate::features::Feature;
        let mut features = Vec::new();
        if let Query::EDisMax(q) = self {
            features.push(Feature::WeightableList(q.qf().clone()));
            if let Some(pf) = q.pf() {
                features.push(Feature::WeightableList(pf.clone()));
            }
            if let Some(tie) = q.tie() {
                features.push(Feature::Float(tie.clone()));
            }
            if let Some(mm) = q.mm() {
                features.push(Feature::Float(mm.clone()));
            }
        }
        features
    }

    /// Perturbs every tunable feature of this query in place.
    pub fn mutate(
        &mut self,
        amplitude: f64,
        rng: &mut crate::rng::RandomNumberGenerator,
    ) -> crate::error::Result<()> {
        if let Query::EDisMax(q) = self {
            q.qf.mutate(amplitude, rng)?;
            if let Some(pf) = q.pf.as_mut() {
                pf.mutate(amplitude, rng)?;
            }
            if let Some(tie) = q.tie.as_mut() {
                tie.mutate(amplitude, rng)?;
            }
            if let Some(mm) = q.mm.as_mut() {
                mm.mutate(amplitude, rng)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::WeightableField;

    #[test]
    fn query_string_is_transient() {
        let mut q = EDisMaxQuery::new("actualQuery");
        q.qf_mut().add(WeightableField::parse("f1^2").unwrap());
        let query = Query::EDisMax(q);

        let json = serde_json::to_string(&query).unwrap();
        assert!(!json.contains("actualQuery"));
        let revived: Query = serde_json::from_str(&json).unwrap();

        let mut expected = query.deep_copy();
        expected.set_query_string("");
        assert_eq!(expected, revived);
    }

    #[test]
    fn discriminator_tags_each_variant() {
        let json = serde_json::to_string(&Query::MatchAll).unwrap();
        assert!(json.contains("\"match_all\""));
        let json = serde_json::to_string(&Query::Lucene {
            default_field: "text".to_string(),
            query_string: "fq1".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"lucene\""));
        let json = serde_json::to_string(&Query::EDisMax(EDisMaxQuery::new(""))).unwrap();
        assert!(json.contains("\"edismax\""));
    }

    #[test]
    fn features_view_and_mutation_cover_every_slot() {
        use crate::features::{Feature, FloatFeature};
        use crate::rng::RandomNumberGenerator;

        let mut q = EDisMaxQuery::new("");
        q.qf_mut().add(WeightableField::free("title", 2.0));
        q.set_tie(FloatFeature::new("tie", 0.1, 0.0, 1.0));
        let mut query = Query::EDisMax(q);

        let features = query.features();
        assert_eq!(features.len(), 2);
        assert!(matches!(features[0], Feature::WeightableList(_)));
        assert!(matches!(features[1], Feature::Float(_)));

        let mut rng = RandomNumberGenerator::from_seed(4);
        query.mutate(0.0, &mut rng).unwrap();
        // amplitude 0 collapses every free weight to its range midpoint
        let qf = query.list_feature(QF).unwrap();
        assert_eq!(qf.weight_of("title"), Some(5.0));
        let tie = query.float_feature(TIE).unwrap();
        assert!((tie.value() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn deep_copy_is_independent() {
        let q = Query::EDisMax(EDisMaxQuery::new("q"));
        let mut copy = q.deep_copy();
        copy.set_query_string("other");
        assert_eq!(q.query_string(), Some("q"));
        assert_eq!(copy.query_string(), Some("other"));
    }
}

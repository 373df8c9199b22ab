//! # Experiment Configuration
//!
//! Parses a structured JSON document into everything a tuning run needs:
//! the GA parameters, the tunable feature spaces (field universes, weight
//! palettes, scalar knobs), scorer registrations with their train/test
//! roles, and optional seed experiments that bypass random generation so a
//! known baseline is always evaluated.
//!
//! The parsed [`ExperimentFactory`] is also where genotype-level operators
//! (random, crossover, mutation) are composed into whole experiments.

use serde::Deserialize;
use std::io::Read;

use crate::error::{Result, TuneError};
use crate::experiment::{Experiment, GAConfig, ServerConnection};
use crate::features::factories::{
    FeatureFactory, FloatFeatureFactory, WeightableListFeatureFactory, UNBOUNDED_SET_SIZE,
};
use crate::query::{EDisMaxQuery, Query, MM, PF, QF, TIE};
use crate::rng::RandomNumberGenerator;
use crate::scorers::{Scorer, ScorerSpec};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListFactoryConfig {
    fields: Vec<String>,
    default_weights: Vec<f32>,
    min_set_size: i32,
    max_set_size: i32,
}

impl Default for ListFactoryConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            default_weights: Vec::new(),
            min_set_size: 1,
            max_set_size: UNBOUNDED_SET_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FloatFactoryConfig {
    values: Vec<f32>,
    min: f32,
    max: f32,
}

impl Default for FloatFactoryConfig {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            min: 0.0,
            max: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFeaturesConfig {
    qf: ListFactoryConfig,
    #[serde(default)]
    pf: Option<ListFactoryConfig>,
    #[serde(default)]
    tie: Option<FloatFactoryConfig>,
    #[serde(default)]
    mm: Option<FloatFactoryConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    ga_config: GAConfig,
    server_url: String,
    #[serde(default)]
    custom_handler: Option<String>,
    query_features: QueryFeaturesConfig,
    #[serde(default)]
    filter_queries: Vec<Query>,
    scorers: Vec<ScorerSpec>,
    #[serde(default)]
    experiments: Vec<Experiment>,
}

/// Parsed run configuration plus the genotype operators over it.
pub struct ExperimentFactory {
    ga_config: GAConfig,
    server: ServerConnection,
    custom_handler: Option<String>,
    qf: WeightableListFeatureFactory,
    pf: Option<WeightableListFeatureFactory>,
    tie: Option<FloatFeatureFactory>,
    mm: Option<FloatFeatureFactory>,
    filter_queries: Vec<Query>,
    scorers: Vec<Box<dyn Scorer>>,
    seed_experiments: Vec<Experiment>,
}

impl ExperimentFactory {
    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Fails fast on malformed JSON, invalid factory bounds, invalid GA
    /// parameters, unknown scorer kinds, and an ambiguous training role
    /// (more than one scorer flagged `useForTrain`).
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let raw: RawConfig = serde_json::from_reader(reader)?;
        raw.ga_config.validate()?;

        let qf = list_factory(QF, &raw.query_features.qf)?;
        let pf = raw
            .query_features
            .pf
            .as_ref()
            .map(|c| list_factory(PF, c))
            .transpose()?;
        let tie = raw
            .query_features
            .tie
            .as_ref()
            .map(|c| FloatFeatureFactory::new(TIE, c.values.clone(), c.min, c.max))
            .transpose()?;
        let mm = raw
            .query_features
            .mm
            .as_ref()
            .map(|c| FloatFeatureFactory::new(MM, c.values.clone(), c.min, c.max))
            .transpose()?;

        let scorers: Vec<Box<dyn Scorer>> = raw
            .scorers
            .iter()
            .map(ScorerSpec::build)
            .collect::<Result<_>>()?;
        let train_count = scorers.iter().filter(|s| s.use_for_train()).count();
        if train_count > 1 {
            return Err(TuneError::Configuration(format!(
                "{} scorers are flagged useForTrain; exactly one may drive selection",
                train_count
            )));
        }

        Ok(Self {
            ga_config: raw.ga_config,
            server: ServerConnection::new(&raw.server_url),
            custom_handler: raw.custom_handler,
            qf,
            pf,
            tie,
            mm,
            filter_queries: raw.filter_queries,
            scorers,
            seed_experiments: raw.experiments,
        })
    }

    pub fn ga_config(&self) -> &GAConfig {
        &self.ga_config
    }

    pub fn server(&self) -> &ServerConnection {
        &self.server
    }

    pub fn scorers(&self) -> &[Box<dyn Scorer>] {
        &self.scorers
    }

    /// The single scorer driving selection pressure.
    ///
    /// # Errors
    ///
    /// No registered train scorer is a fatal configuration error at run
    /// time (an ambiguous registration was already rejected at parse time).
    pub fn train_scorer(&self) -> Result<&dyn Scorer> {
        self.scorers
            .iter()
            .find(|s| s.use_for_train())
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                TuneError::Configuration(
                    "no scorer is flagged useForTrain; selection is undefined".to_string(),
                )
            })
    }

    /// Scorers reported on the held-out fold.
    pub fn test_scorers(&self) -> Vec<&dyn Scorer> {
        self.scorers
            .iter()
            .filter(|s| s.use_for_test())
            .map(|s| s.as_ref())
            .collect()
    }

    pub fn seed_experiments(&self) -> &[Experiment] {
        &self.seed_experiments
    }

    /// Every configured feature space behind the object-safe view.
    pub fn feature_factories(&self) -> Vec<&dyn FeatureFactory> {
        let mut factories: Vec<&dyn FeatureFactory> = vec![&self.qf];
        if let Some(pf) = &self.pf {
            factories.push(pf);
        }
        if let Some(tie) = &self.tie {
            factories.push(tie);
        }
        if let Some(mm) = &self.mm {
            factories.push(mm);
        }
        factories
    }

    /// Builds a fully random candidate.
    pub fn random_experiment(&self, name: &str, rng: &mut RandomNumberGenerator) -> Experiment {
        let mut query = EDisMaxQuery::new("");
        query.set_qf(self.qf.random(rng));
        if let Some(pf) = &self.pf {
            query.set_pf(pf.random(rng));
        }
        if let Some(tie) = &self.tie {
            query.set_tie(tie.random(rng));
        }
        if let Some(mm) = &self.mm {
            query.set_mm(mm.random(rng));
        }
        self.wrap(name, Query::EDisMax(query))
    }

    /// Deterministically enumerates up to `max_count` distinct candidates
    /// over the qf space, holding the scalar knobs at their first palette
    /// value. Supports exhaustive search over small feature spaces.
    pub fn permute_experiments(&self, max_count: usize) -> Vec<Experiment> {
        self.qf
            .permute(max_count)
            .into_iter()
            .enumerate()
            .map(|(i, qf)| {
                let mut query = EDisMaxQuery::new("");
                query.set_qf(qf);
                if let Some(tie) = &self.tie {
                    if let Some(first) = tie.permute(1).into_iter().next() {
                        query.set_tie(first);
                    }
                }
                if let Some(mm) = &self.mm {
                    if let Some(first) = mm.permute(1).into_iter().next() {
                        query.set_mm(first);
                    }
                }
                self.wrap(&format!("permutation_{}", i), Query::EDisMax(query))
            })
            .collect()
    }

    /// Combines two parents' feature sets into a child experiment.
    pub fn crossover(
        &self,
        name: &str,
        a: &Experiment,
        b: &Experiment,
        rng: &mut RandomNumberGenerator,
    ) -> Experiment {
        let qa = a.query();
        let qb = b.query();
        let mut child = EDisMaxQuery::new("");

        let empty = crate::features::WeightableListFeature::new(QF);
        let qfa = qa.list_feature(QF).unwrap_or(&empty);
        let qfb = qb.list_feature(QF).unwrap_or(&empty);
        child.set_qf(self.qf.crossover(qfa, qfb, rng));

        if let Some(pf_factory) = &self.pf {
            match (qa.list_feature(PF), qb.list_feature(PF)) {
                (Some(pa), Some(pb)) => child.set_pf(pf_factory.crossover(pa, pb, rng)),
                (Some(p), None) | (None, Some(p)) => child.set_pf(p.clone()),
                (None, None) => {}
            }
        }
        if let Some(tie_factory) = &self.tie {
            match (qa.float_feature(TIE), qb.float_feature(TIE)) {
                (Some(ta), Some(tb)) => child.set_tie(tie_factory.crossover(ta, tb, rng)),
                (Some(t), None) | (None, Some(t)) => child.set_tie(t.clone()),
                (None, None) => {}
            }
        }
        if let Some(mm_factory) = &self.mm {
            match (qa.float_feature(MM), qb.float_feature(MM)) {
                (Some(ma), Some(mb)) => child.set_mm(mm_factory.crossover(ma, mb, rng)),
                (Some(m), None) | (None, Some(m)) => child.set_mm(m.clone()),
                (None, None) => {}
            }
        }
        self.wrap(name, Query::EDisMax(child))
    }

    /// Copies a parent and perturbs its weights.
    pub fn mutate(
        &self,
        name: &str,
        parent: &Experiment,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Experiment> {
        let mut query = parent.query();
        if let Query::EDisMax(q) = &mut query {
            let mut qf = q.qf().clone();
            self.qf.mutate(&mut qf, amplitude, rng)?;
            q.set_qf(qf);
            if let (Some(factory), Some(pf)) = (&self.pf, q.pf()) {
                let mut pf = pf.clone();
                factory.mutate(&mut pf, amplitude, rng)?;
                q.set_pf(pf);
            }
            if let (Some(factory), Some(tie)) = (&self.tie, q.tie()) {
                let mut tie = tie.clone();
                factory.mutate(&mut tie, amplitude, rng)?;
                q.set_tie(tie);
            }
            if let (Some(factory), Some(mm)) = (&self.mm, q.mm()) {
                let mut mm = mm.clone();
                factory.mutate(&mut mm, amplitude, rng)?;
                q.set_mm(mm);
            }
        }
        Ok(self.wrap(name, query))
    }

    fn wrap(&self, name: &str, query: Query) -> Experiment {
        let mut experiment = Experiment::with_custom_handler(
            name,
            self.server.clone(),
            self.custom_handler.clone(),
            query,
        );
        experiment.add_filter_queries(self.filter_queries.clone());
        experiment
    }
}

fn list_factory(name: &str, config: &ListFactoryConfig) -> Result<WeightableListFeatureFactory> {
    WeightableListFeatureFactory::new(
        name,
        &config.fields,
        config.default_weights.clone(),
        config.min_set_size,
        config.max_set_size,
    )
}

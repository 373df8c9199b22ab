//! # Experiments
//!
//! An experiment is one candidate search configuration: a server, an
//! optional custom handler, a tunable query, and literal filter queries.
//! Within the optimizer, one experiment is one GA individual's phenotype.

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::{Result, TuneError};
use crate::query::Query;

/// Connection coordinates for a search server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConnection {
    url: String,
}

impl ServerConnection {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One candidate search configuration.
///
/// The canonical query is never handed out: [`Experiment::query`] always
/// returns a fresh deep copy, so concurrent evaluators can never observe or
/// mutate the template another evaluator is using.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    name: String,
    server_connection: ServerConnection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_handler: Option<String>,
    query: Query,
    #[serde(default)]
    filter_queries: Vec<Query>,
}

impl Experiment {
    pub fn new(name: &str, server_connection: ServerConnection, query: Query) -> Self {
        Self {
            name: name.to_string(),
            server_connection,
            custom_handler: None,
            query,
            filter_queries: Vec::new(),
        }
    }

    pub fn with_custom_handler(
        name: &str,
        server_connection: ServerConnection,
        custom_handler: Option<String>,
        query: Query,
    ) -> Self {
        Self {
            name: name.to_string(),
            server_connection,
            custom_handler,
            query,
            filter_queries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn server_connection(&self) -> &ServerConnection {
        &self.server_connection
    }

    pub fn custom_handler(&self) -> Option<&str> {
        self.custom_handler.as_deref()
    }

    /// A deep copy of the canonical query, safe for exclusive use by a
    /// single evaluation thread.
    pub fn query(&self) -> Query {
        self.query.deep_copy()
    }

    /// Replaces the canonical query; used by the genetic operators when
    /// building offspring.
    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    pub fn filter_queries(&self) -> &[Query] {
        &self.filter_queries
    }

    pub fn add_filter_queries<I: IntoIterator<Item = Query>>(&mut self, queries: I) {
        self.filter_queries.extend(queries);
    }

    pub fn deep_copy(&self) -> Experiment {
        self.clone()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Experiment> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A named, insertion-ordered collection of experiments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSet {
    experiments: Vec<Experiment>,
}

impl ExperimentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an experiment; a repeated name replaces the previous entry.
    pub fn add(&mut self, experiment: Experiment) {
        if let Some(existing) = self
            .experiments
            .iter_mut()
            .find(|e| e.name() == experiment.name())
        {
            *existing = experiment;
        } else {
            self.experiments.push(experiment);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.name() == name)
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

/// Parameters of the evolutionary run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GAConfig {
    pub num_threads: usize,
    pub id_field: String,
    pub generations: usize,
    pub n_folds: usize,
    pub population: usize,
    pub mutation_amplitude: f64,
    pub mutation_probability: f64,
    pub crossover_probability: f64,
    pub reproduction_probability: f64,
    /// Seed for the run's random generator; absent means seed from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GAConfig {
    fn default() -> Self {
        Self {
            num_threads: 8,
            id_field: "id".to_string(),
            generations: 10,
            n_folds: 2,
            population: 20,
            mutation_amplitude: 0.8,
            mutation_probability: 0.3,
            crossover_probability: 0.5,
            reproduction_probability: 0.2,
            seed: None,
        }
    }
}

impl GAConfig {
    /// Validates the configuration before any evaluation starts.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(TuneError::Configuration(
                "numThreads must be >= 1".to_string(),
            ));
        }
        if self.population == 0 {
            return Err(TuneError::Configuration(
                "population must be >= 1".to_string(),
            ));
        }
        if self.generations == 0 {
            return Err(TuneError::Configuration(
                "generations must be >= 1".to_string(),
            ));
        }
        if self.n_folds == 0 {
            return Err(TuneError::Configuration("nFolds must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.mutation_amplitude) {
            return Err(TuneError::Configuration(format!(
                "mutationAmplitude must be within [0, 1], got {}",
                self.mutation_amplitude
            )));
        }
        self.operator_probabilities().map(|_| ())
    }

    /// The {reproduction, crossover, mutation} distribution, normalized
    /// against its sum when the three probabilities do not sum to 1.
    pub fn operator_probabilities(&self) -> Result<[f64; 3]> {
        let raw = [
            self.reproduction_probability,
            self.crossover_probability,
            self.mutation_probability,
        ];
        if raw.iter().any(|p| *p < 0.0 || !p.is_finite()) {
            return Err(TuneError::Configuration(
                "operator probabilities must be non-negative".to_string(),
            ));
        }
        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            return Err(TuneError::Configuration(
                "at least one operator probability must be positive".to_string(),
            ));
        }
        Ok([raw[0] / sum, raw[1] / sum, raw[2] / sum])
    }
}

/// Reads a GAConfig from a JSON document.
pub fn read_ga_config<R: Read>(reader: R) -> Result<GAConfig> {
    let config: GAConfig = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::WeightableField;
    use crate::query::{EDisMaxQuery, Query};

    #[test]
    fn experiment_hands_out_independent_query_copies() {
        let mut q = EDisMaxQuery::new("");
        q.qf_mut().add(WeightableField::parse("title^2").unwrap());
        let experiment = Experiment::new(
            "test1",
            ServerConnection::new("http://localhost:8983/solr/test"),
            Query::EDisMax(q),
        );
        let mut copy = experiment.query();
        copy.set_query_string("mutated");
        assert_eq!(experiment.query().query_string(), Some(""));
    }

    #[test]
    fn experiment_json_round_trip() {
        let mut q = EDisMaxQuery::new("transient");
        q.qf_mut().add(WeightableField::parse("f1^2").unwrap());
        let mut experiment =
            Experiment::new("test1", ServerConnection::new("http://solr"), Query::EDisMax(q));
        experiment.add_filter_queries(vec![Query::Lucene {
            default_field: "defaultField".to_string(),
            query_string: "fq1".to_string(),
        }]);

        let json = experiment.to_json().unwrap();
        let revived = Experiment::from_json(&json).unwrap();
        assert_eq!(revived.name(), "test1");
        assert_eq!(revived.server_connection().url(), "http://solr");
        assert_eq!(revived.filter_queries().len(), 1);
        // the query string is transient and not serialized
        assert_eq!(revived.query().query_string(), Some(""));
    }

    #[test]
    fn set_replaces_by_name() {
        let mk = |name: &str, url: &str| {
            Experiment::new(name, ServerConnection::new(url), Query::MatchAll)
        };
        let mut set = ExperimentSet::new();
        set.add(mk("a", "http://one"));
        set.add(mk("b", "http://two"));
        set.add(mk("a", "http://three"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").unwrap().server_connection().url(), "http://three");
    }

    #[test]
    fn ga_config_parses_camel_case() {
        let raw = r#"{
            "numThreads": 20,
            "idField": "customIdField",
            "generations": 100,
            "nFolds": 2,
            "population": 50,
            "mutationAmplitude": 0.001,
            "mutationProbability": 0.2,
            "crossoverProbability": 0.1,
            "reproductionProbability": 0.7
        }"#;
        let config = read_ga_config(raw.as_bytes()).unwrap();
        assert_eq!(config.num_threads, 20);
        assert_eq!(config.id_field, "customIdField");
        assert_eq!(config.generations, 100);
        assert_eq!(config.n_folds, 2);
        assert_eq!(config.population, 50);
        assert!((config.mutation_amplitude - 0.001).abs() < 1e-9);
        assert!((config.mutation_probability - 0.2).abs() < 1e-9);
        assert!((config.crossover_probability - 0.1).abs() < 1e-9);
        assert!((config.reproduction_probability - 0.7).abs() < 1e-9);
    }

    #[test]
    fn operator_probabilities_normalize_against_their_sum() {
        let config = GAConfig {
            reproduction_probability: 2.0,
            crossover_probability: 1.0,
            mutation_probability: 1.0,
            ..GAConfig::default()
        };
        let [r, c, m] = config.operator_probabilities().unwrap();
        assert!((r - 0.5).abs() < 1e-9);
        assert!((c - 0.25).abs() < 1e-9);
        assert!((m - 0.25).abs() < 1e-9);
    }

    #[test]
    fn negative_probability_fails_validation() {
        let config = GAConfig {
            mutation_probability: -0.1,
            ..GAConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

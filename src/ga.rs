//! # Evolutionary Optimizer
//!
//! Owns the population of candidate experiments and the generational loop:
//! evaluate every candidate against every training-fold query, select
//! parents under fitness-proportionate pressure, and produce the next
//! generation through reproduction, crossover, and mutation drawn from the
//! configured operator distribution.
//!
//! ## Concurrency
//!
//! Evaluation is embarrassingly parallel: (experiment, query) pairs run on
//! a rayon pool bounded by `GAConfig.num_threads`, each worker owning only
//! the deep-copied query it was assigned and writing into an
//! index-addressed result slot. All pairs complete before selection begins
//! (the generation barrier). Breeding happens on the control thread with
//! the run's single seeded generator, which is what makes fixed-seed runs
//! reproduce generation by generation.
//!
//! ## Failure semantics
//!
//! A connector failure on one pair scores the sentinel and evaluation
//! continues; a systemic failure ([`TuneError::Search`]) short-circuits the
//! parallel collect, aborts the generation, and surfaces to the caller.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::ExperimentFactory;
use crate::cross_validation::{self, Fold};
use crate::error::{Result, TuneError};
use crate::experiment::Experiment;
use crate::judgments::{JudgmentList, Judgments};
use crate::rng::RandomNumberGenerator;
use crate::scorers::{ScoreRole, Scorer, ERROR_VALUE};
use crate::search::{QueryRequest, SearchConnector, SearchResultSet};

/// Uniform floor added to every roulette weight so each individual keeps a
/// non-zero selection chance.
const SELECTION_FLOOR: f64 = 0.01;

/// How many duplicate random candidates to tolerate before accepting a
/// repeat while seeding generation 0.
const MAX_SEED_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy)]
enum Operator {
    Reproduction,
    Crossover,
    Mutation,
}

/// Outcome of one fold's optimization.
#[derive(Debug)]
pub struct GAResult {
    pub fold: usize,
    /// Final population ranked by held-out test fitness, best first.
    pub ranked: Vec<(Experiment, f64)>,
    /// Per-scorer weighted means of the best experiment on the test fold.
    pub test_means: BTreeMap<String, f64>,
    /// Per-query test scores of the best experiment, for every scorer that
    /// requested a matrix export.
    pub p_matrices: BTreeMap<String, BTreeMap<String, f64>>,
}

impl GAResult {
    pub fn best(&self) -> Option<&Experiment> {
        self.ranked.first().map(|(e, _)| e)
    }

    pub fn best_test_fitness(&self) -> Option<f64> {
        self.ranked.first().map(|(_, f)| *f)
    }
}

/// Drives the generational loop for every cross-validation fold.
pub struct GARunner<'a, C: SearchConnector> {
    factory: &'a ExperimentFactory,
    connector: &'a C,
}

impl<'a, C: SearchConnector> GARunner<'a, C> {
    pub fn new(factory: &'a ExperimentFactory, connector: &'a C) -> Self {
        Self { factory, connector }
    }

    /// Runs the full optimization: fold split, generational loop per fold,
    /// and held-out reporting.
    pub fn run(&self, judgments: &JudgmentList) -> Result<Vec<GAResult>> {
        let config = self.factory.ga_config();
        config.validate()?;
        let train_scorer = self.factory.train_scorer()?;

        let mut rng = match config.seed {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| TuneError::Configuration(format!("failed to build thread pool: {}", e)))?;

        let folds = cross_validation::split(judgments, config.n_folds, &mut rng)?;
        let mut results = Vec::with_capacity(folds.len());
        for (fold_idx, fold) in folds.iter().enumerate() {
            results.push(self.evolve_fold(fold_idx, fold, &pool, train_scorer, &mut rng)?);
        }
        Ok(results)
    }

    fn evolve_fold(
        &self,
        fold_idx: usize,
        fold: &Fold,
        pool: &rayon::ThreadPool,
        train_scorer: &dyn Scorer,
        rng: &mut RandomNumberGenerator,
    ) -> Result<GAResult> {
        let config = self.factory.ga_config();
        let mut population = self.seed_population(rng)?;

        for generation in 0..config.generations {
            let fitness = self.evaluate_population(
                pool,
                &population,
                &fold.train,
                train_scorer,
                ScoreRole::Train,
            )?;
            let best = fitness.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = fitness.iter().sum::<f64>() / fitness.len() as f64;
            info!(fold = fold_idx, generation, best, mean, "generation evaluated");
            population = self.next_generation(&population, &fitness, generation + 1, rng)?;
        }

        self.report_fold(fold_idx, fold, pool, train_scorer, population)
    }

    /// Re-scores the final population on the held-out fold and records the
    /// winner's per-query distributions for every test scorer.
    fn report_fold(
        &self,
        fold_idx: usize,
        fold: &Fold,
        pool: &rayon::ThreadPool,
        train_scorer: &dyn Scorer,
        population: Vec<Experiment>,
    ) -> Result<GAResult> {
        let test_scorers = self.factory.test_scorers();
        let ranking_scorer: &dyn Scorer = test_scorers.first().copied().unwrap_or(train_scorer);
        let test_fitness = self.evaluate_population(
            pool,
            &population,
            &fold.test,
            ranking_scorer,
            ScoreRole::Test,
        )?;

        let mut ranked: Vec<(Experiment, f64)> =
            population.into_iter().zip(test_fitness).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.name().cmp(b.0.name())));

        let mut test_means = BTreeMap::new();
        let mut p_matrices = BTreeMap::new();
        if let Some((best, _)) = ranked.first() {
            for scorer in &test_scorers {
                scorer.base().collector().clear(ScoreRole::Test);
            }
            for judgments in fold.test.judgments() {
                match self.execute_pair(best, judgments) {
                    Ok(results) => {
                        for scorer in &test_scorers {
                            scorer.score(ScoreRole::Test, judgments, &results);
                        }
                    }
                    Err(TuneError::Search(msg)) => return Err(TuneError::Search(msg)),
                    Err(e) => {
                        warn!(
                            query = judgments.query_info().query_id(),
                            error = %e,
                            "scoring best experiment failed for one query"
                        );
                        for scorer in &test_scorers {
                            scorer.record(ScoreRole::Test, judgments.query_info(), ERROR_VALUE);
                        }
                    }
                }
            }
            for scorer in &test_scorers {
                if let Some(mean) = scorer.base().collector().mean(ScoreRole::Test) {
                    test_means.insert(scorer.name(), mean);
                }
                if scorer.export_p_matrix() {
                    p_matrices
                        .insert(scorer.name(), scorer.base().collector().scores(ScoreRole::Test));
                }
            }
            info!(
                fold = fold_idx,
                best = best.name(),
                "fold complete"
            );
        }

        Ok(GAResult {
            fold: fold_idx,
            ranked,
            test_means,
            p_matrices,
        })
    }

    /// Generation 0: externally supplied seeds first, then the exhaustive
    /// enumeration when the qf space fits the remaining slots, then random
    /// candidates (distinct by query where possible).
    fn seed_population(&self, rng: &mut RandomNumberGenerator) -> Result<Vec<Experiment>> {
        let config = self.factory.ga_config();
        let mut population: Vec<Experiment> = self
            .factory
            .seed_experiments()
            .iter()
            .take(config.population)
            .map(Experiment::deep_copy)
            .collect();

        let remaining = config.population - population.len();
        if remaining > 0 {
            let permutations = self.factory.permute_experiments(remaining + 1);
            if permutations.len() <= remaining {
                population.extend(permutations);
            }
        }

        let mut attempts = 0;
        while population.len() < config.population {
            let candidate = self
                .factory
                .random_experiment(&format!("gen0_{}", population.len()), rng);
            let duplicate = population.iter().any(|e| e.query() == candidate.query());
            if duplicate && attempts < MAX_SEED_ATTEMPTS {
                attempts += 1;
                continue;
            }
            population.push(candidate);
        }
        if population.is_empty() {
            return Err(TuneError::EmptyPopulation);
        }
        Ok(population)
    }

    /// Scores every (experiment, query) pair of the fold in parallel and
    /// reduces to one fitness scalar per experiment: the scorer's weighted
    /// mean, sentinels contributing 0.0.
    fn evaluate_population(
        &self,
        pool: &rayon::ThreadPool,
        population: &[Experiment],
        fold_queries: &JudgmentList,
        scorer: &dyn Scorer,
        role: ScoreRole,
    ) -> Result<Vec<f64>> {
        if population.is_empty() {
            return Err(TuneError::EmptyPopulation);
        }
        let queries = fold_queries.judgments();
        let pairs: Vec<(usize, usize)> = (0..population.len())
            .flat_map(|e| (0..queries.len()).map(move |q| (e, q)))
            .collect();

        let pair_scores: Vec<f64> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(e, q)| {
                    let judgments = &queries[q];
                    match self.execute_pair(&population[e], judgments) {
                        Ok(results) => Ok(scorer.score(role, judgments, &results)),
                        // systemic failure: short-circuit the whole generation
                        Err(TuneError::Search(msg)) => Err(TuneError::Search(msg)),
                        Err(err) => {
                            warn!(
                                experiment = population[e].name(),
                                query = judgments.query_info().query_id(),
                                error = %err,
                                "pair evaluation failed; scoring sentinel"
                            );
                            scorer.record(role, judgments.query_info(), ERROR_VALUE);
                            Ok(ERROR_VALUE)
                        }
                    }
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        let mut fitness = Vec::with_capacity(population.len());
        for e in 0..population.len() {
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for (q, judgments) in queries.iter().enumerate() {
                let score = pair_scores[e * queries.len() + q];
                let score = if score == ERROR_VALUE { 0.0 } else { score };
                let weight = judgments.query_info().weight();
                sum += score * weight;
                weight_sum += weight;
            }
            fitness.push(if weight_sum == 0.0 { 0.0 } else { sum / weight_sum });
        }
        Ok(fitness)
    }

    fn execute_pair(
        &self,
        experiment: &Experiment,
        judgments: &Judgments,
    ) -> Result<SearchResultSet> {
        let query_string = judgments
            .query_info()
            .query_strings()
            .query()
            .ok_or_else(|| {
                TuneError::Evaluation(format!(
                    "judged query '{}' has no query string",
                    judgments.query_info().query_id()
                ))
            })?;
        let mut query = experiment.query();
        query.set_query_string(query_string);
        let mut request = QueryRequest::new(query);
        request.add_field_to_retrieve(&self.factory.ga_config().id_field);
        request.add_filter_queries(experiment.filter_queries().to_vec());
        request.set_num_results(self.page_size());
        self.connector.execute(&request)
    }

    /// Enough results for the deepest registered scorer, with a sane floor.
    fn page_size(&self) -> usize {
        self.factory
            .scorers()
            .iter()
            .map(|s| s.at_n())
            .max()
            .unwrap_or(10)
            .max(10)
    }

    /// Fills the next generation by drawing an operator per slot from the
    /// configured distribution, selecting parents by roulette over
    /// floored fitness.
    fn next_generation(
        &self,
        population: &[Experiment],
        fitness: &[f64],
        generation: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<Experiment>> {
        let config = self.factory.ga_config();
        let [p_reproduction, p_crossover, _] = config.operator_probabilities()?;
        let weights: Vec<f64> = fitness.iter().map(|f| f + SELECTION_FLOOR).collect();

        let mut next = Vec::with_capacity(config.population);
        for slot in 0..config.population {
            let name = format!("gen{}_{}", generation, slot);
            let draw = rng.uniform_f32(0.0, 1.0) as f64;
            let operator = if draw < p_reproduction {
                Operator::Reproduction
            } else if draw < p_reproduction + p_crossover {
                Operator::Crossover
            } else {
                Operator::Mutation
            };
            let child = match operator {
                Operator::Reproduction => {
                    let mut parent = select(population, &weights, rng).deep_copy();
                    parent.set_name(&name);
                    parent
                }
                Operator::Crossover => {
                    let a = select(population, &weights, rng);
                    let b = select(population, &weights, rng);
                    self.factory.crossover(&name, a, b, rng)
                }
                Operator::Mutation => {
                    let parent = select(population, &weights, rng);
                    self.factory
                        .mutate(&name, parent, config.mutation_amplitude, rng)?
                }
            };
            next.push(child);
        }
        Ok(next)
    }
}

/// Roulette selection over pre-floored weights. Monotonic in fitness and
/// never zero-probability for any individual.
fn select<'p>(
    population: &'p [Experiment],
    weights: &[f64],
    rng: &mut RandomNumberGenerator,
) -> &'p Experiment {
    let total: f64 = weights.iter().sum();
    let mut r = rng.uniform_f32(0.0, total as f32) as f64;
    for (experiment, weight) in population.iter().zip(weights.iter()) {
        r -= weight;
        if r <= 0.0 {
            return experiment;
        }
    }
    // floating-point slack lands on the last individual
    &population[population.len() - 1]
}

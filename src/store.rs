//! # Experiment Store
//!
//! A durable mailbox for experiments, scorer registrations, and judgments
//! between runs. The store is a directory of JSON files; no query logic
//! lives here.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::experiment::{Experiment, ExperimentSet};
use crate::judgments::{JudgmentList, Judgments};
use crate::scorers::ScorerSpec;

const EXPERIMENTS_FILE: &str = "experiments.json";
const SCORERS_FILE: &str = "scorers.json";
const JUDGMENTS_FILE: &str = "judgments.json";

/// Directory-backed store of experiments, scorers, and judgments.
#[derive(Debug)]
pub struct ExperimentDB {
    dir: PathBuf,
    experiments: ExperimentSet,
    scorers: Vec<ScorerSpec>,
    judgments: JudgmentList,
}

impl ExperimentDB {
    /// Opens (or initializes) a store directory, loading any existing
    /// contents.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let experiments = read_or_default(&dir.join(EXPERIMENTS_FILE))?;
        let scorers = read_or_default(&dir.join(SCORERS_FILE))?;
        let judgments = read_or_default(&dir.join(JUDGMENTS_FILE))?;
        debug!(dir = %dir.display(), "opened experiment store");
        Ok(Self {
            dir,
            experiments,
            scorers,
            judgments,
        })
    }

    /// Adds an experiment, replacing any previous entry with the same name.
    pub fn add_experiment(&mut self, experiment: Experiment) -> Result<()> {
        self.experiments.add(experiment);
        self.write(EXPERIMENTS_FILE, &self.experiments)
    }

    /// Registers a scorer spec.
    pub fn add_scorer(&mut self, scorer: ScorerSpec) -> Result<()> {
        self.scorers.push(scorer);
        self.write(SCORERS_FILE, &self.scorers)
    }

    /// Adds one query's judgments, replacing a previous entry for the same
    /// query id.
    pub fn add_judgments(&mut self, judgments: Judgments) -> Result<()> {
        self.judgments.add(judgments);
        self.write(JUDGMENTS_FILE, &self.judgments)
    }

    pub fn experiments(&self) -> &ExperimentSet {
        &self.experiments
    }

    pub fn scorers(&self) -> &[ScorerSpec] {
        &self.scorers
    }

    pub fn judgments(&self) -> &JudgmentList {
        &self.judgments
    }

    /// Flushes all state to disk.
    pub fn close(&mut self) -> Result<()> {
        self.write(EXPERIMENTS_FILE, &self.experiments)?;
        self.write(SCORERS_FILE, &self.scorers)?;
        self.write(JUDGMENTS_FILE, &self.judgments)?;
        debug!(dir = %self.dir.display(), "closed experiment store");
        Ok(())
    }

    fn write<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn read_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

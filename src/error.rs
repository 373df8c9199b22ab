//! # Error Types
//!
//! This module defines the error types used throughout the crate. The
//! taxonomy follows the way failures are handled at run time:
//!
//! - [`TuneError::Configuration`] and [`TuneError::Judgment`] are detected
//!   before any evaluation starts and fail fast.
//! - [`TuneError::Evaluation`] marks a single (experiment, query) pair as
//!   failed; the optimizer absorbs it as a sentinel score and continues.
//! - [`TuneError::Search`] is a systemic connector failure (unreachable
//!   server, transport-level garbage) and aborts the run.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use ranktune::error::{Result, TuneError};
//!
//! fn parse_field(spec: &str) -> Result<()> {
//!     if spec.is_empty() {
//!         return Err(TuneError::Configuration("empty field spec".to_string()));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use ranktune::error::{Result, ResultExt};
//! use std::fs::File;
//!
//! fn open_config(path: &str) -> Result<File> {
//!     File::open(path).context("Failed to open experiment config")
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while tuning search relevance.
#[derive(Error, Debug)]
pub enum TuneError {
    /// Invalid configuration: GA probabilities, factory bounds, ambiguous
    /// scorer roles, malformed field specs. Detected before evaluation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed judgments input, duplicate document ids, bad grades.
    #[error("Judgment error: {0}")]
    Judgment(String),

    /// Systemic search connector failure. Fatal for the whole run.
    #[error("Search error: {0}")]
    Search(String),

    /// Failure while evaluating a single (experiment, query) pair.
    /// Recovered locally as the scorer's maximum-error sentinel.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The optimizer was asked to operate on an empty population.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// NaN or infinity where a finite score or weight was required.
    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for relevance-tuning operations.
pub type Result<T> = std::result::Result<T, TuneError>;

/// Extension trait for Result to add context to errors.
///
/// Converts any error into [`TuneError::Other`] with a message prefix, which
/// keeps call sites terse when crossing an external boundary (filesystem,
/// parser) whose error type has no dedicated variant.
pub trait ResultExt<T, E> {
    /// Adds context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| TuneError::Other(format!("{}: {}", context, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_foreign_errors() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = res.context("Failed to open judgments file").unwrap_err();
        assert!(err.to_string().contains("Failed to open judgments file"));
        assert!(err.to_string().contains("missing"));
    }
}

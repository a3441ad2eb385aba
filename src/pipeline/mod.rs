//! Species identification pipeline.
//!
//! One sample flows through: runner (unfiltered pass) -> estimator ->
//! runner (filtered pass) -> parser -> resolver -> report.

pub mod estimator;
pub mod parser;
pub mod processor;
pub mod report;
pub mod resolver;
pub mod runner;

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

pub use processor::{SampleOutcome, SampleProcessor};
pub use runner::MashRunner;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("'{0}' was not found on PATH. Is mash installed or loaded via module load?")]
    ExternalToolNotFound(String),

    #[error("'{program}' exited with {status}: {stderr}")]
    ExternalToolError {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Unexpected tool output format: {0}")]
    UnexpectedToolOutputFormat(String),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("No comparisons were returned by the distance tool")]
    EmptyResultSet,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Needletail parsing error: {0}")]
    NeedletailError(#[from] needletail::errors::ParseError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}

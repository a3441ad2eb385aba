//! Genome size / coverage estimate and the derived k-mer filter.
//!
//! When mash compares a read set (`dist -r`) it reports its own estimate of
//! the genome size and sequencing coverage on stderr:
//!
//! ```text
//! Estimated genome size: 3.4e+06
//! Estimated coverage:    27.000
//! ```
//!
//! The values are read by line position and a fixed 23 character label
//! width, and each line must carry its expected label. This module is the only place that knows that layout; if mash
//! changes it, `parse_diagnostics` fails with `UnexpectedToolOutputFormat`
//! instead of misreading a number.

use super::runner::{dist_args, CommandRunner};
use super::PipelineError;
use crate::config::{RunConfig, DEFAULT_MIN_KMER};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Width of the label mash prints before each estimate.
pub const DIAGNOSTIC_PREFIX_LEN: usize = 23;
const GENOME_SIZE_LINE: usize = 0;
const COVERAGE_LINE: usize = 1;
/// Low-depth k-mers below a third of the coverage are treated as noise.
const COVERAGE_DIVISOR: f64 = 3.0;

/// Result of the exploratory (unfiltered) mash pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEstimate {
    /// Value passed to `-m` on the filtered pass.
    pub min_kmer: u32,
    /// Genome size as mash printed it, e.g. "4500000" or "3.4e+06".
    pub genome_size: String,
    /// Coverage as mash printed it.
    pub genome_coverage: String,
}

/// Raw figures pulled out of the stderr diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub genome_size: String,
    pub genome_coverage: String,
    pub coverage: f64,
}

/// Reads the genome-size and coverage lines from mash stderr.
pub fn parse_diagnostics(stderr: &str) -> Result<Diagnostics, PipelineError> {
    let lines: Vec<&str> = stderr.lines().collect();
    if lines.len() <= COVERAGE_LINE {
        return Err(PipelineError::UnexpectedToolOutputFormat(format!(
            "expected genome size and coverage on the first two stderr lines, got {} line(s)",
            lines.len()
        )));
    }

    let (genome_size, _) =
        value_after_prefix(lines[GENOME_SIZE_LINE], "genome size", is_genome_size_line)?;
    let (genome_coverage, coverage) =
        value_after_prefix(lines[COVERAGE_LINE], "genome coverage", is_coverage_line)?;

    Ok(Diagnostics {
        genome_size,
        genome_coverage,
        coverage,
    })
}

fn is_genome_size_line(line: &str) -> bool {
    line.trim_start().starts_with("Estimated genome size")
}

fn is_coverage_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("Estimated") && line.contains("coverage")
}

/// Checks the label, strips the fixed-width prefix and parses what is left
/// as a number.
///
/// A correctly labelled line whose tail is not numeric (a different label
/// width, or a line shorter than the prefix) is read after its last colon.
fn value_after_prefix(
    line: &str,
    what: &str,
    has_label: fn(&str) -> bool,
) -> Result<(String, f64), PipelineError> {
    let unexpected = || {
        PipelineError::UnexpectedToolOutputFormat(format!(
            "cannot read {} from stderr line '{}'",
            what, line
        ))
    };
    if !has_label(line) {
        return Err(unexpected());
    }

    let finite = |text: &str| text.parse::<f64>().ok().filter(|v| v.is_finite());

    if let Some(tail) = line.get(DIAGNOSTIC_PREFIX_LEN..).map(str::trim) {
        if let Some(value) = finite(tail) {
            return Ok((tail.to_string(), value));
        }
    }
    if let Some((_, labelled)) = line.rsplit_once(':') {
        let labelled = labelled.trim();
        if let Some(value) = finite(labelled) {
            return Ok((labelled.to_string(), value));
        }
    }
    Err(unexpected())
}

/// `floor(coverage / 3)`, never negative.
pub fn candidate_min_kmer(coverage: f64) -> u32 {
    (coverage / COVERAGE_DIVISOR).floor().max(0.0) as u32
}

/// Picks the k-mer filter.
///
/// A user value is honoured only when it is greater than the default;
/// otherwise the computed candidate is used, floored at the default.
pub fn resolve_min_kmer(candidate: u32, user_min_kmer: Option<u32>) -> u32 {
    match user_min_kmer {
        Some(user) if user > DEFAULT_MIN_KMER => {
            info!("Using user specified minimum k-mer copy number: {}", user);
            user
        }
        _ if candidate < DEFAULT_MIN_KMER => {
            info!(
                "Calculated minimum k-mer copy number {} is below {}, using {}",
                candidate, DEFAULT_MIN_KMER, DEFAULT_MIN_KMER
            );
            DEFAULT_MIN_KMER
        }
        _ => {
            info!("Using calculated minimum k-mer copy number: {}", candidate);
            candidate
        }
    }
}

/// Runs the unfiltered pass on `query` and derives the k-mer filter.
pub fn estimate(
    config: &RunConfig,
    runner: &dyn CommandRunner,
    query: &Path,
) -> Result<CoverageEstimate, PipelineError> {
    info!("Estimating genome size and coverage for {}", config.input_names());
    let output = runner.run(&dist_args(config, query, None))?;
    let diagnostics = parse_diagnostics(&output.stderr)?;
    info!(
        "Genome size: {}, genome coverage: {}",
        diagnostics.genome_size, diagnostics.genome_coverage
    );

    let candidate = candidate_min_kmer(diagnostics.coverage);
    Ok(CoverageEstimate {
        min_kmer: resolve_min_kmer(candidate, config.min_kmer),
        genome_size: diagnostics.genome_size,
        genome_coverage: diagnostics.genome_coverage,
    })
}

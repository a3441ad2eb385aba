//! Picks the best species call from a parsed result set.
//!
//! Records are ranked by the number of shared k-mers, not by distance. The
//! call then goes through tie detection and then the distance threshold.
//! The threshold overrides a tie.

use super::parser::{DistanceRecord, ResultSet};
use super::PipelineError;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// How the call was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    /// Rank 1 is unique and below the threshold.
    Match,
    /// Rank 1 and rank 2 share the same k-mer count.
    Tie,
    /// Rank 1 distance is not below the threshold.
    NoMatchBelowThreshold,
}

/// Final call for one sample. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCall {
    pub genus: String,
    pub species: String,
    pub outcome: CallOutcome,
    /// Best hits, sorted by k-mer count descending.
    pub top_n: Vec<DistanceRecord>,
    pub threshold_applied: f64,
}

impl ResolvedCall {
    /// The "Best species match" text, e.g. "Legionella pneumophila".
    pub fn best_match(&self) -> String {
        format!("{} {}", self.genus, self.species).trim().to_string()
    }

    pub fn best_record(&self) -> Option<&DistanceRecord> {
        match self.outcome {
            CallOutcome::Match => self.top_n.first(),
            _ => None,
        }
    }
}

pub fn tie_notice(top_n: usize) -> String {
    format!("This was a tie, see the top {} results below", top_n)
}

pub fn no_match_notice(max_distance: f64) -> String {
    format!("No matches found with mash distances < {}", max_distance)
}

/// Ranks `result_set` and decides the call.
///
/// # Arguments
///
/// * `result_set` - Parsed comparisons, in mash output order.
/// * `max_distance` - Rank 1 must be strictly below this to be reported.
/// * `top_n` - Number of ranked records kept for the report table.
///
/// # Returns
///
/// * `Result<ResolvedCall, PipelineError>` - `EmptyResultSet` when there is
///   nothing to rank.
pub fn resolve(
    result_set: ResultSet,
    max_distance: f64,
    top_n: usize,
) -> Result<ResolvedCall, PipelineError> {
    if result_set.is_empty() {
        return Err(PipelineError::EmptyResultSet);
    }

    let mut ranked = result_set.into_records();
    // Vec::sort_by is stable, equal counts keep mash's order.
    ranked.sort_by(|a, b| b.kmer_count.cmp(&a.kmer_count));

    let best = &ranked[0];
    let is_tie = ranked
        .get(1)
        .map_or(false, |second| second.kmer_count == best.kmer_count);

    let (mut genus, mut species, mut outcome) = if is_tie {
        debug!(
            "Tie between {} and {} at {} shared k-mers",
            best.reference_id, ranked[1].reference_id, best.kmer_count
        );
        (tie_notice(top_n), String::new(), CallOutcome::Tie)
    } else {
        (best.genus.clone(), best.species.clone(), CallOutcome::Match)
    };

    if best.distance < max_distance {
        info!(
            "Best hit {} {} at distance {} is below {}",
            best.genus, best.species, best.distance, max_distance
        );
    } else {
        info!("{}", no_match_notice(max_distance));
        genus = no_match_notice(max_distance);
        species = String::new();
        outcome = CallOutcome::NoMatchBelowThreshold;
    }

    ranked.truncate(top_n);
    Ok(ResolvedCall {
        genus,
        species,
        outcome,
        top_n: ranked,
        threshold_applied: max_distance,
    })
}

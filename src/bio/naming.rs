//! Reference identifier grammar.
//!
//! Sketch databases encode the taxonomy of each reference in its file name,
//! e.g. `Legionella_pneumophila_GCF_000008485.1_ASM848v1_cleaned.fna`.
//! The grammar is a property of how the database was built, so it is kept
//! behind the `ReferenceNaming` trait; a database with a different naming
//! scheme supplies its own implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("reference identifier is empty")]
    Empty,

    #[error("no genus/species delimiter in '{0}'")]
    MissingDelimiter(String),

    #[error("no accession marker ({markers}) in '{id}'")]
    MissingAccession { id: String, markers: String },

    #[error("no species between genus and accession in '{0}'")]
    MissingSpecies(String),
}

/// Taxonomy decoded from a reference identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceName {
    pub genus: String,
    pub species: String,
    pub accession: String,
}

/// Decodes genus, species and accession from a reference identifier.
pub trait ReferenceNaming: Send + Sync {
    fn parse(&self, reference_id: &str) -> Result<ReferenceName, NamingError>;
}

/// `genus_species[_more_species]_GCx_accession[_assembly][suffix]`
///
/// Directory components and the sequence-file suffix are removed first.
/// Multi-token species (e.g. `pneumophila_subsp._fraseri`) are joined with
/// spaces.
#[derive(Debug, Clone)]
pub struct GenbankNaming {
    markers: Vec<String>,
    suffixes: Vec<String>,
}

impl GenbankNaming {
    pub fn new(markers: Vec<String>, suffixes: Vec<String>) -> Self {
        GenbankNaming { markers, suffixes }
    }

    fn strip_path_and_suffix<'a>(&self, reference_id: &'a str) -> &'a str {
        let base = reference_id
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(reference_id);
        self.suffixes
            .iter()
            .find_map(|suffix| base.strip_suffix(suffix.as_str()))
            .unwrap_or(base)
    }

    /// Earliest marker that starts the remainder or follows an underscore.
    fn find_marker(&self, remainder: &str) -> Option<usize> {
        self.markers
            .iter()
            .flat_map(|marker| remainder.match_indices(marker.as_str()))
            .map(|(pos, _)| pos)
            .filter(|&pos| pos == 0 || remainder.as_bytes()[pos - 1] == b'_')
            .min()
    }
}

impl Default for GenbankNaming {
    fn default() -> Self {
        GenbankNaming::new(
            vec!["GCA_".to_string(), "GCF_".to_string()],
            // Longest first so "_cleaned.fna" wins over ".fna".
            vec![
                "_cleaned.fna".to_string(),
                ".fna.gz".to_string(),
                ".fasta".to_string(),
                ".fna".to_string(),
                ".fas".to_string(),
                ".fa".to_string(),
            ],
        )
    }
}

impl ReferenceNaming for GenbankNaming {
    fn parse(&self, reference_id: &str) -> Result<ReferenceName, NamingError> {
        let trimmed = reference_id.trim();
        if trimmed.is_empty() {
            return Err(NamingError::Empty);
        }
        let name = self.strip_path_and_suffix(trimmed);

        let (genus, remainder) = name
            .split_once('_')
            .filter(|(genus, _)| !genus.is_empty())
            .ok_or_else(|| NamingError::MissingDelimiter(name.to_string()))?;

        let marker_pos =
            self.find_marker(remainder)
                .ok_or_else(|| NamingError::MissingAccession {
                    id: name.to_string(),
                    markers: self.markers.join(", "),
                })?;

        let species = remainder[..marker_pos]
            .split('_')
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if species.is_empty() {
            return Err(NamingError::MissingSpecies(name.to_string()));
        }

        Ok(ReferenceName {
            genus: genus.to_string(),
            species,
            accession: remainder[marker_pos..].to_string(),
        })
    }
}

//! Organism sheet validation.
//!
//! An organism sheet is a plain text list of the organisms a sketch was
//! built from, one per line, either `Genus` or `Genus species`, separated
//! by a single space.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrganismSheetError {
    #[error("{0} does not exist")]
    MissingFile(PathBuf),

    #[error("{0} is empty")]
    EmptyFile(PathBuf),

    #[error("{0} looks like a spreadsheet export; the sheet must be a space delimited text file")]
    Spreadsheet(PathBuf),

    #[error("line {line}: '{content}' is not \"genus\" or \"genus species\" separated by a space")]
    BadLine { line: usize, content: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One line of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organism {
    pub genus: String,
    pub species: Option<String>,
}

fn parse_line(line_number: usize, line: &str) -> Result<Organism, OrganismSheetError> {
    let bad = || OrganismSheetError::BadLine {
        line: line_number,
        content: line.to_string(),
    };
    if line.contains('\t') || line.contains(',') {
        return Err(bad());
    }

    let mut tokens = line.split(' ').filter(|t| !t.is_empty());
    let genus = tokens.next().ok_or_else(bad)?;
    let species = tokens.next();
    if tokens.next().is_some() {
        return Err(bad());
    }
    Ok(Organism {
        genus: genus.to_string(),
        species: species.map(str::to_string),
    })
}

/// Checks the sheet at `path` and returns its entries. Blank lines are
/// ignored; the first offending line is reported with its 1-based number.
pub fn check_organism_sheet(path: &Path) -> Result<Vec<Organism>, OrganismSheetError> {
    if !path.is_file() {
        return Err(OrganismSheetError::MissingFile(path.to_path_buf()));
    }
    let is_spreadsheet = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map_or(false, |ext| ext == "csv" || ext == "tsv");
    if is_spreadsheet {
        return Err(OrganismSheetError::Spreadsheet(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(OrganismSheetError::EmptyFile(path.to_path_buf()));
    }

    let organisms = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line.trim_end_matches('\r')))
        .collect::<Result<Vec<_>, _>>()?;

    info!("{}: {} organism(s) listed", path.display(), organisms.len());
    Ok(organisms)
}

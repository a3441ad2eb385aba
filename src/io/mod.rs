//! Input discovery.
//!
//! Finds read pairs and FASTA assemblies in a directory for batch runs and
//! derives sample names from read file names.

pub mod fastq;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const FASTQ_EXTENSIONS: &[&str] = &[".fastq", ".fq"];
const FASTA_EXTENSIONS: &[&str] = &[".fasta", ".fas", ".fna", ".fa"];
const COMPRESSION_EXTENSIONS: &[&str] = &[".gz", ".bz2", ".zst"];
/// Mate markers, most specific first.
const MATE_MARKERS: &[(&str, Mate)] = &[
    ("_R1_001", Mate::First),
    ("_R2_001", Mate::Second),
    ("_R1", Mate::First),
    ("_R2", Mate::Second),
    ("_1", Mate::First),
    ("_2", Mate::Second),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mate {
    First,
    Second,
}

/// One unit of work for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleInput {
    Paired {
        name: String,
        read1: PathBuf,
        read2: PathBuf,
    },
    Fasta {
        name: String,
        path: PathBuf,
    },
}

impl SampleInput {
    pub fn name(&self) -> &str {
        match self {
            SampleInput::Paired { name, .. } | SampleInput::Fasta { name, .. } => name,
        }
    }
}

/// Removes a compression extension and then a sequence extension.
/// Returns the stem and whether the file is FASTQ (`Some(true)`),
/// FASTA (`Some(false)`), or neither (`None`).
fn split_sequence_extension(file_name: &str) -> (&str, Option<bool>) {
    let lower = file_name.to_ascii_lowercase();
    let mut end = file_name.len();
    if let Some(ext) = COMPRESSION_EXTENSIONS.iter().find(|e| lower.ends_with(*e)) {
        end -= ext.len();
    }
    let lower_stem = &lower[..end];
    if let Some(ext) = FASTQ_EXTENSIONS.iter().find(|e| lower_stem.ends_with(*e)) {
        return (&file_name[..end - ext.len()], Some(true));
    }
    if let Some(ext) = FASTA_EXTENSIONS.iter().find(|e| lower_stem.ends_with(*e)) {
        return (&file_name[..end - ext.len()], Some(false));
    }
    (file_name, None)
}

fn split_mate(stem: &str) -> Option<(&str, Mate)> {
    MATE_MARKERS
        .iter()
        .find_map(|(marker, mate)| stem.strip_suffix(marker).map(|name| (name, *mate)))
        .filter(|(name, _)| !name.is_empty())
}

/// Sample name from a read or assembly path: `s1_S1_R1_001.fastq.gz` -> `s1_S1`.
pub fn sample_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, _) = split_sequence_extension(&file_name);
    let name = split_mate(stem).map_or(stem, |(name, _)| name);
    if name.is_empty() {
        "sample".to_string()
    } else {
        name.to_string()
    }
}

/// Scans `dir` (not recursively) for samples.
///
/// FASTQ files are paired by their `_R1`/`_R2` marker; each pair yields one
/// sample. A mate without a partner is skipped with a warning. FASTA files
/// are single-query samples. Anything else is ignored.
pub fn discover_samples(dir: &Path) -> Result<Vec<SampleInput>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut pairs: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    let mut samples = Vec::new();

    for path in entries {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match split_sequence_extension(&file_name) {
            (stem, Some(true)) => match split_mate(stem) {
                Some((name, mate)) => {
                    let slot = pairs.entry(name.to_string()).or_default();
                    match mate {
                        Mate::First => slot.0 = Some(path.clone()),
                        Mate::Second => slot.1 = Some(path.clone()),
                    }
                }
                None => warn!(
                    "{} has no _R1/_R2 marker, cannot pair it. Skipping.",
                    path.display()
                ),
            },
            (stem, Some(false)) => samples.push(SampleInput::Fasta {
                name: stem.to_string(),
                path: path.clone(),
            }),
            (_, None) => debug!(
                "{} does not match .fastq, .fasta, .fas, .fna or .fa. Skipping.",
                path.display()
            ),
        }
    }

    for (name, slot) in pairs {
        match slot {
            (Some(read1), Some(read2)) => samples.push(SampleInput::Paired { name, read1, read2 }),
            (Some(only), None) | (None, Some(only)) => {
                warn!("No mate found for {}. Skipping.", only.display())
            }
            (None, None) => {}
        }
    }

    samples.sort_by(|a, b| a.name().cmp(b.name()));
    info!("Found {} sample(s) in {}", samples.len(), dir.display());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sample_name_from_path() {
        assert_eq!(sample_name_from_path(Path::new("/d/s1_S1_R1_001.fastq")), "s1_S1");
        assert_eq!(sample_name_from_path(Path::new("s2_R2.fq.gz")), "s2");
        assert_eq!(sample_name_from_path(Path::new("ERR125190_1.fastq.gz")), "ERR125190");
        assert_eq!(sample_name_from_path(Path::new("isolate.fasta")), "isolate");
        assert_eq!(sample_name_from_path(Path::new("odd")), "odd");
    }

    #[test]
    fn test_discover_pairs_and_fasta() {
        let dir = tempdir().unwrap();
        for name in [
            "a_R1_001.fastq",
            "a_R2_001.fastq",
            "b_R1.fq.gz",
            "b_R2.fq.gz",
            "lonely_R1_001.fastq",
            "c.fna",
            "notes.txt",
            "Results_2024-01-01.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let samples = discover_samples(dir.path()).unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        match &samples[0] {
            SampleInput::Paired { read1, read2, .. } => {
                assert!(read1.ends_with("a_R1_001.fastq"));
                assert!(read2.ends_with("a_R2_001.fastq"));
            }
            other => panic!("expected a pair, got {other:?}"),
        }
        assert!(matches!(samples[2], SampleInput::Fasta { .. }));
    }

    #[test]
    fn test_discover_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        assert!(discover_samples(&dir.path().join("missing")).is_err());
    }
}

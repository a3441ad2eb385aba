//! Run configuration.
//!
//! A `RunConfig` is built once at the command-line boundary, validated, and
//! then passed by reference into every pipeline stage. Nothing mutates it
//! after `validate` succeeds.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum k-mer copy number used when the coverage heuristic gives less.
pub const DEFAULT_MIN_KMER: u32 = 2;
pub const DEFAULT_MAX_DISTANCE: f64 = 0.05;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_TOP_N: usize = 5;
/// Upper bound for the top-N table (tool validation runs use the full list).
pub const MAX_TOP_N: usize = 200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} does not exist")]
    MissingFile(PathBuf),

    #[error("{0} is empty")]
    EmptyFile(PathBuf),

    #[error("{0} is not a file ending with .msh. Did you generate the mash sketch correctly?")]
    NotASketch(PathBuf),

    #[error("read 1 and read 2 point at the same file: {0}")]
    IdenticalReads(PathBuf),

    #[error("{0} is not a positive number")]
    InvalidMaxDistance(f64),

    #[error("minimum k-mer copy number must be at least 2, got {0}")]
    InvalidMinKmer(u32),

    #[error("thread count must be positive")]
    InvalidThreads,

    #[error("top-N must be between 1 and 200, got {0}")]
    InvalidTopN(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Everything one sample run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pre-built mash sketch (.msh).
    pub database_path: PathBuf,
    /// First read file, or the single FASTA query.
    pub read1_path: PathBuf,
    /// Second read file; `None` for a single FASTA query.
    pub read2_path: Option<PathBuf>,
    /// Calls at or above this distance are reported as no match.
    pub max_distance: f64,
    /// User override for the k-mer filter; computed from coverage otherwise.
    pub min_kmer: Option<u32>,
    /// Passed through to mash as `-p`.
    pub threads: usize,
    pub top_n: usize,
    pub mash_binary: PathBuf,
    /// Where per-sample scratch files are created.
    pub work_dir: PathBuf,
}

impl RunConfig {
    pub fn new(database_path: impl Into<PathBuf>, read1_path: impl Into<PathBuf>) -> Self {
        RunConfig {
            database_path: database_path.into(),
            read1_path: read1_path.into(),
            read2_path: None,
            max_distance: DEFAULT_MAX_DISTANCE,
            min_kmer: None,
            threads: DEFAULT_THREADS,
            top_n: DEFAULT_TOP_N,
            mash_binary: PathBuf::from("mash"),
            work_dir: std::env::temp_dir(),
        }
    }

    pub fn with_read2(mut self, read2_path: impl Into<PathBuf>) -> Self {
        self.read2_path = Some(read2_path.into());
        self
    }

    /// True when the query is a read pair (estimator pass and `-r` apply).
    pub fn is_paired(&self) -> bool {
        self.read2_path.is_some()
    }

    /// Name of the sketch file without its directory.
    pub fn database_name(&self) -> String {
        file_name(&self.database_path)
    }

    /// Input file names joined for the report, e.g. "a_R1.fastq and a_R2.fastq".
    pub fn input_names(&self) -> String {
        match &self.read2_path {
            Some(read2) => format!("{} and {}", file_name(&self.read1_path), file_name(read2)),
            None => file_name(&self.read1_path),
        }
    }

    /// Checks every invariant the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_msh = self
            .database_path
            .extension()
            .map_or(false, |ext| ext == "msh");
        if !is_msh {
            return Err(ConfigError::NotASketch(self.database_path.clone()));
        }
        check_non_empty(&self.database_path)?;
        check_non_empty(&self.read1_path)?;

        if let Some(read2) = &self.read2_path {
            check_non_empty(read2)?;
            if fs::canonicalize(&self.read1_path)? == fs::canonicalize(read2)? {
                return Err(ConfigError::IdenticalReads(read2.clone()));
            }
        }

        if !(self.max_distance > 0.0) {
            return Err(ConfigError::InvalidMaxDistance(self.max_distance));
        }
        if let Some(min_kmer) = self.min_kmer {
            if min_kmer < DEFAULT_MIN_KMER {
                return Err(ConfigError::InvalidMinKmer(min_kmer));
            }
        }
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        if self.top_n == 0 || self.top_n > MAX_TOP_N {
            return Err(ConfigError::InvalidTopN(self.top_n));
        }
        Ok(())
    }
}

fn check_non_empty(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    if fs::metadata(path)?.len() == 0 {
        return Err(ConfigError::EmptyFile(path.to_path_buf()));
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn paired_config(dir: &TempDir) -> RunConfig {
        let db = write_file(dir, "legionella.msh", "sketch");
        let r1 = write_file(dir, "s1_R1_001.fastq", "@r\nACGT\n+\nIIII\n");
        let r2 = write_file(dir, "s1_R2_001.fastq", "@r\nACGT\n+\nIIII\n");
        RunConfig::new(db, r1).with_read2(r2)
    }

    #[test]
    fn test_valid_paired_config() {
        let dir = tempdir().unwrap();
        let config = paired_config(&dir);
        assert!(config.validate().is_ok());
        assert!(config.is_paired());
        assert_eq!(config.database_name(), "legionella.msh");
        assert_eq!(config.input_names(), "s1_R1_001.fastq and s1_R2_001.fastq");
    }

    #[test]
    fn test_rejects_non_sketch_database() {
        let dir = tempdir().unwrap();
        let mut config = paired_config(&dir);
        config.database_path = write_file(&dir, "legionella.fasta", ">x\nACGT\n");
        assert!(matches!(config.validate(), Err(ConfigError::NotASketch(_))));
    }

    #[test]
    fn test_rejects_empty_and_missing_files() {
        let dir = tempdir().unwrap();
        let mut config = paired_config(&dir);
        config.read1_path = write_file(&dir, "empty.fastq", "");
        assert!(matches!(config.validate(), Err(ConfigError::EmptyFile(_))));

        config.read1_path = dir.path().join("nope.fastq");
        assert!(matches!(config.validate(), Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_rejects_identical_reads() {
        let dir = tempdir().unwrap();
        let mut config = paired_config(&dir);
        config.read2_path = Some(config.read1_path.clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IdenticalReads(_))
        ));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let dir = tempdir().unwrap();
        let base = paired_config(&dir);

        let mut config = base.clone();
        config.max_distance = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxDistance(_))
        ));

        let mut config = base.clone();
        config.max_distance = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.min_kmer = Some(1);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMinKmer(1))));

        let mut config = base.clone();
        config.threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreads)));

        let mut config = base;
        config.top_n = MAX_TOP_N + 1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTopN(_))));
    }

    #[test]
    fn test_single_fasta_names() {
        let config = RunConfig::new("/db/legionella.msh", "/data/isolate.fasta");
        assert!(!config.is_paired());
        assert_eq!(config.input_names(), "isolate.fasta");
    }
}

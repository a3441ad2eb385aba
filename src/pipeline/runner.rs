//! Runs the external distance tool and captures its output.

use super::PipelineError;
use crate::config::RunConfig;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured output of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam between the pipeline and the external process.
///
/// `args` excludes the program name. Implementations must return only after
/// the process has exited and both streams are fully read.
pub trait CommandRunner: Send + Sync {
    fn run(&self, args: &[String]) -> Result<ToolOutput, PipelineError>;
}

/// Spawns the `mash` binary (or whatever `program` points at).
#[derive(Debug, Clone)]
pub struct MashRunner {
    program: PathBuf,
}

impl MashRunner {
    pub fn new(program: impl AsRef<Path>) -> Self {
        MashRunner {
            program: program.as_ref().to_path_buf(),
        }
    }

    /// Dependency check: runs `<program> --version` and returns the version text.
    pub fn check_available(&self) -> Result<String, PipelineError> {
        let output = self.run(&["--version".to_string()])?;
        let version = output.stdout.trim().to_string();
        info!("Found {} version {}", self.program.display(), version);
        Ok(version)
    }
}

/// Arguments for `mash dist`.
///
/// Paired reads are compared with `-r` (query is a read set) and, on the
/// filtered pass, `-m <min_kmer>`. A FASTA query gets neither.
pub fn dist_args(config: &RunConfig, query: &Path, min_kmer: Option<u32>) -> Vec<String> {
    let mut args = vec![
        "dist".to_string(),
        "-p".to_string(),
        config.threads.to_string(),
    ];
    if config.is_paired() {
        args.push("-r".to_string());
        if let Some(min_kmer) = min_kmer {
            args.push("-m".to_string());
            args.push(min_kmer.to_string());
        }
    }
    args.push(config.database_path.display().to_string());
    args.push(query.display().to_string());
    args
}

/// Arguments for `mash info -H`, which prints the sketch header.
pub fn info_args(database: &Path) -> Vec<String> {
    vec![
        "info".to_string(),
        "-H".to_string(),
        database.display().to_string(),
    ]
}

impl Default for MashRunner {
    fn default() -> Self {
        MashRunner::new("mash")
    }
}

impl CommandRunner for MashRunner {
    fn run(&self, args: &[String]) -> Result<ToolOutput, PipelineError> {
        let program = self.program.display().to_string();
        debug!("Running: {} {}", program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PipelineError::ExternalToolNotFound(program.clone()),
                _ => PipelineError::IoError(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(PipelineError::ExternalToolError {
                program,
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(
            "{} finished: {} bytes stdout, {} bytes stderr",
            program,
            stdout.len(),
            stderr.len()
        );
        Ok(ToolOutput { stdout, stderr })
    }
}

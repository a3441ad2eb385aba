use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{
    RunConfig, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_KMER, DEFAULT_THREADS, DEFAULT_TOP_N, MAX_TOP_N,
};
use crate::io::{discover_samples, sample_name_from_path, SampleInput};
use crate::organisms::check_organism_sheet;
use crate::pipeline::report::{
    append_report, default_report_name, sample_report_name, write_json,
};
use crate::pipeline::{MashRunner, SampleOutcome, SampleProcessor};
use crate::utils::parallel::process_ordered;

#[derive(Parser, Debug)]
#[command(author, version, about = "Species identification of sequenced isolates using mash", long_about = None)]
pub struct Cli {
    /// mash executable to run
    #[arg(long, global = true, default_value = "mash")]
    pub mash_binary: PathBuf,

    /// Threads passed to mash (-p)
    #[arg(short, long, global = true, default_value_t = DEFAULT_THREADS, value_parser = positive_int)]
    pub threads: usize,

    /// Directory for per-sample scratch files (defaults to the system temp dir)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Database and threshold options shared by `run` and `batch`.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Mash sketch (.msh) of the reference genomes
    #[arg(short, long, value_parser = msh_path)]
    pub database: PathBuf,

    /// Maximum mash distance for a call
    #[arg(short = 'm', long = "max-dist", default_value_t = DEFAULT_MAX_DISTANCE, value_parser = positive_float)]
    pub max_dist: f64,

    /// Minimum k-mer copy number; overrides the coverage estimate when above 2
    #[arg(long, value_parser = min_kmer)]
    pub min_kmer: Option<u32>,

    /// Rows in the top hits table
    #[arg(long, default_value_t = DEFAULT_TOP_N, value_parser = top_n)]
    pub top_n: usize,

    /// Directory the report is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify the species of one read pair or one FASTA assembly
    Run {
        #[command(flatten)]
        search: SearchArgs,

        /// First read file, or the FASTA query when --read2 is absent
        #[arg(short = '1', long)]
        read1: PathBuf,

        /// Second read file
        #[arg(short = '2', long)]
        read2: Option<PathBuf>,

        /// Report file to append to (defaults to <output-dir>/<sample>_Results_<date>.txt)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Also write the call as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Identify every read pair and FASTA file in a directory
    Batch {
        #[command(flatten)]
        search: SearchArgs,

        /// Directory containing the reads
        #[arg(long)]
        dir: PathBuf,

        /// Samples processed at the same time
        #[arg(long, default_value_t = 1, value_parser = positive_int)]
        jobs: usize,
    },

    /// Check that an organism sheet is a valid "genus species" list
    CheckOrganisms {
        /// Organism sheet (plain text, one organism per line)
        file: PathBuf,
    },
}

fn msh_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    match path.extension() {
        Some(ext) if ext == "msh" => Ok(path),
        _ => Err(format!(
            "{} is not a file ending with .msh. Did you generate the mash sketch correctly?",
            s
        )),
    }
}

fn positive_float(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => Ok(value),
        _ => Err(format!("{} is not a positive number", s)),
    }
}

fn positive_int(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("{} is not a positive integer", s)),
    }
}

fn min_kmer(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(value) if value >= DEFAULT_MIN_KMER => Ok(value),
        _ => Err(format!("{} must be an integer of at least {}", s, DEFAULT_MIN_KMER)),
    }
}

fn top_n(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(value) if (1..=MAX_TOP_N).contains(&value) => Ok(value),
        _ => Err(format!("{} must be between 1 and {}", s, MAX_TOP_N)),
    }
}

/// Options every sample run inherits from the command line.
struct Globals {
    mash_binary: PathBuf,
    threads: usize,
    work_dir: PathBuf,
}

impl Globals {
    fn config(&self, search: &SearchArgs, read1: &Path, read2: Option<&Path>) -> RunConfig {
        let mut config = RunConfig::new(&search.database, read1);
        if let Some(read2) = read2 {
            config = config.with_read2(read2);
        }
        config.max_distance = search.max_dist;
        config.min_kmer = search.min_kmer;
        config.top_n = search.top_n;
        config.threads = self.threads;
        config.mash_binary = self.mash_binary.clone();
        config.work_dir = self.work_dir.clone();
        config
    }
}

/// Confirms mash can be launched before any sample is touched.
fn checked_runner(mash_binary: &Path) -> Result<MashRunner> {
    let runner = MashRunner::new(mash_binary);
    let version = runner
        .check_available()
        .context("Missing dependency: mash")?;
    info!("Using mash {}", version);
    Ok(runner)
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    let globals = Globals {
        mash_binary: cli.mash_binary,
        threads: cli.threads,
        work_dir: cli.work_dir.unwrap_or_else(std::env::temp_dir),
    };

    match cli.command {
        Commands::Run {
            search,
            read1,
            read2,
            report,
            json,
        } => {
            let config = globals.config(&search, &read1, read2.as_deref());
            config.validate().context("Invalid input")?;
            let runner = checked_runner(&config.mash_binary)?;
            fs::create_dir_all(&search.output_dir).with_context(|| {
                format!("Failed to create {}", search.output_dir.display())
            })?;

            let sample_name = sample_name_from_path(&read1);
            let outcome = SampleProcessor::new(&runner)
                .process(&config, &sample_name)
                .with_context(|| format!("Sample {} failed", sample_name))?;

            let report_path = report.unwrap_or_else(|| {
                search
                    .output_dir
                    .join(sample_report_name(&sample_name, Local::now().date_naive()))
            });
            append_report(&report_path, &outcome.report())
                .with_context(|| format!("Failed to write {}", report_path.display()))?;
            if let Some(json_path) = json {
                write_json(&json_path, &outcome.call, &outcome.metadata)
                    .with_context(|| format!("Failed to write {}", json_path.display()))?;
            }

            println!("{}", summary(&outcome));
            println!("Report: {}", report_path.display());
            Ok(())
        }
        Commands::Batch { search, dir, jobs } => run_batch(&globals, &search, &dir, jobs),
        Commands::CheckOrganisms { file } => {
            let organisms = check_organism_sheet(&file)
                .with_context(|| format!("Organism sheet {} is not valid", file.display()))?;
            println!(
                "{} is a valid organism sheet ({} organisms)",
                file.display(),
                organisms.len()
            );
            Ok(())
        }
    }
}

fn summary(outcome: &SampleOutcome) -> String {
    format!(
        "{}: {} ({:?}, {:.1}s)",
        outcome.sample_name,
        outcome.call.best_match(),
        outcome.call.outcome,
        outcome.elapsed_seconds
    )
}

fn run_batch(globals: &Globals, search: &SearchArgs, dir: &Path, jobs: usize) -> Result<()> {
    let samples = discover_samples(dir)?;
    if samples.is_empty() {
        bail!("No read pairs or FASTA files found in {}", dir.display());
    }
    let runner = checked_runner(&globals.mash_binary)?;
    fs::create_dir_all(&search.output_dir)
        .with_context(|| format!("Failed to create {}", search.output_dir.display()))?;

    let processor = SampleProcessor::new(&runner);
    let results = process_ordered(&samples, jobs, |sample| -> Result<SampleOutcome> {
        let config = match sample {
            SampleInput::Paired { read1, read2, .. } => globals.config(search, read1, Some(read2)),
            SampleInput::Fasta { path, .. } => globals.config(search, path, None),
        };
        config.validate()?;
        Ok(processor.process(&config, sample.name())?)
    })?;

    let report_path = search
        .output_dir
        .join(default_report_name(Local::now().date_naive()));
    let mut failed = 0usize;
    for (sample, result) in samples.iter().zip(results) {
        match result {
            Ok(outcome) => {
                append_report(&report_path, &outcome.report())
                    .with_context(|| format!("Failed to write {}", report_path.display()))?;
                println!("{}", summary(&outcome));
            }
            Err(e) => {
                error!("{}: {:#}", sample.name(), e);
                failed += 1;
            }
        }
    }

    info!("Results written to {}", report_path.display());
    if failed > 0 {
        bail!("{} of {} samples failed", failed, samples.len());
    }
    Ok(())
}

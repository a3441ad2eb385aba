//! Runs one sample through the whole pipeline.

use super::estimator::{estimate, CoverageEstimate};
use super::parser::TableParser;
use super::report::{render, ReportMetadata};
use super::resolver::{resolve, ResolvedCall};
use super::runner::{dist_args, info_args, CommandRunner};
use super::PipelineError;
use crate::config::RunConfig;
use crate::io::fastq::{concatenate_reads, sniff_format, SequenceFormat};
use chrono::Local;
use log::{info, warn};
use std::time::Instant;

/// Everything produced for one sample.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample_name: String,
    pub call: ResolvedCall,
    pub metadata: ReportMetadata,
    pub elapsed_seconds: f64,
}

impl SampleOutcome {
    /// The plain-text report block for this sample.
    pub fn report(&self) -> String {
        render(&self.call, &self.metadata)
    }
}

/// Pulls the k-mer size out of `mash info -H` output.
pub fn parse_kmer_size(header: &str) -> Option<u32> {
    header
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("K-mer size:"))
        .and_then(|line| line["K-mer size:".len()..].split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Sample pipeline driver.
pub struct SampleProcessor<'a> {
    runner: &'a dyn CommandRunner,
    parser: TableParser,
}

impl<'a> SampleProcessor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        SampleProcessor {
            runner,
            parser: TableParser::new(),
        }
    }

    /// K-mer size of the sketch, or `None` when mash cannot report it.
    /// Only used for the report, so failures are not fatal.
    pub fn kmer_size(&self, config: &RunConfig) -> Option<u32> {
        match self.runner.run(&info_args(&config.database_path)) {
            Ok(output) => {
                let size = parse_kmer_size(&output.stdout);
                if size.is_none() {
                    warn!("Could not find the k-mer size in the sketch header");
                }
                size
            }
            Err(e) => {
                warn!("Could not read sketch header: {}", e);
                None
            }
        }
    }

    /// Runs the sample described by `config`.
    ///
    /// Read pairs are concatenated into a scratch file, an unfiltered pass
    /// estimates coverage and the k-mer filter, and the filtered pass is
    /// parsed and resolved. A FASTA query is compared directly.
    pub fn process(
        &self,
        config: &RunConfig,
        sample_name: &str,
    ) -> Result<SampleOutcome, PipelineError> {
        let start = Instant::now();
        let timestamp = Local::now();
        info!("Now testing {} against {}", sample_name, config.database_name());

        let (raw, estimate) = match &config.read2_path {
            Some(read2) => {
                let scratch =
                    concatenate_reads(&config.read1_path, read2, &config.work_dir, sample_name)?;
                let estimate = estimate(config, self.runner, scratch.path())?;
                let args = dist_args(config, scratch.path(), Some(estimate.min_kmer));
                let output = self.runner.run(&args)?;
                (output.stdout, Some(estimate))
            }
            None => {
                if sniff_format(&config.read1_path)? != SequenceFormat::Fasta {
                    return Err(PipelineError::InvalidInput(format!(
                        "{} is FASTQ; single-end reads need a mate (--read2)",
                        config.read1_path.display()
                    )));
                }
                let args = dist_args(config, &config.read1_path, None);
                (self.runner.run(&args)?.stdout, None)
            }
        };

        let result_set = self.parser.parse(&raw)?;
        info!("{}: {} comparisons returned", sample_name, result_set.len());
        let call = resolve(result_set, config.max_distance, config.top_n)?;
        info!("{}: best species match: {}", sample_name, call.best_match());

        let metadata = build_metadata(config, estimate, self.kmer_size(config), timestamp);
        Ok(SampleOutcome {
            sample_name: sample_name.to_string(),
            call,
            metadata,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }
}

fn build_metadata(
    config: &RunConfig,
    estimate: Option<CoverageEstimate>,
    kmer_size: Option<u32>,
    timestamp: chrono::DateTime<Local>,
) -> ReportMetadata {
    let (min_kmer, genome_size, genome_coverage) = match estimate {
        Some(e) => (Some(e.min_kmer), Some(e.genome_size), Some(e.genome_coverage)),
        None => (None, None, None),
    };
    ReportMetadata {
        timestamp,
        input_files: config.input_names(),
        database: config.database_name(),
        max_distance: config.max_distance,
        min_kmer,
        kmer_size,
        genome_size,
        genome_coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::resolver::CallOutcome;
    use crate::pipeline::runner::ToolOutput;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const TABLE: &str = "\
Legionella_longbeachae_GCF_000091785.1_cleaned.fna\tq\t0.0921\t1e-100\t120/1000
Legionella_pneumophila_GCF_000008485.1_cleaned.fna\tq\t0.0185\t0\t845/1000
";
    const HEADER: &str = "Header:\n  Hash function (seed):          MurmurHash3_x64_128 (42)\n  K-mer size:                    21 (64-bit hashes)\n";

    /// Stands in for mash: answers `info`, unfiltered and filtered `dist`.
    struct FakeMash {
        coverage: &'static str,
        table: &'static str,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeMash {
        fn new(coverage: &'static str, table: &'static str) -> Self {
            FakeMash {
                coverage,
                table,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for FakeMash {
        fn run(&self, args: &[String]) -> Result<ToolOutput, PipelineError> {
            self.calls.lock().unwrap().push(args.to_vec());
            if args[0] == "info" {
                return Ok(ToolOutput {
                    stdout: HEADER.to_string(),
                    stderr: String::new(),
                });
            }
            let filtered = args.iter().any(|a| a == "-m");
            let paired = args.iter().any(|a| a == "-r");
            Ok(ToolOutput {
                stdout: if paired && !filtered {
                    String::new()
                } else {
                    self.table.to_string()
                },
                stderr: format!(
                    "Estimated genome size: 4500000\nEstimated coverage:    {}\n",
                    self.coverage
                ),
            })
        }
    }

    fn paired_config(dir: &TempDir) -> RunConfig {
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let db = write("legionella.msh", "sketch");
        let r1 = write("s1_R1_001.fastq", "@r1\nACGT\n+\nIIII\n");
        let r2 = write("s1_R2_001.fastq", "@r1\nTTGG\n+\nIIII\n");
        let mut config = RunConfig::new(db, r1).with_read2(r2);
        config.work_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_parse_kmer_size() {
        assert_eq!(parse_kmer_size(HEADER), Some(21));
        assert_eq!(parse_kmer_size("Header:\n"), None);
    }

    #[test]
    fn test_paired_sample_end_to_end() {
        let dir = tempdir().unwrap();
        let config = paired_config(&dir);
        let mash = FakeMash::new("9", TABLE);

        let outcome = SampleProcessor::new(&mash).process(&config, "s1").unwrap();
        assert_eq!(outcome.sample_name, "s1");
        assert_eq!(outcome.call.outcome, CallOutcome::Match);
        assert_eq!(outcome.call.best_match(), "Legionella pneumophila");
        assert_eq!(outcome.metadata.min_kmer, Some(3));
        assert_eq!(outcome.metadata.kmer_size, Some(21));
        assert_eq!(outcome.metadata.genome_size.as_deref(), Some("4500000"));

        let calls = mash.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(!calls[0].contains(&"-m".to_string()));
        let m = calls[1].iter().position(|a| a == "-m").unwrap();
        assert_eq!(calls[1][m + 1], "3");
        // Both passes see the same scratch file, which is gone afterwards.
        let scratch = Path::new(calls[0].last().unwrap());
        assert_eq!(calls[1].last(), calls[0].last());
        assert!(!scratch.exists());

        let report = outcome.report();
        assert!(report.contains("Best species match: Legionella pneumophila"));
    }

    #[test]
    fn test_user_min_kmer_override() {
        let dir = tempdir().unwrap();
        let mut config = paired_config(&dir);
        config.min_kmer = Some(6);
        let mash = FakeMash::new("9", TABLE);

        let outcome = SampleProcessor::new(&mash).process(&config, "s1").unwrap();
        assert_eq!(outcome.metadata.min_kmer, Some(6));
    }

    #[test]
    fn test_fasta_query_skips_estimate() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("isolate.fasta");
        fs::write(&fasta, ">contig1\nACGTACGT\n").unwrap();
        let db = dir.path().join("legionella.msh");
        fs::write(&db, "sketch").unwrap();
        let config = RunConfig::new(&db, &fasta);
        let mash = FakeMash::new("9", TABLE);

        let outcome = SampleProcessor::new(&mash).process(&config, "isolate").unwrap();
        assert_eq!(outcome.metadata.min_kmer, None);
        assert_eq!(outcome.metadata.genome_coverage, None);

        let calls = mash.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].contains(&"-r".to_string()));
    }

    #[test]
    fn test_single_fastq_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = paired_config(&dir);
        config.read2_path = None;
        let mash = FakeMash::new("9", TABLE);
        assert!(matches!(
            SampleProcessor::new(&mash).process(&config, "s1"),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let dir = tempdir().unwrap();
        let config = paired_config(&dir);
        let mash = FakeMash::new("9", "");
        assert!(matches!(
            SampleProcessor::new(&mash).process(&config, "s1"),
            Err(PipelineError::EmptyResultSet)
        ));
    }

    #[test]
    fn test_bad_diagnostics_abort_before_filtered_pass() {
        let dir = tempdir().unwrap();
        let config = paired_config(&dir);
        let mash = FakeMash::new("lots", TABLE);
        assert!(matches!(
            SampleProcessor::new(&mash).process(&config, "s1"),
            Err(PipelineError::UnexpectedToolOutputFormat(_))
        ));
        assert_eq!(mash.calls.lock().unwrap().len(), 1);
    }
}

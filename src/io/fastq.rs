//! Read-file handling for the mash query.
//!
//! Leverages the `needletail` crate to sniff FASTQ/FASTA input and to
//! decompress gzip/bzip2/zstd transparently while the read pair is written
//! into one scratch file.

use crate::pipeline::PipelineError;
use log::{debug, info};
use needletail::parse_fastx_file;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};

/// Sequence format of an input file, decided from its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    Fasta,
    Fastq,
}

/// Reads the first record of `path` to decide whether it is FASTA or FASTQ.
pub fn sniff_format(path: &Path) -> Result<SequenceFormat, PipelineError> {
    let mut reader = parse_fastx_file(path)?;
    match reader.next() {
        Some(record) => {
            let record = record?;
            Ok(if record.qual().is_some() {
                SequenceFormat::Fastq
            } else {
                SequenceFormat::Fasta
            })
        }
        None => Err(PipelineError::InvalidInput(format!(
            "{} contains no sequence records",
            path.display()
        ))),
    }
}

/// Writes every record of `read1` then `read2` into a fresh scratch file
/// inside `work_dir` and returns it. The file is deleted when dropped.
///
/// The scratch name starts with `sample_name` and carries a random suffix,
/// so concurrent samples never share a file.
pub fn concatenate_reads(
    read1: &Path,
    read2: &Path,
    work_dir: &Path,
    sample_name: &str,
) -> Result<NamedTempFile, PipelineError> {
    let format1 = sniff_format(read1)?;
    let format2 = sniff_format(read2)?;
    if format1 != format2 {
        return Err(PipelineError::InvalidInput(format!(
            "{} is {:?} but {} is {:?}",
            read1.display(),
            format1,
            read2.display(),
            format2
        )));
    }

    let scratch = Builder::new()
        .prefix(&format!("{}_", sample_name))
        .suffix(".fastq")
        .tempfile_in(work_dir)?;
    info!(
        "Concatenating {} and {} into {}",
        read1.display(),
        read2.display(),
        scratch.path().display()
    );

    let mut writer = BufWriter::new(File::create(scratch.path())?);
    let mut total = 0usize;
    for path in [read1, read2] {
        let mut reader = parse_fastx_file(path)?;
        let mut count = 0usize;
        while let Some(record) = reader.next() {
            let record = record?;
            record.write(&mut writer, None)?;
            count += 1;
        }
        debug!("{}: {} records", path.display(), count);
        total += count;
    }
    writer.flush()?;

    if total == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "{} and {} contain no reads",
            read1.display(),
            read2.display()
        )));
    }
    Ok(scratch)
}

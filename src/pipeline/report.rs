//! Plain-text species report.
//!
//! Each sample produces one block that is appended to a report file, so a
//! batch accumulates all of its samples in one place. The text is for
//! people; the optional JSON sidecar is the machine-readable form.

use super::resolver::ResolvedCall;
use super::PipelineError;
use chrono::{DateTime, Local, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const REPORT_TITLE: &str = "Species ID Tool using Mash";
const RULE_WIDTH: usize = 105;
const COLUMN_GAP: &str = "  ";
const HEADERS: [&str; 7] = [
    "Genus",
    "Species",
    "GenBank Identifier",
    "Mash Dist",
    "% Seq Sim",
    "P-value",
    "Kmer",
];
const FASTA_NOT_APPLICABLE: &str = "N/A - as the input was fasta";

/// Everything echoed in the report besides the call itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: DateTime<Local>,
    pub input_files: String,
    pub database: String,
    pub max_distance: f64,
    /// `None` for FASTA queries, where no k-mer filter is applied.
    pub min_kmer: Option<u32>,
    /// From the sketch header, when mash could report it.
    pub kmer_size: Option<u32>,
    pub genome_size: Option<String>,
    pub genome_coverage: Option<String>,
}

fn or_not_applicable(value: Option<String>) -> String {
    value.unwrap_or_else(|| FASTA_NOT_APPLICABLE.to_string())
}

/// `Results_2024-05-01.txt`
pub fn default_report_name(date: NaiveDate) -> String {
    format!("Results_{}.txt", date.format("%Y-%m-%d"))
}

/// `<sample>_Results_2024-05-01.txt`
pub fn sample_report_name(sample: &str, date: NaiveDate) -> String {
    format!("{}_{}", sample, default_report_name(date))
}

/// Formats the hit table with fixed column order and numeric precision.
pub fn render_table(call: &ResolvedCall) -> String {
    let rows: Vec<[String; 7]> = call
        .top_n
        .iter()
        .map(|r| {
            [
                r.genus.clone(),
                r.species.clone(),
                r.accession.clone(),
                format!("{:.5}", r.distance),
                format!("{:.3}", r.similarity),
                format!("{:.3e}", r.p_value),
                r.kmer_fraction(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[&str]| -> String {
        let line = cells
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (cell, &width))| {
                // Text columns left-aligned, numeric columns right-aligned.
                if i < 3 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        format!("{}\n", line.trim_end())
    };

    let mut table = format_line(&HEADERS[..]);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        table.push_str(&format_line(&cells[..]));
    }
    table
}

/// Renders one report block for a resolved call.
pub fn render(call: &ResolvedCall, metadata: &ReportMetadata) -> String {
    let mut report = String::new();

    report.push('\n');
    report.push_str(&format!("{}\n", REPORT_TITLE));
    report.push_str(&format!(
        "Date and Time = {}\n",
        metadata.timestamp.format("%B %d, %Y %H:%M:%S")
    ));
    report.push_str(&format!("Input query file(s): {}\n", metadata.input_files));
    report.push_str(&format!("Mash database: {}\n", metadata.database));
    report.push_str(&format!("Maximum mash distance: {}\n", metadata.max_distance));
    report.push_str(&format!(
        "K-mer size: {}\n",
        metadata
            .kmer_size
            .map_or_else(|| "N/A".to_string(), |k| k.to_string())
    ));
    report.push_str(&format!(
        "Genome size estimate for fastq files: {} (bp)\n",
        or_not_applicable(metadata.genome_size.clone())
    ));
    report.push_str(&format!(
        "Genome coverage estimate for fastq files: {}\n",
        or_not_applicable(metadata.genome_coverage.clone())
    ));
    report.push_str(&format!(
        "Minimum kmer copy number to be included in the sketch: {}\n\n",
        or_not_applicable(metadata.min_kmer.map(|m| m.to_string()))
    ));

    report.push_str(&format!("Best species match: {}\n\n", call.best_match()));

    report.push_str(&format!("Top {} hits:\n", call.top_n.len()));
    let rule = "\u{2500}".repeat(RULE_WIDTH);
    report.push_str(&rule);
    report.push('\n');
    report.push_str(&render_table(call));
    report.push_str(&rule);
    report.push('\n');

    report
}

/// Appends `text` to `path`, creating the file if needed. Never truncates.
pub fn append_report(path: &Path, text: &str) -> Result<(), PipelineError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    info!("Appended results to {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    call: &'a ResolvedCall,
}

/// Writes the call and its metadata as pretty-printed JSON.
pub fn write_json(
    path: &Path,
    call: &ResolvedCall,
    metadata: &ReportMetadata,
) -> Result<(), PipelineError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &JsonReport { metadata, call })?;
    info!("Wrote JSON results to {}", path.display());
    Ok(())
}

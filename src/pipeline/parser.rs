//! Parses the tab-separated table printed by `mash dist`.
//!
//! Each row has five positional fields:
//!
//! ```text
//! reference-id  query-id  distance  p-value  matching-hashes/sketch-size
//! ```
//!
//! Any row that breaks the grammar fails the whole parse. A single corrupt
//! row means truncated output or a database that does not follow the naming
//! convention, and neither can be trusted for a call.

use super::PipelineError;
use crate::bio::{GenbankNaming, ReferenceNaming};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use serde::{Deserialize, Serialize};

const FIELD_COUNT: usize = 5;

/// One reference-vs-query comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub reference_id: String,
    pub query_id: String,
    pub distance: f64,
    pub p_value: f64,
    pub kmer_count: u64,
    pub sketch_size: u64,
    pub genus: String,
    pub species: String,
    pub accession: String,
    /// Percent sequence similarity, `(1 - distance) * 100`.
    pub similarity: f64,
}

impl DistanceRecord {
    /// The k-mer ratio as mash prints it, e.g. `"845/1000"`.
    pub fn kmer_fraction(&self) -> String {
        format!("{}/{}", self.kmer_count, self.sketch_size)
    }
}

/// Converts a mash distance to percent similarity.
pub fn similarity_from_distance(distance: f64) -> f64 {
    (1.0 - distance) * 100.0
}

/// All comparisons from one mash run, in the order mash printed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<DistanceRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<DistanceRecord>) -> Self {
        ResultSet { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DistanceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DistanceRecord> {
        self.records
    }
}

/// Parser with a pluggable reference naming strategy.
pub struct TableParser<N: ReferenceNaming = GenbankNaming> {
    naming: N,
}

impl TableParser<GenbankNaming> {
    pub fn new() -> Self {
        TableParser {
            naming: GenbankNaming::default(),
        }
    }
}

impl Default for TableParser<GenbankNaming> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: ReferenceNaming> TableParser<N> {
    pub fn with_naming(naming: N) -> Self {
        TableParser { naming }
    }

    /// Parses raw `mash dist` stdout. Blank lines are skipped.
    pub fn parse(&self, raw_stdout: &str) -> Result<ResultSet, PipelineError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_reader(raw_stdout.as_bytes());

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                PipelineError::malformed(line, e.to_string())
            })?;
            let line = row.position().map_or(records.len() + 1, |p| p.line() as usize);
            if row.iter().all(str::is_empty) {
                continue;
            }
            records.push(self.parse_row(&row, line)?);
        }

        debug!("Parsed {} distance records", records.len());
        Ok(ResultSet::new(records))
    }

    fn parse_row(&self, row: &StringRecord, line: usize) -> Result<DistanceRecord, PipelineError> {
        if row.len() != FIELD_COUNT {
            return Err(PipelineError::malformed(
                line,
                format!("expected {} tab-separated fields, found {}", FIELD_COUNT, row.len()),
            ));
        }

        let reference_id = &row[0];
        let query_id = &row[1];
        let distance = parse_float(&row[2], "distance", line)?;
        if !(0.0..=1.0).contains(&distance) {
            return Err(PipelineError::malformed(
                line,
                format!("distance {} is outside [0, 1]", distance),
            ));
        }
        let p_value = parse_float(&row[3], "p-value", line)?;
        let (kmer_count, sketch_size) = parse_kmer_fraction(&row[4], line)?;

        let name = self
            .naming
            .parse(reference_id)
            .map_err(|e| PipelineError::malformed(line, e.to_string()))?;

        Ok(DistanceRecord {
            reference_id: reference_id.to_string(),
            query_id: query_id.to_string(),
            distance,
            p_value,
            kmer_count,
            sketch_size,
            genus: name.genus,
            species: name.species,
            accession: name.accession,
            similarity: similarity_from_distance(distance),
        })
    }
}

fn parse_float(field: &str, what: &str, line: usize) -> Result<f64, PipelineError> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| PipelineError::malformed(line, format!("{} '{}' is not a number", what, field)))
}

/// Splits `"count/size"` into two integers with `count <= size`.
fn parse_kmer_fraction(field: &str, line: usize) -> Result<(u64, u64), PipelineError> {
    let parts: Vec<&str> = field.split('/').collect();
    let [count, size] = parts.as_slice() else {
        return Err(PipelineError::malformed(
            line,
            format!("k-mer fraction '{}' is not of the form count/size", field),
        ));
    };
    let parse = |s: &str| {
        s.trim().parse::<u64>().map_err(|_| {
            PipelineError::malformed(line, format!("k-mer fraction '{}' has a non-integer part", field))
        })
    };
    let (count, size) = (parse(*count)?, parse(*size)?);
    if count > size {
        return Err(PipelineError::malformed(
            line,
            format!("matching k-mers {} exceed sketch size {}", count, size),
        ));
    }
    Ok((count, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::{NamingError, ReferenceName};
    use approx::assert_relative_eq;

    const TABLE: &str = "\
refs/Legionella_pneumophila_GCF_000008485.1_cleaned.fna\tmyCatFile\t0.0185\t0\t845/1000
refs/Legionella_longbeachae_GCF_000091785.1_cleaned.fna\tmyCatFile\t0.0921\t1.2e-150\t120/1000
";

    fn line_of(err: PipelineError) -> usize {
        match err {
            PipelineError::MalformedRecord { line, .. } => line,
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_preserves_order_and_derives_fields() {
        let set = TableParser::new().parse(TABLE).unwrap();
        assert_eq!(set.len(), 2);

        let first = &set.records()[0];
        assert_eq!(first.genus, "Legionella");
        assert_eq!(first.species, "pneumophila");
        assert_eq!(first.accession, "GCF_000008485.1");
        assert_eq!(first.query_id, "myCatFile");
        assert_eq!((first.kmer_count, first.sketch_size), (845, 1000));
        assert_eq!(first.kmer_fraction(), "845/1000");
        assert_relative_eq!(first.similarity, 98.15, epsilon = 1e-9);

        let second = &set.records()[1];
        assert_eq!(second.species, "longbeachae");
        assert_relative_eq!(second.p_value, 1.2e-150);
    }

    #[test]
    fn test_similarity_matches_distance_for_every_record() {
        let set = TableParser::new().parse(TABLE).unwrap();
        for record in set.records() {
            assert_eq!(record.similarity, (1.0 - record.distance) * 100.0);
        }
    }

    #[test]
    fn test_blank_output_is_empty_set() {
        let set = TableParser::new().parse("\n\n").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_count_above_sketch_size_is_malformed() {
        let raw = "Legionella_pneumophila_GCF_1\tq\t0.01\t0\t1001/1000\n";
        let err = TableParser::new().parse(raw).unwrap_err();
        assert_eq!(line_of(err), 1);
    }

    #[test]
    fn test_bad_kmer_fraction_is_malformed() {
        for fraction in ["845", "845/1000/3", "a/1000", "845/"] {
            let raw = format!("Legionella_pneumophila_GCF_1\tq\t0.01\t0\t{}\n", fraction);
            assert!(
                matches!(
                    TableParser::new().parse(&raw),
                    Err(PipelineError::MalformedRecord { .. })
                ),
                "fraction {fraction} should be rejected"
            );
        }
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let raw = format!("{}Legionella_pneumophila_GCF_1\tq\t0.01\n", TABLE);
        let err = TableParser::new().parse(&raw).unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    #[test]
    fn test_distance_out_of_range_is_malformed() {
        let raw = "Legionella_pneumophila_GCF_1\tq\t1.5\t0\t1/1000\n";
        assert!(TableParser::new().parse(raw).is_err());
        let raw = "Legionella_pneumophila_GCF_1\tq\tnan\t0\t1/1000\n";
        assert!(TableParser::new().parse(raw).is_err());
    }

    #[test]
    fn test_unconventional_reference_name_is_malformed() {
        let raw = "contig_1\tq\t0.01\t0\t900/1000\n";
        let err = TableParser::new().parse(raw).unwrap_err();
        assert!(err.to_string().contains("contig_1"));
    }

    struct WholeIdNaming;

    impl ReferenceNaming for WholeIdNaming {
        fn parse(&self, reference_id: &str) -> Result<ReferenceName, NamingError> {
            Ok(ReferenceName {
                genus: reference_id.to_string(),
                species: String::new(),
                accession: String::new(),
            })
        }
    }

    #[test]
    fn test_alternate_naming_strategy() {
        let raw = "contig_1\tq\t0.01\t0\t900/1000\n";
        let set = TableParser::with_naming(WholeIdNaming).parse(raw).unwrap();
        assert_eq!(set.records()[0].genus, "contig_1");
    }
}

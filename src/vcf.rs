use crate::error::{PrepError, Result};
use crate::{Info, MutationType, Value};
use csv;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One ALT allele of a VCF data line.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: String,
    pub ref_allele: String,
    pub alt: String,
    pub qual: Value,
    pub filter: String,
    pub mutation_type: MutationType,
    /// Every INFO key seen in the file; `None` where this line lacks it.
    pub info: Info,
    pub allele_frequency: Option<f64>,
}

/// All alleles of one VCF file for a single reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantRecords {
    columns: Vec<String>,
    info_keys: Vec<String>,
    records: Vec<VariantRecord>,
}

impl VariantRecords {
    /// Header columns of the file, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Union of INFO keys over all selected lines, sorted.
    pub fn info_keys(&self) -> &[String] {
        &self.info_keys
    }

    pub fn records(&self) -> &[VariantRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariantRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one INFO key across all records, `None` for unknown keys.
    pub fn info_column(&self, key: &str) -> Option<Vec<Option<&Value>>> {
        if !self.info_keys.iter().any(|k| k == key) {
            return None;
        }
        Some(
            self.records
                .iter()
                .map(|r| r.info.get(key).and_then(|v| v.as_ref()))
                .collect(),
        )
    }
}

/// Result of reading one VCF file.
///
/// A missing header or a file without lines for the reference is not an
/// error; callers usually continue with `into_records()`.
#[derive(Debug, Clone, PartialEq)]
pub enum VcfOutcome {
    Records(VariantRecords),
    MissingHeader,
    /// Carries the header columns with zero records.
    NoMatchingLines(VariantRecords),
}

impl VcfOutcome {
    pub fn into_records(self) -> VariantRecords {
        match self {
            Self::Records(records) | Self::NoMatchingLines(records) => records,
            Self::MissingHeader => VariantRecords::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Records(records) => records.is_empty(),
            _ => true,
        }
    }
}

fn info_pairs(field: &str) -> impl Iterator<Item = (&str, &str)> {
    field.split(';').filter_map(|entry| entry.split_once('='))
}

/// Value for allele `i`; single valued fields are broadcast.
fn broadcast<'a>(values: &[&'a str], i: usize) -> &'a str {
    values
        .get(i)
        .or_else(|| values.first())
        .copied()
        .unwrap_or("")
}

pub struct VcfBuilder {
    reference: String,
    header_marker: String,
}

impl VcfBuilder {
    /// Construct a new VCF reader for lines of `reference`
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_owned(),
            header_marker: "#CHROM".to_owned(),
        }
    }

    pub fn header_marker(&mut self, header_marker: &str) -> &mut Self {
        self.header_marker = header_marker.to_owned();
        self
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<VcfOutcome> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        self.parse(Box::new(file), &path.display().to_string())
    }

    pub fn from_reader(&self, reader: Box<dyn Read>) -> Result<VcfOutcome> {
        self.parse(reader, "<reader>")
    }

    fn parse(&self, reader: Box<dyn Read>, source: &str) -> Result<VcfOutcome> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut header: Option<Vec<String>> = None;
        let mut lines = vec![];
        for row in rdr.records() {
            let row = row?;
            let first = row.get(0).unwrap_or("");
            if header.is_none() && first.starts_with(&self.header_marker) {
                header = Some(row.iter().map(|s| s.to_owned()).collect());
            } else if first == self.reference {
                let line = row.position().map_or(0, |p| p.line());
                lines.push((line, row));
            }
        }

        let columns = match header {
            Some(columns) => columns,
            None => {
                warn!("{} does not contain a '{}' header", source, self.header_marker);
                return Ok(VcfOutcome::MissingHeader);
            }
        };
        if let Some((line, row)) = lines.iter().find(|(_, row)| row.len() < 8) {
            return Err(PrepError::malformed(
                source,
                *line,
                format!("expected at least 8 tab separated fields, found {}", row.len()),
            ));
        }

        if lines.is_empty() {
            warn!("{} has no variants to {}", source, self.reference);
            return Ok(VcfOutcome::NoMatchingLines(VariantRecords {
                columns,
                info_keys: vec![],
                records: vec![],
            }));
        }

        let info_keys: BTreeSet<&str> = lines
            .iter()
            .flat_map(|(_, row)| info_pairs(&row[7]).map(|(key, _)| key))
            .collect();

        let mut records = vec![];
        for (line, row) in &lines {
            records.extend(self.split_alleles(*line, row, &info_keys, source)?);
        }
        debug!(
            "{}: {} lines to {} gave {} alleles",
            source,
            lines.len(),
            self.reference,
            records.len()
        );

        Ok(VcfOutcome::Records(VariantRecords {
            columns,
            info_keys: info_keys.iter().map(|k| k.to_string()).collect(),
            records,
        }))
    }

    fn split_alleles(
        &self,
        line: u64,
        row: &csv::StringRecord,
        info_keys: &BTreeSet<&str>,
        source: &str,
    ) -> Result<Vec<VariantRecord>> {
        let n_alleles = row[4].split(',').count();
        let fixed: Vec<Vec<&str>> = (0..7).map(|i| row[i].split(',').collect()).collect();
        let info_values: BTreeMap<&str, Vec<&str>> = info_pairs(&row[7])
            .map(|(key, value)| (key, value.split(',').collect()))
            .collect();

        (0..n_alleles)
            .map(|i| {
                let pos_field = broadcast(&fixed[1], i);
                let pos = pos_field.parse::<u64>().map_err(|_| {
                    PrepError::malformed(source, line, format!("invalid position '{}'", pos_field))
                })?;
                let ref_allele = broadcast(&fixed[3], i);
                let alt = broadcast(&fixed[4], i);

                let info: Info = info_keys
                    .iter()
                    .map(|key| {
                        let value = info_values
                            .get(key)
                            .map(|values| Value::parse(broadcast(values, i)));
                        (key.to_string(), value)
                    })
                    .collect();
                let allele_frequency = info
                    .get("AF")
                    .and_then(|v| v.as_ref())
                    .and_then(Value::as_f64);

                Ok(VariantRecord {
                    chrom: broadcast(&fixed[0], i).to_owned(),
                    pos,
                    id: broadcast(&fixed[2], i).to_owned(),
                    ref_allele: ref_allele.to_owned(),
                    alt: alt.to_owned(),
                    qual: Value::parse(broadcast(&fixed[5], i)),
                    filter: broadcast(&fixed[6], i).to_owned(),
                    mutation_type: MutationType::classify(ref_allele, alt),
                    info,
                    allele_frequency,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    const HEADER: &str = "##fileformat=VCFv4.2\n\
        ##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn read(body: &str) -> Result<VcfOutcome, PrepError> {
        let text = format!("{}{}", HEADER, body);
        VcfBuilder::new("MN908947.3").from_reader(Box::new(std::io::Cursor::new(text)))
    }

    #[test]
    fn test_multi_allelic_line_is_split_and_broadcast() -> Result<(), Box<dyn Error>> {
        let records = read("MN908947.3\t100\trs1\tA\tG,AT,T\t50\tPASS\tDP=10;AF=0.2,0.3,0.4\n")?
            .into_records();
        assert_eq!(records.len(), 3);
        for record in records.iter() {
            assert_eq!(record.chrom, "MN908947.3");
            assert_eq!(record.pos, 100);
            assert_eq!(record.id, "rs1");
            assert_eq!(record.ref_allele, "A");
            assert_eq!(record.qual, Value::Integer(50));
            assert_eq!(record.filter, "PASS");
            assert_eq!(record.info["DP"], Some(Value::Integer(10)));
        }
        let alts: Vec<&str> = records.iter().map(|r| r.alt.as_str()).collect();
        assert_eq!(alts, vec!["G", "AT", "T"]);
        let types: Vec<MutationType> = records.iter().map(|r| r.mutation_type).collect();
        assert_eq!(
            types,
            vec![MutationType::Snv, MutationType::Ins, MutationType::Snv]
        );
        let afs: Vec<Option<f64>> = records.iter().map(|r| r.allele_frequency).collect();
        assert_eq!(afs, vec![Some(0.2), Some(0.3), Some(0.4)]);
        Ok(())
    }

    #[test]
    fn test_deletion_is_classified() -> Result<(), Box<dyn Error>> {
        let records = read("MN908947.3\t200\t.\tAT\tA\t.\tPASS\tAF=1\n")?.into_records();
        assert_eq!(records.records()[0].mutation_type, MutationType::Del);
        assert_eq!(records.records()[0].allele_frequency, Some(1.0));
        assert_eq!(records.records()[0].qual, Value::Text(".".into()));
        Ok(())
    }

    #[test]
    fn test_info_keys_are_uniform_across_lines() -> Result<(), Box<dyn Error>> {
        let records = read(
            "MN908947.3\t10\t.\tC\tT\t60\tPASS\tAF=0.5;EFF=missense(MODERATE|MISSENSE|gCt/gTt|A5V)\n\
             MN908947.3\t20\t.\tG\tA,C\t60\tPASS\tAF=0.1,0.2;INDEL;DP=7\n",
        )?
        .into_records();
        assert_eq!(records.info_keys(), &["AF", "DP", "EFF"]);
        assert_eq!(records.len(), 3);
        for record in records.iter() {
            let keys: Vec<&String> = record.info.keys().collect();
            assert_eq!(keys, vec!["AF", "DP", "EFF"]);
        }
        assert_eq!(records.records()[0].info["DP"], None);
        assert_eq!(records.records()[1].info["EFF"], None);
        assert_eq!(records.records()[2].info["EFF"], None);

        let dp = records.info_column("DP").unwrap();
        assert_eq!(dp, vec![None, Some(&Value::Integer(7)), Some(&Value::Integer(7))]);
        assert!(records.info_column("INDEL").is_none());
        Ok(())
    }

    #[test]
    fn test_missing_header_is_reported() -> Result<(), Box<dyn Error>> {
        let outcome = VcfBuilder::new("MN908947.3").from_reader(Box::new(
            "MN908947.3\t10\t.\tC\tT\t60\tPASS\tAF=0.5\n".as_bytes(),
        ))?;
        assert_eq!(outcome, VcfOutcome::MissingHeader);
        assert!(outcome.into_records().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_header_wins_over_short_line() -> Result<(), Box<dyn Error>> {
        let outcome = VcfBuilder::new("ref").from_reader(Box::new("ref\t1\t.\tA\n".as_bytes()))?;
        assert_eq!(outcome, VcfOutcome::MissingHeader);
        Ok(())
    }

    #[test]
    fn test_no_matching_lines_keeps_columns() -> Result<(), Box<dyn Error>> {
        let outcome = read("OTHER.1\t10\t.\tC\tT\t60\tPASS\tAF=0.5\n")?;
        assert!(outcome.is_empty());
        match outcome {
            VcfOutcome::NoMatchingLines(records) => {
                assert_eq!(records.columns().len(), 8);
                assert_eq!(records.columns()[0], "#CHROM");
                assert!(records.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_reference_must_match_whole_field() -> Result<(), Box<dyn Error>> {
        let records = read(
            "MN908947.33\t10\t.\tC\tT\t60\tPASS\tAF=0.5\n\
             MN908947.3\t11\t.\tC\tT\t60\tPASS\tAF=0.5\n",
        )?
        .into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records.records()[0].pos, 11);
        Ok(())
    }

    #[test]
    fn test_short_line_is_malformed() {
        let result = read(
            "MN908947.3\t10\t.\tC\tT\t60\tPASS\tAF=0.5\n\
             MN908947.3\t20\t.\tC\tT\n",
        );
        match result {
            Err(PrepError::MalformedRecord { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_position_is_malformed() {
        let result = read("MN908947.3\tabc\t.\tC\tT\t60\tPASS\tAF=0.5\n");
        assert!(matches!(result, Err(PrepError::MalformedRecord { .. })));
    }
}

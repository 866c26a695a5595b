use crate::error::{PrepError, Result};
use csv;
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
    Unstranded,
}

impl Strand {
    fn parse(field: &str) -> Option<Self> {
        match field {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            "." | "?" => Some(Strand::Unstranded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
            Strand::Unstranded => ".",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An annotated interval. `attributes` holds everything but the ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub attributes: BTreeMap<String, String>,
    pub start: u64,
    pub stop: u64,
    pub strand: Strand,
}

impl Feature {
    /// The `Name` attribute, if the feature has one
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("Name").map(|s| s.as_str())
    }

    /// Whether `pos` lies in `[start, stop)`.
    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos < self.stop
    }
}

/// Features of one reference, indexed by type and then by ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationIndex {
    features: BTreeMap<String, BTreeMap<String, Feature>>,
}

impl AnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a feature, replacing any earlier one with the same type and ID.
    pub fn insert(&mut self, feature_type: &str, id: &str, feature: Feature) {
        self.features
            .entry(feature_type.into())
            .or_insert_with(BTreeMap::new)
            .insert(id.into(), feature);
    }

    pub fn get(&self, feature_type: &str, id: &str) -> Option<&Feature> {
        self.features.get(feature_type).and_then(|f| f.get(id))
    }

    pub fn features_of(&self, feature_type: &str) -> Option<&BTreeMap<String, Feature>> {
        self.features.get(feature_type)
    }

    pub fn types(&self) -> Vec<&String> {
        self.features.keys().collect()
    }

    /// Total number of indexed features over all types
    pub fn len(&self) -> usize {
        self.features.values().map(|f| f.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// End of the genome: the largest stop of any `region` feature.
pub fn genome_end(index: &AnnotationIndex) -> Result<u64> {
    let regions = index.features_of("region").ok_or(PrepError::MissingRegion)?;
    Ok(regions.values().map(|f| f.stop).max().unwrap_or(0))
}

/// Decodes GFF3 percent escapes such as `%3B` and `%2C`.
fn unescape(value: &str) -> String {
    if !value.contains('%') {
        return value.to_owned();
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_attributes(field: &str) -> BTreeMap<String, String> {
    field
        .split(';')
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), unescape(value.trim())))
        .collect()
}

pub struct Gff3Builder {
    reference: String,
}

impl Gff3Builder {
    /// Construct a new GFF3 reader for features of `reference`
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_owned(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<AnnotationIndex> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        self.parse(Box::new(file), &path.display().to_string())
    }

    pub fn from_reader(&self, reader: Box<dyn Read>) -> Result<AnnotationIndex> {
        self.parse(reader, "<reader>")
    }

    fn parse(&self, reader: Box<dyn Read>, source: &str) -> Result<AnnotationIndex> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut index = AnnotationIndex::new();
        for row in rdr.records() {
            let row = row?;
            if row.get(0) != Some(self.reference.as_str()) {
                continue;
            }
            let line = row.position().map_or(0, |p| p.line());
            if row.len() < 9 {
                return Err(PrepError::malformed(
                    source,
                    line,
                    format!("expected 9 tab separated fields, found {}", row.len()),
                ));
            }
            // features known only through Parent= are not indexed
            if !row[8].starts_with("ID=") {
                continue;
            }

            let mut attributes = parse_attributes(&row[8]);
            let id = match attributes.remove("ID") {
                Some(id) if !id.is_empty() => id,
                _ => {
                    debug!("{} line {}: empty ID, skipped", source, line);
                    continue;
                }
            };
            let coordinate = |idx: usize| {
                row[idx].parse::<u64>().map_err(|_| {
                    PrepError::malformed(source, line, format!("invalid coordinate '{}'", &row[idx]))
                })
            };
            let (start, stop) = (coordinate(3)?, coordinate(4)?);
            if start > stop {
                return Err(PrepError::malformed(
                    source,
                    line,
                    format!("start {} is after stop {}", start, stop),
                ));
            }
            let strand = Strand::parse(&row[6]).ok_or_else(|| {
                PrepError::malformed(source, line, format!("invalid strand '{}'", &row[6]))
            })?;

            index.insert(
                &row[2],
                &id,
                Feature {
                    attributes,
                    start,
                    stop,
                    strand,
                },
            );
        }

        if index.is_empty() {
            return Err(PrepError::ReferenceNotFound {
                reference: self.reference.clone(),
            });
        }
        debug!("{}: indexed {} features", source, index.len());
        Ok(index)
    }
}

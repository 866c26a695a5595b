use crate::error::{PrepError, Result};
use crate::MutationId;
use csv;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Suffix of a mutation whose amino acid change has no score.
pub const SCORE_NOT_AVAILABLE: &str = "nan";

/// Scores keyed by amino acid change, e.g. `A23V`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    scores: HashMap<String, String>,
}

impl ScoreTable {
    pub fn get(&self, aa_change: &str) -> Option<&str> {
        self.scores.get(aa_change).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Attaches the score of each mutation's amino acid change.
    pub fn annotate(&self, mutations: &[MutationId]) -> Vec<ScoredMutation> {
        mutations
            .iter()
            .map(|mutation| ScoredMutation {
                score: mutation
                    .aa_change()
                    .and_then(|aa| self.get(aa))
                    .map(str::to_owned),
                mutation: mutation.clone(),
            })
            .collect()
    }
}

/// A mutation with its score, displayed as `id_score` or `id_nan`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMutation {
    pub mutation: MutationId,
    pub score: Option<String>,
}

impl ScoredMutation {
    pub fn score_value(&self) -> Option<f64> {
        self.score.as_ref().and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for ScoredMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}",
            self.mutation,
            self.score.as_deref().unwrap_or(SCORE_NOT_AVAILABLE)
        )
    }
}

pub struct ScoreTableBuilder {
    aa_column: String,
    score_column: String,
    delimiter: u8,
}

impl ScoreTableBuilder {
    /// Construct a new builder reading `aa_column` and `score_column`
    pub fn new(aa_column: &str, score_column: &str) -> Self {
        Self {
            aa_column: aa_column.to_owned(),
            score_column: score_column.to_owned(),
            delimiter: b',',
        }
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<ScoreTable> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        self.parse(Box::new(file), &path.display().to_string())
    }

    pub fn from_reader(&self, reader: Box<dyn Read>) -> Result<ScoreTable> {
        self.parse(reader, "<reader>")
    }

    fn parse(&self, reader: Box<dyn Read>, source: &str) -> Result<ScoreTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PrepError::MissingColumn {
                    source_name: source.to_owned(),
                    column: name.to_owned(),
                })
        };
        let (aa_idx, score_idx) = (column(&self.aa_column)?, column(&self.score_column)?);

        let mut scores = HashMap::new();
        for row in rdr.records() {
            let row = row?;
            if let (Some(aa), Some(score)) = (row.get(aa_idx), row.get(score_idx)) {
                scores.insert(aa.to_owned(), score.to_owned());
            }
        }
        Ok(ScoreTable { scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MutationType;
    use std::error::Error;

    const SCORES: &str = "mutant,site,bind_avg\nA23V,23,0.12\nN501Y,501,1.5\n";

    #[test]
    fn test_annotate_scores() -> Result<(), Box<dyn Error>> {
        let table = ScoreTableBuilder::new("mutant", "bind_avg").from_reader(Box::new(SCORES.as_bytes()))?;
        assert_eq!(table.len(), 2);

        let mutations = vec![
            MutationId::new(23, "C", "T", MutationType::Snv).with_aa_change("A23V"),
            MutationId::new(501, "A", "T", MutationType::Snv).with_aa_change("K501T"),
            MutationId::new(600, "A", "AT", MutationType::Ins).with_aa_change("-"),
            MutationId::new(700, "A", "T", MutationType::Snv),
        ];
        let scored = table.annotate(&mutations);
        let labels: Vec<String> = scored.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "23_C_T_SNV_A23V_0.12",
                "501_A_T_SNV_K501T_nan",
                "600_A_AT_INS_-_nan",
                "700_A_T_SNV_nan",
            ]
        );
        assert_eq!(scored[0].score_value(), Some(0.12));
        assert_eq!(scored[1].score_value(), None);
        Ok(())
    }

    #[test]
    fn test_tab_delimited_scores() -> Result<(), Box<dyn Error>> {
        let table = ScoreTableBuilder::new("mutant", "bind_avg")
            .delimiter(b'\t')
            .from_reader(Box::new("mutant\tbind_avg\nN501Y\t1.5\n".as_bytes()))?;
        assert_eq!(table.get("N501Y"), Some("1.5"));
        Ok(())
    }

    #[test]
    fn test_missing_column() {
        let result = ScoreTableBuilder::new("mutant", "expr_avg").from_reader(Box::new(SCORES.as_bytes()));
        match result {
            Err(PrepError::MissingColumn { column, .. }) => assert_eq!(column, "expr_avg"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }
}

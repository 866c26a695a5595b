use crate::gff3::{AnnotationIndex, Strand};
use crate::MutationId;
use log::{debug, warn};
use std::collections::BTreeSet;

/// A mutated feature and the display track it was placed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneTrack {
    pub name: String,
    pub start: u64,
    pub stop: u64,
    pub strand: Strand,
    pub track: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackLayout {
    genes: Vec<GeneTrack>,
    n_tracks: usize,
}

impl TrackLayout {
    /// Genes ordered by start position.
    pub fn genes(&self) -> &[GeneTrack] {
        &self.genes
    }

    pub fn n_tracks(&self) -> usize {
        self.n_tracks
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn gene(&self, name: &str) -> Option<&GeneTrack> {
        self.genes.iter().find(|g| g.name == name)
    }
}

/// Places every feature of `feature_types` that contains a mutation on the
/// first track whose previous feature ended at or before its start.
///
/// Candidates are ordered by start, stop, name and strand, so the layout is
/// reproducible. Features are named by their `Name` attribute, else by ID.
pub fn layout_tracks<S: AsRef<str>>(
    mutations: &[MutationId],
    index: &AnnotationIndex,
    feature_types: &[S],
) -> TrackLayout {
    let mut candidates: BTreeSet<(u64, u64, String, Strand)> = BTreeSet::new();
    for feature_type in feature_types {
        let features = match index.features_of(feature_type.as_ref()) {
            Some(features) => features,
            None => continue,
        };
        for (id, feature) in features {
            if mutations.iter().any(|m| feature.contains(m.pos())) {
                let name = feature.name().unwrap_or(id);
                candidates.insert((feature.start, feature.stop, name.to_owned(), feature.strand));
            }
        }
    }

    if candidates.is_empty() {
        warn!("either the annotation types were not found in gff3 or the mutations are not within genes");
        return TrackLayout::default();
    }

    // last occupied stop of each track
    let mut track_stops: Vec<u64> = vec![];
    let genes: Vec<GeneTrack> = candidates
        .into_iter()
        .map(|(start, stop, name, strand)| {
            let track = match track_stops.iter().position(|last| *last <= start) {
                Some(track) => track,
                None => {
                    track_stops.push(0);
                    track_stops.len() - 1
                }
            };
            track_stops[track] = stop;
            GeneTrack {
                name,
                start,
                stop,
                strand,
                track,
            }
        })
        .collect();

    debug!("{} genes laid out on {} tracks", genes.len(), track_stops.len());
    TrackLayout {
        genes,
        n_tracks: track_stops.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gff3::Feature;
    use crate::MutationType;
    use std::collections::BTreeMap;

    fn feature(start: u64, stop: u64, name: Option<&str>) -> Feature {
        let mut attributes = BTreeMap::new();
        if let Some(name) = name {
            attributes.insert("Name".to_owned(), name.to_owned());
        }
        Feature {
            attributes,
            start,
            stop,
            strand: Strand::Forward,
        }
    }

    fn mutations(positions: &[u64]) -> Vec<MutationId> {
        positions
            .iter()
            .map(|p| MutationId::new(*p, "A", "G", MutationType::Snv))
            .collect()
    }

    #[test]
    fn test_overlapping_genes_get_separate_tracks() {
        let mut index = AnnotationIndex::new();
        index.insert("gene", "g1", feature(10, 50, Some("A")));
        index.insert("gene", "g2", feature(20, 40, Some("B")));
        index.insert("gene", "g3", feature(60, 80, Some("C")));

        let layout = layout_tracks(&mutations(&[15, 25, 65]), &index, &["gene"]);
        assert_eq!(layout.n_tracks(), 2);
        let names: Vec<&str> = layout.genes().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_ne!(layout.gene("A").unwrap().track, layout.gene("B").unwrap().track);
        assert_eq!(layout.gene("C").unwrap().track, 0);
    }

    #[test]
    fn test_adjacent_genes_share_a_track() {
        let mut index = AnnotationIndex::new();
        index.insert("gene", "g1", feature(10, 50, None));
        index.insert("gene", "g2", feature(50, 90, None));

        let layout = layout_tracks(&mutations(&[20, 60]), &index, &["gene"]);
        assert_eq!(layout.n_tracks(), 1);
        assert_eq!(layout.gene("g1").unwrap().track, 0);
        assert_eq!(layout.gene("g2").unwrap().track, 0);
    }

    #[test]
    fn test_only_genes_with_mutations_are_placed() {
        let mut index = AnnotationIndex::new();
        index.insert("gene", "g1", feature(10, 50, Some("A")));
        index.insert("gene", "g2", feature(100, 200, Some("B")));
        index.insert("region", "r1", feature(1, 1000, None));

        let layout = layout_tracks(&mutations(&[50, 150]), &index, &["gene"]);
        // 50 is the exclusive end of A
        assert_eq!(layout.genes().len(), 1);
        assert_eq!(layout.genes()[0].name, "B");
    }

    #[test]
    fn test_identical_features_are_deduplicated() {
        let mut index = AnnotationIndex::new();
        index.insert("gene", "gene-S", feature(100, 200, Some("S")));
        index.insert("CDS", "cds-S", feature(100, 200, Some("S")));

        let layout = layout_tracks(&mutations(&[150]), &index, &["gene", "CDS"]);
        assert_eq!(layout.genes().len(), 1);
        assert_eq!(layout.n_tracks(), 1);
    }

    #[test]
    fn test_no_candidates_gives_empty_layout() {
        let mut index = AnnotationIndex::new();
        index.insert("gene", "g1", feature(10, 50, None));

        assert!(layout_tracks(&mutations(&[500]), &index, &["gene"]).is_empty());
        let layout = layout_tracks(&mutations(&[20]), &index, &["mRNA"]);
        assert_eq!(layout, TrackLayout::default());
        assert_eq!(layout.n_tracks(), 0);
        assert!(layout_tracks(&[], &index, &["gene"]).is_empty());
    }

    #[test]
    fn test_layout_ignores_insertion_order() {
        let genes = [
            ("g1", 10, 50),
            ("g2", 20, 40),
            ("g3", 30, 70),
            ("g4", 45, 90),
            ("g5", 60, 80),
        ];
        let mut forward = AnnotationIndex::new();
        let mut backward = AnnotationIndex::new();
        for (id, start, stop) in genes.iter() {
            forward.insert("gene", id, feature(*start, *stop, None));
        }
        for (id, start, stop) in genes.iter().rev() {
            backward.insert("gene", id, feature(*start, *stop, None));
        }
        let positions = mutations(&[35, 65]);
        let a = layout_tracks(&positions, &forward, &["gene"]);
        let b = layout_tracks(&positions, &backward, &["gene"]);
        assert_eq!(a, b);
        assert_eq!(a.n_tracks(), 3);
    }
}

use crate::{Cohort, MutationId};
use log::debug;

/// Default spread below which a mutation present in every sample is
/// considered fixed.
///
/// The value is a heuristic carried over from earlier heatmaps and has no
/// statistical basis; callers can choose another through
/// `PipelineConfig::common_spread`.
pub const DEFAULT_COMMON_SPREAD: f64 = 0.5;

fn is_zero_or_common(column: ndarray::ArrayView1<f64>, spread: f64) -> bool {
    if column.iter().all(|x| *x == 0.0) {
        return true;
    }
    if column.iter().all(|x| *x > 0.0) {
        let max = column.iter().cloned().fold(f64::MIN, f64::max);
        let min = column.iter().cloned().fold(f64::MAX, f64::min);
        return max - min < spread;
    }
    false
}

/// Drops mutations that are absent everywhere or present everywhere with
/// frequencies closer together than `spread`.
///
/// `[0.8, 0.7, 0.3]` is kept whereas `[0.8, 0.7, 0.7]` is dropped. Masked
/// cells hold 0 and count as absent.
pub fn delete_common_mutations(cohort: &Cohort, spread: f64) -> Cohort {
    let filtered = cohort.retain_columns(|_, column| !is_zero_or_common(column, spread));
    debug!(
        "common filter removed {} of {} mutations",
        cohort.mutations().len() - filtered.mutations().len(),
        cohort.mutations().len()
    );
    filtered
}

/// Drops mutations found in at most `min_samples` samples.
pub fn delete_rare_mutations(cohort: &Cohort, min_samples: usize) -> Cohort {
    let filtered = cohort.retain_columns(|_, column| {
        column.iter().filter(|x| **x > 0.0).count() > min_samples
    });
    debug!(
        "recurrence filter removed {} of {} mutations",
        cohort.mutations().len() - filtered.mutations().len(),
        cohort.mutations().len()
    );
    filtered
}

/// Mutations whose position lies in the inclusive window `[start, stop]`.
///
/// Only the axis is restricted; use `Cohort::zoom` to keep a matrix aligned.
pub fn zoom_to_region(mutations: &[MutationId], start: u64, stop: u64) -> Vec<MutationId> {
    mutations
        .iter()
        .filter(|m| start <= m.pos() && m.pos() <= stop)
        .cloned()
        .collect()
}

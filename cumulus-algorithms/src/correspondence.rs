//! Feature-space correspondence matching

use crate::features::Feature;
use crate::nearest_neighbor::FeatureIndex;
use crate::parallel::{self, Parallelism};
use cumulus_core::{Error, Result};
use log::{debug, warn};
use rayon::prelude::*;

/// Index pairs linking source entries to matching target entries, ordered
/// by source index.
pub type CorrespondenceSet = Vec<(usize, usize)>;

/// Match every source feature to its nearest target feature.
///
/// With `mutual_filter`, a backward pass runs concurrently and only pairs
/// whose backward match points straight back are kept; should that leave
/// fewer than `mutual_consistent_ratio * source_count` pairs, the unfiltered
/// forward set is returned instead — callers must not assume the filter was
/// actually applied.
///
/// # Arguments
/// * `source` - Source feature matrix
/// * `target` - Target feature matrix; must have the same dimension
/// * `mutual_filter` - Keep only two-way consistent matches
/// * `mutual_consistent_ratio` - Minimum surviving fraction before the
///   filter result is discarded
///
/// # Errors
/// Returns [`Error::InvalidData`] on a feature dimension mismatch or when
/// the target is empty while the source is not.
pub fn correspondences_from_features(
    source: &Feature,
    target: &Feature,
    mutual_filter: bool,
    mutual_consistent_ratio: f64,
) -> Result<CorrespondenceSet> {
    correspondences_from_features_with(
        source,
        target,
        mutual_filter,
        mutual_consistent_ratio,
        Parallelism::Auto,
    )
}

/// [`correspondences_from_features`] with an explicit thread configuration.
pub fn correspondences_from_features_with(
    source: &Feature,
    target: &Feature,
    mutual_filter: bool,
    mutual_consistent_ratio: f64,
    parallelism: Parallelism,
) -> Result<CorrespondenceSet> {
    if source.num() == 0 {
        return Ok(CorrespondenceSet::new());
    }
    if target.num() == 0 {
        return Err(Error::InvalidData("target feature set is empty".to_string()));
    }
    if source.dimension() != target.dimension() {
        return Err(Error::InvalidData(format!(
            "feature dimension mismatch: {} vs {}",
            source.dimension(),
            target.dimension()
        )));
    }

    parallel::install(parallelism, || {
        if !mutual_filter {
            return nearest_matches(source, target);
        }

        // Forward and backward searches are independent phases.
        let (forward, backward) = rayon::join(
            || nearest_matches(source, target),
            || nearest_matches(target, source),
        );
        let forward = forward?;
        let backward = backward?;

        let mutual: CorrespondenceSet = forward
            .iter()
            .copied()
            .filter(|&(i, j)| backward[j].1 == i)
            .collect();

        if mutual.len() as f64 >= mutual_consistent_ratio * source.num() as f64 {
            debug!("{} correspondences remain after mutual filter", mutual.len());
            Ok(mutual)
        } else {
            warn!(
                "Too few correspondences ({}) after mutual filter, falling back to original correspondences",
                mutual.len()
            );
            Ok(forward)
        }
    })?
}

/// Nearest-target match for every query column, ordered by query index.
fn nearest_matches(queries: &Feature, targets: &Feature) -> Result<CorrespondenceSet> {
    let index = FeatureIndex::from_feature(targets)?;
    (0..queries.num())
        .into_par_iter()
        .map(|i| {
            let column: Vec<f64> = queries.data.column(i).iter().copied().collect();
            let nearest = index
                .nearest(&column)?
                .ok_or_else(|| Error::Algorithm("feature index returned no match".to_string()))?;
            Ok((i, nearest.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distinct single-dimension descriptors at the given values.
    fn feature_from_values(values: &[f64]) -> Feature {
        let mut feature = Feature::new(1, values.len());
        for (i, value) in values.iter().enumerate() {
            feature.data[(0, i)] = *value;
        }
        feature
    }

    #[test]
    fn test_identical_sets_match_identity_under_mutual_filter() {
        let feature = feature_from_values(&[0.0, 1.0, 2.5, 4.0]);
        let correspondences =
            correspondences_from_features(&feature, &feature, true, 1.0).unwrap();
        assert_eq!(correspondences, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_forward_set_is_ordered_by_source_index() {
        let source = feature_from_values(&[3.0, 0.0, 1.0]);
        let target = feature_from_values(&[0.9, 3.1]);
        let correspondences =
            correspondences_from_features(&source, &target, false, 0.0).unwrap();
        assert_eq!(correspondences, vec![(0, 1), (1, 0), (2, 0)]);
    }

    #[test]
    fn test_mutual_set_is_subset_of_forward_set() {
        let source = feature_from_values(&[0.0, 0.2, 3.0, 5.0]);
        let target = feature_from_values(&[0.1, 3.1, 4.9]);
        let forward = correspondences_from_features(&source, &target, false, 0.0).unwrap();
        let mutual = correspondences_from_features(&source, &target, true, 0.0).unwrap();
        for pair in &mutual {
            assert!(forward.contains(pair));
        }
    }

    #[test]
    fn test_mutual_filter_falls_back_when_too_few_pairs_survive() {
        // Both source features map to the single target; only one backward
        // match can agree, so the mutual set has one pair out of two.
        let source = feature_from_values(&[0.0, 1.0]);
        let target = feature_from_values(&[0.4]);

        let strict = correspondences_from_features(&source, &target, true, 0.9).unwrap();
        assert_eq!(strict, vec![(0, 0), (1, 0)]);

        let lenient = correspondences_from_features(&source, &target, true, 0.5).unwrap();
        assert_eq!(lenient, vec![(0, 0)]);
    }

    #[test]
    fn test_empty_source_yields_empty_set() {
        let source = Feature::new(1, 0);
        let target = feature_from_values(&[0.0]);
        assert!(correspondences_from_features(&source, &target, false, 0.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_target_is_an_error() {
        let source = feature_from_values(&[0.0]);
        let target = Feature::new(1, 0);
        assert!(correspondences_from_features(&source, &target, false, 0.0).is_err());
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let source = Feature::new(2, 1);
        let target = Feature::new(3, 1);
        assert!(correspondences_from_features(&source, &target, false, 0.0).is_err());
    }
}

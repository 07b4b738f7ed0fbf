//! Fast Point Feature Histogram (FPFH) extraction

use crate::nearest_neighbor::KdTreeIndex;
use crate::parallel::{self, Parallelism};
use cumulus_core::{
    Error, NearestNeighborSearch, Point3d, PointCloud, Result, SearchParam, Vector3d,
};
use log::{debug, warn};
use nalgebra::{DMatrix, Vector4};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Descriptor length of an FPFH signature: three 11-bin sub-histograms.
pub const FPFH_DIMENSION: usize = 33;

const BINS_PER_COMPONENT: usize = 11;

/// A dense feature matrix: one descriptor column per point.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Descriptor values, `dimension` rows by `num` columns
    pub data: DMatrix<f64>,
}

impl Feature {
    /// Create a zero-filled feature matrix.
    pub fn new(dimension: usize, num: usize) -> Self {
        Self {
            data: DMatrix::zeros(dimension, num),
        }
    }

    /// Descriptor dimension (number of rows)
    pub fn dimension(&self) -> usize {
        self.data.nrows()
    }

    /// Number of descriptors (columns)
    pub fn num(&self) -> usize {
        self.data.ncols()
    }

    /// Reset to a zero-filled matrix of the given shape.
    pub fn resize(&mut self, dimension: usize, num: usize) {
        self.data = DMatrix::zeros(dimension, num);
    }

    /// Select columns by index, preserving their original relative order.
    ///
    /// With `invert` the listed columns are dropped instead. Out-of-bounds
    /// indices are skipped with a warning; duplicates count once.
    pub fn select_by_index(&self, indices: &[usize], invert: bool) -> Feature {
        let mut mask = vec![invert; self.num()];
        for &index in indices {
            if index < mask.len() {
                mask[index] = !invert;
            } else {
                warn!("select_by_index: index {} is out of bounds", index);
            }
        }

        let kept: Vec<usize> = (0..self.num()).filter(|&i| mask[i]).collect();
        let mut output = Feature::new(self.dimension(), kept.len());
        for (column, &index) in kept.iter().enumerate() {
            output.data.set_column(column, &self.data.column(index));
        }
        debug!(
            "select_by_index: down sampled from {} features to {} features",
            self.num(),
            output.num()
        );
        output
    }
}

/// The four-dimensional pair feature between two oriented points: the three
/// Darboux-frame angles and the point distance.
///
/// Coincident points and pairs whose reference normal is parallel to the
/// connecting vector carry no directional information and produce the zero
/// vector. The point whose normal makes the smaller angle with the
/// connecting vector serves as the frame origin; the comparison is a strict
/// `>` with no tolerance.
pub fn pair_features(p1: &Point3d, n1: &Vector3d, p2: &Point3d, n2: &Vector3d) -> Vector4<f64> {
    let mut result = Vector4::zeros();
    let mut dp2p1 = p2 - p1;
    result[3] = dp2p1.norm();
    if result[3] == 0.0 {
        return Vector4::zeros();
    }

    let mut n1_copy = *n1;
    let mut n2_copy = *n2;
    let angle1 = n1_copy.dot(&dp2p1) / result[3];
    let angle2 = n2_copy.dot(&dp2p1) / result[3];
    if angle1.abs().acos() > angle2.abs().acos() {
        n1_copy = *n2;
        n2_copy = *n1;
        dp2p1 = -dp2p1;
        result[2] = -angle2;
    } else {
        result[2] = angle1;
    }

    let v = dp2p1.cross(&n1_copy);
    let v_norm = v.norm();
    if v_norm == 0.0 {
        return Vector4::zeros();
    }
    let v = v / v_norm;
    let w = n1_copy.cross(&v);
    result[1] = v.dot(&n2_copy);
    result[0] = w.dot(&n2_copy).atan2(n1_copy.dot(&n2_copy));
    result
}

fn histogram_bin(value: f64, offset: f64, scale: f64) -> usize {
    let bin = (BINS_PER_COMPONENT as f64 * (value + offset) * scale).floor() as i32;
    bin.clamp(0, BINS_PER_COMPONENT as i32 - 1) as usize
}

/// Simplified Point Feature Histogram of every point: three 11-bin
/// percentage histograms over the pair features against its neighborhood.
///
/// Slot 0 of a neighbor query is the query point itself and is skipped;
/// points with fewer than two neighbors keep an all-zero column.
fn compute_spfh(cloud: &PointCloud, index: &KdTreeIndex<3>, search: &SearchParam) -> Feature {
    let columns: Vec<[f64; FPFH_DIMENSION]> = cloud
        .points
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            let normal = &cloud.normals[i];
            let neighbors = index.search(&[point.x, point.y, point.z], search);
            let mut column = [0.0; FPFH_DIMENSION];
            if neighbors.len() > 1 {
                let hist_incr = 100.0 / (neighbors.len() - 1) as f64;
                for &(neighbor, _) in &neighbors[1..] {
                    let pf = pair_features(
                        point,
                        normal,
                        &cloud.points[neighbor],
                        &cloud.normals[neighbor],
                    );
                    column[histogram_bin(pf[0], PI, 1.0 / (2.0 * PI))] += hist_incr;
                    column[BINS_PER_COMPONENT + histogram_bin(pf[1], 1.0, 0.5)] += hist_incr;
                    column[2 * BINS_PER_COMPONENT + histogram_bin(pf[2], 1.0, 0.5)] += hist_incr;
                }
            }
            column
        })
        .collect();
    feature_from_columns(&columns)
}

fn feature_from_columns(columns: &[[f64; FPFH_DIMENSION]]) -> Feature {
    let mut feature = Feature::new(FPFH_DIMENSION, columns.len());
    for (i, column) in columns.iter().enumerate() {
        for (j, value) in column.iter().enumerate() {
            feature.data[(j, i)] = *value;
        }
    }
    feature
}

/// Compute the FPFH descriptor of every point.
///
/// A first pass builds each point's SPFH; a second pass combines every
/// point's own SPFH with the distance-weighted SPFHs of its neighbors.
/// Points with fewer than two neighbors keep their own SPFH column.
///
/// # Arguments
/// * `cloud` - Input point cloud; must carry normals
/// * `search` - Neighborhood selection used by both passes
///
/// # Errors
/// Returns [`Error::InvalidData`] when the cloud has no normals.
pub fn compute_fpfh_features(cloud: &PointCloud, search: &SearchParam) -> Result<Feature> {
    compute_fpfh_features_with(cloud, search, Parallelism::Auto)
}

/// [`compute_fpfh_features`] with an explicit thread configuration.
pub fn compute_fpfh_features_with(
    cloud: &PointCloud,
    search: &SearchParam,
    parallelism: Parallelism,
) -> Result<Feature> {
    if !cloud.has_normals() {
        return Err(Error::InvalidData(
            "FPFH computation requires a point cloud with normals".to_string(),
        ));
    }

    let index = KdTreeIndex::from_point_cloud(cloud);
    let feature = parallel::install(parallelism, || {
        let spfh = compute_spfh(cloud, &index, search);
        let columns: Vec<[f64; FPFH_DIMENSION]> = cloud
            .points
            .par_iter()
            .enumerate()
            .map(|(i, point)| {
                let neighbors = index.search(&[point.x, point.y, point.z], search);
                let mut column = [0.0; FPFH_DIMENSION];
                if neighbors.len() > 1 {
                    let mut sum = [0.0_f64; 3];
                    for &(neighbor, dist2) in &neighbors[1..] {
                        // Duplicate points would divide by zero.
                        if dist2 == 0.0 {
                            continue;
                        }
                        for j in 0..FPFH_DIMENSION {
                            let value = spfh.data[(j, neighbor)] / dist2;
                            sum[j / BINS_PER_COMPONENT] += value;
                            column[j] += value;
                        }
                    }
                    for group in sum.iter_mut() {
                        if *group != 0.0 {
                            *group = 100.0 / *group;
                        }
                    }
                    for j in 0..FPFH_DIMENSION {
                        column[j] *= sum[j / BINS_PER_COMPONENT];
                        column[j] += spfh.data[(j, i)];
                    }
                } else {
                    for j in 0..FPFH_DIMENSION {
                        column[j] = spfh.data[(j, i)];
                    }
                }
                column
            })
            .collect();
        feature_from_columns(&columns)
    })?;

    debug!(
        "compute_fpfh_features: computed {} features from {} points",
        feature.num(),
        cloud.len()
    );
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn oriented_grid() -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..4 {
            for j in 0..4 {
                cloud
                    .points
                    .push(Point3d::new(i as f64 * 0.1, j as f64 * 0.1, 0.0));
                cloud.normals.push(Vector3d::z());
            }
        }
        cloud
    }

    #[test]
    fn test_pair_features_identical_points_are_zero() {
        let p = Point3d::new(0.3, -0.2, 1.0);
        let n = Vector3d::new(0.0, 1.0, 0.0);
        assert_eq!(pair_features(&p, &n, &p, &n), Vector4::zeros());
    }

    #[test]
    fn test_pair_features_parallel_normal_is_degenerate() {
        // Reference normal parallel to the connecting vector.
        let p1 = Point3d::new(0.0, 0.0, 0.0);
        let p2 = Point3d::new(1.0, 0.0, 0.0);
        let n = Vector3d::x();
        assert_eq!(pair_features(&p1, &n, &p2, &n), Vector4::zeros());
    }

    #[test]
    fn test_pair_features_distance_component() {
        let p1 = Point3d::new(0.0, 0.0, 0.0);
        let p2 = Point3d::new(0.0, 3.0, 4.0);
        let n1 = Vector3d::x();
        let n2 = Vector3d::x();
        let pf = pair_features(&p1, &n1, &p2, &n2);
        assert_relative_eq!(pf[3], 5.0);
    }

    #[test]
    fn test_pair_features_swaps_to_better_aligned_frame() {
        let p1 = Point3d::new(0.0, 0.0, 0.0);
        let p2 = Point3d::new(1.0, 0.0, 0.0);
        // n2 is better aligned with the connecting vector than n1, so the
        // frame swaps and the angle component carries the negated sign.
        let n1 = Vector3d::y();
        let n2 = Vector3d::new(1.0, 1.0, 0.0).normalize();
        let pf = pair_features(&p1, &n1, &p2, &n2);
        assert_relative_eq!(pf[2], -n2.x, epsilon = 1e-12);
    }

    #[test]
    fn test_spfh_histogram_mass_is_100_per_component() {
        let cloud = oriented_grid();
        let index = KdTreeIndex::from_point_cloud(&cloud);
        let spfh = compute_spfh(&cloud, &index, &SearchParam::Knn { k: 6 });
        for i in 0..spfh.num() {
            for group in 0..3 {
                let mass: f64 = (0..BINS_PER_COMPONENT)
                    .map(|bin| spfh.data[(group * BINS_PER_COMPONENT + bin, i)])
                    .sum();
                assert_relative_eq!(mass, 100.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_fpfh_requires_normals() {
        let cloud = PointCloud::from_points(vec![Point3d::origin()]);
        assert!(compute_fpfh_features(&cloud, &SearchParam::Knn { k: 5 }).is_err());
    }

    #[test]
    fn test_fpfh_shape_and_finiteness() {
        let cloud = oriented_grid();
        let feature = compute_fpfh_features(&cloud, &SearchParam::Knn { k: 6 }).unwrap();
        assert_eq!(feature.dimension(), FPFH_DIMENSION);
        assert_eq!(feature.num(), cloud.len());
        for value in feature.data.iter() {
            assert!(value.is_finite());
            assert!(*value >= 0.0);
        }
    }

    #[test]
    fn test_fpfh_isolated_point_falls_back_to_own_spfh() {
        let mut cloud = oriented_grid();
        // Far outside any 0.2 radius neighborhood.
        cloud.points.push(Point3d::new(100.0, 100.0, 100.0));
        cloud.normals.push(Vector3d::z());

        let search = SearchParam::Radius { radius: 0.2 };
        let index = KdTreeIndex::from_point_cloud(&cloud);
        let spfh = compute_spfh(&cloud, &index, &search);
        let fpfh = compute_fpfh_features(&cloud, &search).unwrap();

        let isolated = cloud.len() - 1;
        for j in 0..FPFH_DIMENSION {
            assert_relative_eq!(fpfh.data[(j, isolated)], spfh.data[(j, isolated)]);
        }
    }

    #[test]
    fn test_select_by_index() {
        let mut feature = Feature::new(FPFH_DIMENSION, 5);
        for i in 0..5 {
            feature.data[(0, i)] = i as f64;
        }
        let selected = feature.select_by_index(&[2, 4], false);
        assert_eq!(selected.num(), 2);
        assert_relative_eq!(selected.data[(0, 0)], 2.0);
        assert_relative_eq!(selected.data[(0, 1)], 4.0);

        let inverted = feature.select_by_index(&[2, 4], true);
        assert_eq!(inverted.num(), 3);
        assert_relative_eq!(inverted.data[(0, 0)], 0.0);
        assert_relative_eq!(inverted.data[(0, 1)], 1.0);
        assert_relative_eq!(inverted.data[(0, 2)], 3.0);
    }

    #[test]
    fn test_select_by_index_ignores_out_of_bounds_and_duplicates() {
        let mut feature = Feature::new(2, 3);
        feature.data[(1, 2)] = 7.0;
        let selected = feature.select_by_index(&[2, 2, 9], false);
        assert_eq!(selected.num(), 1);
        assert_relative_eq!(selected.data[(1, 0)], 7.0);
    }
}

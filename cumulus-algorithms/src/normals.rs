//! Normal estimation algorithms

use crate::nearest_neighbor::KdTreeIndex;
use crate::parallel::{self, Parallelism};
use cumulus_core::{
    default_normal, NearestNeighborSearch, Point3d, PointCloud, Result, SearchParam, Vector3d,
};
use log::warn;
use nalgebra::{Matrix3, SymmetricEigen};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Estimate per-point normals by eigen-analysis of the local covariance.
///
/// For each point the neighbors selected by `search` (query point included)
/// form a mean-centered 3x3 covariance matrix whose smallest-eigenvalue
/// eigenvector is taken as the surface normal. Points with fewer than three
/// neighbors get the default normal (0, 0, 1). If the cloud already carried
/// normals, each new normal is flipped to agree in sign with the prior one.
///
/// With `fast_normal_computation` the eigenvector comes from a closed-form
/// solve specialized for symmetric 3x3 matrices; otherwise from a full
/// symmetric eigendecomposition.
///
/// The normal array is replaced wholesale; on return its length equals the
/// point count and every entry is finite and unit length (or the default).
///
/// # Arguments
/// * `cloud` - Point cloud whose normals are (re)estimated in place
/// * `search` - Neighborhood selection, K-nearest or radius-bounded
/// * `fast_normal_computation` - Closed-form eigen solve instead of a full
///   decomposition
///
/// # Example
/// ```rust
/// use cumulus_core::{Point3d, PointCloud, SearchParam};
/// use cumulus_algorithms::estimate_normals;
///
/// fn main() -> cumulus_core::Result<()> {
///     let mut cloud = PointCloud::from_points(vec![
///         Point3d::new(0.0, 0.0, 0.0),
///         Point3d::new(0.1, 0.0, 0.0),
///         Point3d::new(0.0, 0.1, 0.0),
///         Point3d::new(0.1, 0.1, 0.0),
///     ]);
///     estimate_normals(&mut cloud, &SearchParam::Knn { k: 4 }, true)?;
///     assert!(cloud.has_normals());
///     Ok(())
/// }
/// ```
pub fn estimate_normals(
    cloud: &mut PointCloud,
    search: &SearchParam,
    fast_normal_computation: bool,
) -> Result<()> {
    estimate_normals_with(cloud, search, fast_normal_computation, Parallelism::Auto)
}

/// [`estimate_normals`] with an explicit thread configuration.
pub fn estimate_normals_with(
    cloud: &mut PointCloud,
    search: &SearchParam,
    fast_normal_computation: bool,
    parallelism: Parallelism,
) -> Result<()> {
    if !cloud.has_points() {
        warn!("estimate_normals: point cloud is empty");
        return Ok(());
    }

    let index = KdTreeIndex::from_point_cloud(cloud);
    // Prior normals are kept aside for orientation consistency; the cloud
    // gets a freshly computed buffer either way.
    let prior = if cloud.has_normals() {
        Some(std::mem::take(&mut cloud.normals))
    } else {
        None
    };
    let points = &cloud.points;

    let normals = parallel::install(parallelism, || {
        points
            .par_iter()
            .enumerate()
            .map(|(i, point)| {
                let neighbors = index.search(&[point.x, point.y, point.z], search);
                if neighbors.len() < 3 {
                    return default_normal();
                }
                let covariance = neighborhood_covariance(points, &neighbors);
                let mut normal = if fast_normal_computation {
                    fast_eigen_3x3(&covariance)
                } else {
                    smallest_eigenvector(&covariance)
                };
                if normal.iter().any(|c| c.is_nan()) || normal.norm() < 1e-9 {
                    normal = default_normal();
                }
                if let Some(prior) = &prior {
                    if normal.dot(&prior[i]) < 0.0 {
                        normal = -normal;
                    }
                }
                normal
            })
            .collect::<Vec<_>>()
    })?;

    cloud.normals = normals;
    Ok(())
}

/// Mean-centered covariance of a neighborhood, normalized by its size.
fn neighborhood_covariance(points: &[Point3d], neighbors: &[(usize, f64)]) -> Matrix3<f64> {
    let mut mean = Vector3d::zeros();
    for &(index, _) in neighbors {
        mean += points[index].coords;
    }
    mean /= neighbors.len() as f64;

    let mut covariance = Matrix3::zeros();
    for &(index, _) in neighbors {
        let d = points[index].coords - mean;
        covariance += d * d.transpose();
    }
    covariance / neighbors.len() as f64
}

/// Eigenvector of the smallest eigenvalue via a full symmetric
/// eigendecomposition. The decomposition does not order its eigenvalues, so
/// the minimum is selected explicitly.
fn smallest_eigenvector(covariance: &Matrix3<f64>) -> Vector3d {
    let eigen = SymmetricEigen::new(*covariance);
    let mut min_index = 0;
    for j in 1..3 {
        if eigen.eigenvalues[j] < eigen.eigenvalues[min_index] {
            min_index = j;
        }
    }
    eigen.eigenvectors.column(min_index).into_owned()
}

/// Closed-form eigenvector of the smallest eigenvalue of a symmetric 3x3
/// matrix, using the trigonometric solution of the characteristic
/// polynomial. Diagonal matrices reduce to an axis-aligned pick; fully
/// degenerate input yields the zero vector.
fn fast_eigen_3x3(covariance: &Matrix3<f64>) -> Vector3d {
    let mut a = *covariance;
    let max_coeff = a.abs().max();
    if max_coeff == 0.0 {
        return Vector3d::zeros();
    }
    a /= max_coeff;

    let norm = a[(0, 1)] * a[(0, 1)] + a[(0, 2)] * a[(0, 2)] + a[(1, 2)] * a[(1, 2)];
    if norm > 1e-16 {
        let q = a.trace() / 3.0;
        let b00 = a[(0, 0)] - q;
        let b11 = a[(1, 1)] - q;
        let b22 = a[(2, 2)] - q;
        let p = ((b00 * b00 + b11 * b11 + b22 * b22 + norm * 2.0) / 6.0).sqrt();
        if p < 1e-16 {
            return Vector3d::zeros();
        }
        let c00 = b11 * b22 - a[(1, 2)] * a[(1, 2)];
        let c01 = a[(0, 1)] * b22 - a[(1, 2)] * a[(0, 2)];
        let c02 = a[(0, 1)] * a[(1, 2)] - b11 * a[(0, 2)];
        let det = (b00 * c00 - a[(0, 1)] * c01 + a[(0, 2)] * c02) / (p * p * p);

        let half_det = (det * 0.5).clamp(-1.0, 1.0);
        let angle = half_det.acos() / 3.0;
        let two_thirds_pi = 2.0 * PI / 3.0;
        let beta2 = angle.cos() * 2.0;
        let beta0 = (angle + two_thirds_pi).cos() * 2.0;
        let beta1 = -(beta0 + beta2);
        let eval = [q + p * beta0, q + p * beta1, q + p * beta2];

        let mut min_index = 0;
        if eval[1] < eval[min_index] {
            min_index = 1;
        }
        if eval[2] < eval[min_index] {
            min_index = 2;
        }
        eigenvector_for(&a, eval[min_index])
    } else {
        // Diagonal matrix: the axis of the smallest diagonal entry.
        if a[(0, 0)] <= a[(1, 1)] && a[(0, 0)] <= a[(2, 2)] {
            Vector3d::x()
        } else if a[(1, 1)] <= a[(0, 0)] && a[(1, 1)] <= a[(2, 2)] {
            Vector3d::y()
        } else {
            Vector3d::z()
        }
    }
}

/// Eigenvector of a symmetric 3x3 matrix for a known eigenvalue, taken from
/// the largest cross product of rows of `A - eval * I`.
fn eigenvector_for(a: &Matrix3<f64>, eigenvalue: f64) -> Vector3d {
    let row0 = Vector3d::new(a[(0, 0)] - eigenvalue, a[(0, 1)], a[(0, 2)]);
    let row1 = Vector3d::new(a[(0, 1)], a[(1, 1)] - eigenvalue, a[(1, 2)]);
    let row2 = Vector3d::new(a[(0, 2)], a[(1, 2)], a[(2, 2)] - eigenvalue);
    let r0xr1 = row0.cross(&row1);
    let r0xr2 = row0.cross(&row2);
    let r1xr2 = row1.cross(&row2);
    let d0 = r0xr1.dot(&r0xr1);
    let d1 = r0xr2.dot(&r0xr2);
    let d2 = r1xr2.dot(&r1xr2);

    let mut dmax = d0;
    let mut imax = 0;
    if d1 > dmax {
        dmax = d1;
        imax = 1;
    }
    if d2 > dmax {
        dmax = d2;
        imax = 2;
    }
    if dmax <= 1e-16 {
        return Vector3d::zeros();
    }
    match imax {
        0 => r0xr1 / d0.sqrt(),
        1 => r0xr2 / d1.sqrt(),
        _ => r1xr2 / d2.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A tilted planar patch with some in-plane structure.
    fn planar_cloud() -> PointCloud {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                points.push(Point3d::new(i as f64 * 0.1, j as f64 * 0.13, 0.0));
            }
        }
        PointCloud::from_points(points)
    }

    #[test]
    fn test_planar_cloud_normals_are_out_of_plane_accurate() {
        let mut cloud = planar_cloud();
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, false).unwrap();
        assert_eq!(cloud.normals.len(), cloud.len());
        for normal in &cloud.normals {
            assert_relative_eq!(normal.z.abs(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_planar_cloud_normals_are_out_of_plane_fast() {
        let mut cloud = planar_cloud();
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, true).unwrap();
        for normal in &cloud.normals {
            assert_relative_eq!(normal.z.abs(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_normals_are_unit_length_or_default() {
        let mut cloud = planar_cloud();
        cloud.points.push(Point3d::new(0.21, 0.37, 0.49));
        estimate_normals_with(
            &mut cloud,
            &SearchParam::Knn { k: 6 },
            false,
            Parallelism::Threads(2),
        )
        .unwrap();
        for normal in &cloud.normals {
            assert!(normal.iter().all(|c| c.is_finite()));
            let is_unit = (normal.norm() - 1.0).abs() < 1e-9;
            let is_default = *normal == default_normal();
            assert!(is_unit || is_default);
        }
    }

    #[test]
    fn test_too_few_neighbors_yields_default_normal() {
        let mut cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
        ]);
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 10 }, true).unwrap();
        assert_eq!(cloud.normals, vec![default_normal(); 2]);
    }

    #[test]
    fn test_radius_search_without_neighbors_yields_default_normal() {
        let mut cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(10.0, 0.0, 0.0),
            Point3d::new(0.0, 10.0, 0.0),
        ]);
        estimate_normals(&mut cloud, &SearchParam::Radius { radius: 0.5 }, false).unwrap();
        assert_eq!(cloud.normals, vec![default_normal(); 3]);
    }

    #[test]
    fn test_empty_cloud_is_a_noop() {
        let mut cloud = PointCloud::new();
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, true).unwrap();
        assert!(cloud.normals.is_empty());
    }

    #[test]
    fn test_orientation_consistency_with_prior_normals() {
        let mut cloud = planar_cloud();
        cloud.normals = vec![Vector3d::new(0.0, 0.0, -1.0); cloud.len()];
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, false).unwrap();
        for normal in &cloud.normals {
            assert_relative_eq!(*normal, Vector3d::new(0.0, 0.0, -1.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reestimation_never_flips_agreeing_normals() {
        let mut cloud = planar_cloud();
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, false).unwrap();
        let first = cloud.normals.clone();
        estimate_normals(&mut cloud, &SearchParam::Knn { k: 5 }, false).unwrap();
        for (before, after) in first.iter().zip(&cloud.normals) {
            assert!(before.dot(after) >= 0.0);
            assert_relative_eq!(*before, *after, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fast_and_accurate_modes_agree_on_curved_patch() {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let x = i as f64 * 0.1;
                let y = j as f64 * 0.1;
                points.push(Point3d::new(x, y, 0.2 * x * x + 0.1 * y));
            }
        }
        let mut fast_cloud = PointCloud::from_points(points.clone());
        let mut accurate_cloud = PointCloud::from_points(points);
        estimate_normals(&mut fast_cloud, &SearchParam::Knn { k: 8 }, true).unwrap();
        estimate_normals(&mut accurate_cloud, &SearchParam::Knn { k: 8 }, false).unwrap();
        for (fast, accurate) in fast_cloud.normals.iter().zip(&accurate_cloud.normals) {
            assert_relative_eq!(fast.dot(accurate).abs(), 1.0, epsilon = 1e-6);
        }
    }
}

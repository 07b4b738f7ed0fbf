//! Point cloud downsampling

use cumulus_core::{Bounds3D, Error, Point3d, PointCloud, Result, Vector3d};
use log::{debug, warn};
use std::collections::HashMap;

/// Running averages for the points falling into one voxel.
struct AccumulatedPoint {
    num_points: usize,
    point: Vector3d,
    normal: Vector3d,
    color: Vector3d,
    has_normal: bool,
    has_color: bool,
}

impl AccumulatedPoint {
    fn new() -> Self {
        Self {
            num_points: 0,
            point: Vector3d::zeros(),
            normal: Vector3d::zeros(),
            color: Vector3d::zeros(),
            has_normal: false,
            has_color: false,
        }
    }

    fn add(&mut self, cloud: &PointCloud, index: usize) {
        self.point += cloud.points[index].coords;
        if cloud.has_normals() {
            let normal = cloud.normals[index];
            if normal.iter().all(|c| !c.is_nan()) {
                self.normal += normal;
                self.has_normal = true;
            }
        }
        if cloud.has_colors() {
            self.color += cloud.colors[index];
            self.has_color = true;
        }
        self.num_points += 1;
    }

    fn average_point(&self) -> Point3d {
        Point3d::from(self.point / self.num_points as f64)
    }

    fn average_normal(&self) -> Vector3d {
        if self.has_normal {
            self.normal / self.num_points as f64
        } else {
            Vector3d::zeros()
        }
    }

    fn average_color(&self) -> Vector3d {
        if self.has_color {
            self.color / self.num_points as f64
        } else {
            Vector3d::new(0.5, 0.5, 0.5)
        }
    }
}

/// Downsample a point cloud by averaging all points within each voxel.
///
/// Normals and colors, when present on the input, are averaged alongside the
/// positions; averaged normals are renormalized afterwards.
///
/// # Arguments
/// * `cloud` - Input point cloud
/// * `voxel_size` - Edge length of the voxel cubes
///
/// # Errors
/// Returns [`Error::InvalidData`] for a non-positive voxel size, or when the
/// voxel size is so small that grid indices would overflow.
///
/// # Example
/// ```rust
/// use cumulus_core::{Point3d, PointCloud};
/// use cumulus_algorithms::voxel_down_sample;
///
/// fn main() -> cumulus_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3d::new(0.0, 0.0, 0.0),
///         Point3d::new(0.02, 0.0, 0.0),
///         Point3d::new(1.0, 0.0, 0.0),
///     ]);
///     let downsampled = voxel_down_sample(&cloud, 0.1)?;
///     println!("Downsampled cloud has {} points", downsampled.len());
///     Ok(())
/// }
/// ```
pub fn voxel_down_sample(cloud: &PointCloud, voxel_size: f64) -> Result<PointCloud> {
    if voxel_size <= 0.0 {
        return Err(Error::InvalidData("voxel_size must be positive".to_string()));
    }
    if !cloud.has_points() {
        warn!("voxel_down_sample: input point cloud is empty");
        return Ok(PointCloud::new());
    }
    let min_bound = cloud.min_bound();
    let max_bound = cloud.max_bound();
    if voxel_size * (i32::MAX as f64) < (max_bound - min_bound).max() + 1e-9 {
        return Err(Error::InvalidData(
            "voxel_size is too small relative to the cloud extent".to_string(),
        ));
    }

    let mut accumulators: HashMap<(i32, i32, i32), AccumulatedPoint> = HashMap::new();
    for i in 0..cloud.len() {
        let ref_coord = (cloud.points[i] - min_bound) / voxel_size;
        let voxel_index = (
            ref_coord.x.floor() as i32,
            ref_coord.y.floor() as i32,
            ref_coord.z.floor() as i32,
        );
        accumulators
            .entry(voxel_index)
            .or_insert_with(AccumulatedPoint::new)
            .add(cloud, i);
    }

    let keep_normals = cloud.has_normals();
    let keep_colors = cloud.has_colors();
    let mut output = PointCloud::with_capacity(accumulators.len());
    for accumulator in accumulators.values() {
        output.points.push(accumulator.average_point());
        if keep_normals {
            output.normals.push(accumulator.average_normal());
        }
        if keep_colors {
            output.colors.push(accumulator.average_color());
        }
    }
    if output.has_normals() {
        output.normalize_normals();
    }

    debug!(
        "voxel_down_sample: downsampled from {} points to {} points",
        cloud.len(),
        output.len()
    );
    Ok(output)
}

//! Voxel grid geometry

use crate::error::{Error, Result};
use crate::point::{Point3d, Vector3d};
use crate::point_cloud::PointCloud;
use crate::traits::{Bounds3D, GeometryKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Integer grid coordinates of a voxel
pub type GridIndex = (i32, i32, i32);

/// A single voxel: its grid index and a display color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Voxel {
    pub grid_index: GridIndex,
    pub color: Vector3d,
}

impl Voxel {
    pub fn new(grid_index: GridIndex, color: Vector3d) -> Self {
        Self { grid_index, color }
    }
}

/// A sparse, occupancy-based voxel grid.
///
/// Voxel `(i, j, k)` covers the world-space cube starting at
/// `origin + (i, j, k) * voxel_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelGrid {
    /// Edge length of each voxel
    pub voxel_size: f64,
    /// World-space position of grid index (0, 0, 0)
    pub origin: Point3d,
    /// Occupied voxels keyed by grid index
    pub voxels: HashMap<GridIndex, Voxel>,
}

impl VoxelGrid {
    /// Create a new empty voxel grid
    pub fn new() -> Self {
        Self {
            voxel_size: 0.0,
            origin: Point3d::origin(),
            voxels: HashMap::new(),
        }
    }

    /// Check if the grid contains no voxels
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Returns `true` if the grid contains voxels
    pub fn has_voxels(&self) -> bool {
        !self.voxels.is_empty()
    }

    /// The geometry variant tag
    pub fn kind(&self) -> GeometryKind {
        GeometryKind::VoxelGrid
    }

    /// Clear the grid
    pub fn clear(&mut self) {
        self.voxel_size = 0.0;
        self.origin = Point3d::origin();
        self.voxels.clear();
    }

    /// Translate the grid, either by `translation` (relative) or by moving
    /// the origin to `translation` (absolute).
    pub fn translate(&mut self, translation: &Vector3d, relative: bool) -> &mut Self {
        if relative {
            self.origin += *translation;
        } else {
            self.origin = Point3d::from(*translation);
        }
        self
    }

    /// Voxelize a point cloud, padding the cloud bounds by half a voxel.
    ///
    /// Returns an error for a non-positive voxel size; an empty input yields
    /// an empty grid with a warning.
    pub fn create_from_point_cloud(cloud: &PointCloud, voxel_size: f64) -> Result<VoxelGrid> {
        if voxel_size <= 0.0 {
            return Err(Error::InvalidData("voxel_size must be positive".to_string()));
        }
        if !cloud.has_points() {
            warn!("VoxelGrid::create_from_point_cloud: input point cloud is empty");
            return Ok(VoxelGrid::new());
        }
        let half_voxel = Vector3d::new(0.5, 0.5, 0.5) * voxel_size;
        let min_bound = cloud.min_bound() - half_voxel;
        let max_bound = cloud.max_bound() + half_voxel;
        Self::create_from_point_cloud_within_bounds(cloud, voxel_size, &min_bound, &max_bound)
    }

    /// Voxelize a point cloud within explicit bounds; points outside the
    /// bounds are skipped.
    pub fn create_from_point_cloud_within_bounds(
        cloud: &PointCloud,
        voxel_size: f64,
        min_bound: &Point3d,
        max_bound: &Point3d,
    ) -> Result<VoxelGrid> {
        if voxel_size <= 0.0 {
            return Err(Error::InvalidData("voxel_size must be positive".to_string()));
        }
        let max_extent = (max_bound - min_bound).max();
        if max_extent / voxel_size > i32::MAX as f64 {
            return Err(Error::InvalidData(
                "voxel_size is too small for the given bounds".to_string(),
            ));
        }

        let mut grid = VoxelGrid {
            voxel_size,
            origin: *min_bound,
            voxels: HashMap::new(),
        };
        let default_color = Vector3d::new(0.5, 0.5, 0.5);
        for point in &cloud.points {
            if point.x < min_bound.x
                || point.y < min_bound.y
                || point.z < min_bound.z
                || point.x >= max_bound.x
                || point.y >= max_bound.y
                || point.z >= max_bound.z
            {
                continue;
            }
            let ref_coord = (point - min_bound) / voxel_size;
            let grid_index = (
                ref_coord.x.floor() as i32,
                ref_coord.y.floor() as i32,
                ref_coord.z.floor() as i32,
            );
            grid.voxels
                .entry(grid_index)
                .or_insert_with(|| Voxel::new(grid_index, default_color));
        }
        debug!(
            "VoxelGrid: voxelized from {} points to {} voxels",
            cloud.len(),
            grid.voxels.len()
        );
        Ok(grid)
    }
}

impl Default for VoxelGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Bounds3D for VoxelGrid {
    fn min_bound(&self) -> Point3d {
        match self
            .voxels
            .keys()
            .copied()
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.min(b.2)))
        {
            Some(index) => {
                self.origin
                    + Vector3d::new(index.0 as f64, index.1 as f64, index.2 as f64)
                        * self.voxel_size
            }
            None => self.origin,
        }
    }

    fn max_bound(&self) -> Point3d {
        match self
            .voxels
            .keys()
            .copied()
            .reduce(|a, b| (a.0.max(b.0), a.1.max(b.1), a.2.max(b.2)))
        {
            Some(index) => {
                self.origin
                    + Vector3d::new(
                        (index.0 + 1) as f64,
                        (index.1 + 1) as f64,
                        (index.2 + 1) as f64,
                    ) * self.voxel_size
            }
            None => self.origin,
        }
    }

    fn center(&self) -> Point3d {
        if !self.has_voxels() {
            return Point3d::origin();
        }
        let half_voxel = Vector3d::new(0.5, 0.5, 0.5) * self.voxel_size;
        let sum = self.voxels.keys().fold(Vector3d::zeros(), |acc, index| {
            acc + self.origin.coords
                + Vector3d::new(index.0 as f64, index.1 as f64, index.2 as f64) * self.voxel_size
                + half_voxel
        });
        Point3d::from(sum / self.voxels.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_create_from_point_cloud() {
        let cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(0.01, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
        ]);
        let grid = VoxelGrid::create_from_point_cloud(&cloud, 0.1).unwrap();
        assert_eq!(grid.voxels.len(), 2);
        assert_relative_eq!(grid.voxel_size, 0.1);
    }

    #[test]
    fn test_create_rejects_nonpositive_voxel_size() {
        let cloud = PointCloud::from_points(vec![Point3d::origin()]);
        assert!(VoxelGrid::create_from_point_cloud(&cloud, 0.0).is_err());
        assert!(VoxelGrid::create_from_point_cloud(&cloud, -0.5).is_err());
    }

    #[test]
    fn test_create_from_empty_cloud_is_empty() {
        let grid = VoxelGrid::create_from_point_cloud(&PointCloud::new(), 0.1).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn test_within_bounds_skips_outside_points() {
        let cloud = PointCloud::from_points(vec![
            Point3d::new(0.5, 0.5, 0.5),
            Point3d::new(5.0, 5.0, 5.0),
        ]);
        let grid = VoxelGrid::create_from_point_cloud_within_bounds(
            &cloud,
            1.0,
            &Point3d::new(0.0, 0.0, 0.0),
            &Point3d::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        assert_eq!(grid.voxels.len(), 1);
        assert!(grid.voxels.contains_key(&(0, 0, 0)));
    }

    #[test]
    fn test_bounds_span_occupied_voxels() {
        let cloud = PointCloud::from_points(vec![
            Point3d::new(0.05, 0.05, 0.05),
            Point3d::new(0.95, 0.95, 0.95),
        ]);
        let grid = VoxelGrid::create_from_point_cloud_within_bounds(
            &cloud,
            0.1,
            &Point3d::new(0.0, 0.0, 0.0),
            &Point3d::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        assert_relative_eq!(grid.min_bound(), Point3d::new(0.0, 0.0, 0.0));
        assert_relative_eq!(grid.max_bound(), Point3d::new(1.0, 1.0, 1.0));
    }
}

//! Point cloud data structures and functionality

use crate::point::{default_normal, Point3d, Vector3d};
use crate::traits::{Bounds3D, GeometryKind, Transformable3D};
use crate::transform;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A point cloud with optional per-point normals and colors.
///
/// `normals` and `colors` are parallel arrays indexed like `points`; an
/// attribute counts as present only when its length matches `points` exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud {
    /// Point coordinates
    pub points: Vec<Point3d>,
    /// Point normals, parallel to `points`
    pub normals: Vec<Vector3d>,
    /// RGB colors in [0, 1], parallel to `points`
    pub colors: Vec<Vector3d>,
}

impl PointCloud {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new point cloud with capacity for `capacity` points
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            normals: Vec::new(),
            colors: Vec::new(),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<Point3d>) -> Self {
        Self {
            points,
            normals: Vec::new(),
            colors: Vec::new(),
        }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns `true` if the cloud contains points
    pub fn has_points(&self) -> bool {
        !self.points.is_empty()
    }

    /// Returns `true` if every point has a normal
    pub fn has_normals(&self) -> bool {
        self.has_points() && self.normals.len() == self.points.len()
    }

    /// Returns `true` if every point has a color
    pub fn has_colors(&self) -> bool {
        self.has_points() && self.colors.len() == self.points.len()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: Point3d) {
        self.points.push(point);
    }

    /// Clear all points and attributes
    pub fn clear(&mut self) {
        self.points.clear();
        self.normals.clear();
        self.colors.clear();
    }

    /// The geometry variant tag
    pub fn kind(&self) -> GeometryKind {
        GeometryKind::PointCloud
    }

    /// Normalize all normals to unit length; normals that cannot be
    /// normalized are replaced by the default normal (0, 0, 1).
    pub fn normalize_normals(&mut self) -> &mut Self {
        for normal in &mut self.normals {
            if normal.try_normalize_mut(0.0).is_none() || normal.x.is_nan() {
                *normal = default_normal();
            }
        }
        self
    }

    /// Assign `color` (clamped to [0, 1]) to every point.
    pub fn paint_uniform_color(&mut self, color: &Vector3d) -> &mut Self {
        let clamped = color.map(|c| c.clamp(0.0, 1.0));
        self.colors.clear();
        self.colors.resize(self.points.len(), clamped);
        self
    }
}

impl Index<usize> for PointCloud {
    type Output = Point3d;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl IndexMut<usize> for PointCloud {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl Extend<Point3d> for PointCloud {
    fn extend<I: IntoIterator<Item = Point3d>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl FromIterator<Point3d> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3d>>(iter: I) -> Self {
        Self::from_points(Vec::from_iter(iter))
    }
}

impl Bounds3D for PointCloud {
    fn min_bound(&self) -> Point3d {
        self.points
            .iter()
            .fold(None, |acc: Option<Point3d>, p| match acc {
                None => Some(*p),
                Some(m) => Some(Point3d::new(m.x.min(p.x), m.y.min(p.y), m.z.min(p.z))),
            })
            .unwrap_or_else(Point3d::origin)
    }

    fn max_bound(&self) -> Point3d {
        self.points
            .iter()
            .fold(None, |acc: Option<Point3d>, p| match acc {
                None => Some(*p),
                Some(m) => Some(Point3d::new(m.x.max(p.x), m.y.max(p.y), m.z.max(p.z))),
            })
            .unwrap_or_else(Point3d::origin)
    }

    fn center(&self) -> Point3d {
        transform::center_of(&self.points)
    }
}

impl Transformable3D for PointCloud {
    fn transform(&mut self, transformation: &Matrix4<f64>) {
        let has_normals = self.has_normals();
        transform::transform_points(transformation, &mut self.points);
        if has_normals {
            transform::transform_normals(transformation, &mut self.normals);
        }
    }

    fn translate(&mut self, translation: &Vector3d, relative: bool) {
        transform::translate_points(translation, &mut self.points, relative);
    }

    fn scale(&mut self, scale: f64, center: &Point3d) {
        transform::scale_points(scale, &mut self.points, center);
    }

    fn rotate(&mut self, rotation: &Matrix3<f64>, center: &Point3d) {
        let has_normals = self.has_normals();
        transform::rotate_points(rotation, &mut self.points, center);
        if has_normals {
            transform::rotate_normals(rotation, &mut self.normals);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_has_normals_requires_exact_length() {
        let mut cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
        ]);
        assert!(!cloud.has_normals());

        cloud.normals.push(Vector3d::z());
        assert!(!cloud.has_normals());

        cloud.normals.push(Vector3d::z());
        assert!(cloud.has_normals());
    }

    #[test]
    fn test_normalize_normals_replaces_degenerate() {
        let mut cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
        ]);
        cloud.normals = vec![Vector3d::new(0.0, 3.0, 4.0), Vector3d::zeros()];
        cloud.normalize_normals();
        assert_relative_eq!(cloud.normals[0], Vector3d::new(0.0, 0.6, 0.8));
        assert_relative_eq!(cloud.normals[1], Vector3d::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_paint_uniform_color_clamps() {
        let mut cloud = PointCloud::from_points(vec![Point3d::origin()]);
        cloud.paint_uniform_color(&Vector3d::new(2.0, 0.5, -1.0));
        assert!(cloud.has_colors());
        assert_relative_eq!(cloud.colors[0], Vector3d::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn test_bounds() {
        let cloud = PointCloud::from_points(vec![
            Point3d::new(-1.0, 0.0, 2.0),
            Point3d::new(1.0, 4.0, -2.0),
        ]);
        assert_relative_eq!(cloud.min_bound(), Point3d::new(-1.0, 0.0, -2.0));
        assert_relative_eq!(cloud.max_bound(), Point3d::new(1.0, 4.0, 2.0));
        assert_relative_eq!(cloud.center(), Point3d::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_transform_rotates_normals() {
        let mut cloud = PointCloud::from_points(vec![Point3d::new(1.0, 0.0, 0.0)]);
        cloud.normals = vec![Vector3d::x()];
        let rotation =
            nalgebra::Rotation3::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        cloud.rotate(rotation.matrix(), &Point3d::origin());
        assert_relative_eq!(cloud.points[0], Point3d::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(cloud.normals[0], Vector3d::y(), epsilon = 1e-12);
    }
}

//! Core traits for cumulus

use crate::bounding_box::AxisAlignedBoundingBox;
use crate::point::{Point3d, Vector3d};
use nalgebra::{Matrix3, Matrix4};

/// Tag identifying the concrete geometry variant, for the places that need
/// runtime dispatch by type (format detection, diagnostics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    PointCloud,
    TriangleMesh,
    VoxelGrid,
    AxisAlignedBoundingBox,
}

/// Capability trait for geometries with axis-aligned spatial bounds
pub trait Bounds3D {
    /// Minimum bound of the geometry coordinates
    fn min_bound(&self) -> Point3d;

    /// Maximum bound of the geometry coordinates
    fn max_bound(&self) -> Point3d;

    /// Center of the geometry coordinates
    fn center(&self) -> Point3d;

    /// Axis-aligned bounding box enclosing the geometry
    fn axis_aligned_bounding_box(&self) -> AxisAlignedBoundingBox {
        AxisAlignedBoundingBox::new(self.min_bound(), self.max_bound())
    }
}

/// Capability trait for geometries that can be transformed in place.
///
/// Only implemented where the operation keeps the representation valid; an
/// axis-aligned bounding box, for example, does not survive a general
/// transform and therefore lacks this capability.
pub trait Transformable3D {
    /// Apply a 4x4 homogeneous transformation
    fn transform(&mut self, transformation: &Matrix4<f64>);

    /// Translate, either by `translation` (relative) or so the center lands
    /// on `translation` (absolute)
    fn translate(&mut self, translation: &Vector3d, relative: bool);

    /// Scale about `center`
    fn scale(&mut self, scale: f64, center: &Point3d);

    /// Rotate about `center`
    fn rotate(&mut self, rotation: &Matrix3<f64>, center: &Point3d);
}

/// Neighbor search mode for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchParam {
    /// The `k` nearest neighbors
    Knn { k: usize },
    /// All neighbors within `radius`
    Radius { radius: f64 },
}

/// Trait for nearest neighbor search over a fixed set of vectors.
///
/// Queries return `(index, squared_distance)` pairs sorted ascending by
/// distance. Results are transient and never retained by the index.
pub trait NearestNeighborSearch<Q: ?Sized> {
    /// Search according to `param`
    fn search(&self, query: &Q, param: &SearchParam) -> Vec<(usize, f64)>;

    /// Find the `k` nearest neighbors to `query`
    fn knn(&self, query: &Q, k: usize) -> Vec<(usize, f64)> {
        self.search(query, &SearchParam::Knn { k })
    }

    /// Find all neighbors within `radius` of `query`
    fn radius(&self, query: &Q, radius: f64) -> Vec<(usize, f64)> {
        self.search(query, &SearchParam::Radius { radius })
    }
}

//! Point and vector type aliases

use nalgebra::{Point3, Vector3};

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// The fallback normal assigned when a valid unit normal cannot be produced.
pub fn default_normal() -> Vector3d {
    Vector3d::new(0.0, 0.0, 1.0)
}

//! Core data structures and traits for cumulus
//!
//! This crate provides the fundamental types for 3D geometry processing:
//! point clouds, triangle meshes, voxel grids, axis-aligned bounding boxes,
//! transformation helpers, and the capability traits tying them together.

pub mod bounding_box;
pub mod error;
pub mod mesh;
pub mod point;
pub mod point_cloud;
pub mod traits;
pub mod transform;
pub mod voxel_grid;

pub use bounding_box::*;
pub use error::*;
pub use mesh::*;
pub use point::*;
pub use point_cloud::*;
pub use traits::*;
pub use transform::*;
pub use voxel_grid::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Matrix4, Point3, Vector3, Vector4};

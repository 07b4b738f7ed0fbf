//! # Cumulus Algorithms
//!
//! Point cloud processing algorithms for the cumulus toolkit: nearest
//! neighbor search, normal estimation, FPFH feature extraction, feature
//! correspondence matching, and voxel downsampling.

pub mod correspondence;
pub mod downsampling;
pub mod features;
pub mod nearest_neighbor;
pub mod normals;
pub mod parallel;

// Re-export commonly used items
pub use correspondence::*;
pub use downsampling::*;
pub use features::*;
pub use nearest_neighbor::*;
pub use normals::*;
pub use parallel::Parallelism;

//! I/O operations for point clouds and meshes
//!
//! Supports the PLY and XYZ formats with extension-based dispatch.

pub mod ply;
pub mod xyz;

pub use ply::{PlyReader, PlyWriter};
pub use xyz::{XyzReader, XyzWriter};

use cumulus_core::{Error, PointCloud, Result, TriangleMesh};
use std::path::Path;

/// Trait for reading point clouds from files
pub trait PointCloudReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud>;
}

/// Trait for writing point clouds to files
pub trait PointCloudWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()>;
}

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Geometry content a file advertises, determined without a full read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileGeometry {
    PointCloud,
    TriangleMesh,
    Unknown,
}

/// Probe the geometry content of a file by extension and, for PLY, by its
/// header.
pub fn read_file_geometry_type<P: AsRef<Path>>(path: P) -> FileGeometry {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("xyz") => FileGeometry::PointCloud,
        Some("ply") => ply::probe_file_geometry(path).unwrap_or(FileGeometry::Unknown),
        _ => FileGeometry::Unknown,
    }
}

/// Auto-detect format and read a point cloud
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyReader::read_point_cloud(path),
        Some("xyz") => XyzReader::read_point_cloud(path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported point cloud format: {:?}",
            other
        ))),
    }
}

/// Auto-detect format and write a point cloud
pub fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyWriter::write_point_cloud(cloud, path),
        Some("xyz") => XyzWriter::write_point_cloud(cloud, path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported point cloud format: {:?}",
            other
        ))),
    }
}

/// Auto-detect format and read a mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyReader::read_mesh(path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported mesh format: {:?}",
            other
        ))),
    }
}

/// Auto-detect format and write a mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match extension_of(path).as_deref() {
        Some("ply") => PlyWriter::write_mesh(mesh, path),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported mesh format: {:?}",
            other
        ))),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

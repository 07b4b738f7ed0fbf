//! PLY format support

use crate::{FileGeometry, MeshReader, MeshWriter, PointCloudReader, PointCloudWriter};
use cumulus_core::{Error, Point3d, PointCloud, Result, TriangleMesh, Vector3d};
use ply_rs::{
    parser::Parser,
    ply::{
        Addable, DefaultElement, ElementDef, Ply, Property, PropertyDef, PropertyType, ScalarType,
    },
    writer::Writer,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub struct PlyReader;
pub struct PlyWriter;

impl PointCloudReader for PlyReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(&mut reader)?;

        let mut cloud = PointCloud::new();
        if let Some(vertices) = ply.payload.get("vertex") {
            let mut normals = Vec::new();
            let mut colors = Vec::new();
            for vertex in vertices {
                let x = property_value(vertex, "x")?;
                let y = property_value(vertex, "y")?;
                let z = property_value(vertex, "z")?;
                cloud.points.push(Point3d::new(x, y, z));

                if let Some(normal) = optional_vector(vertex, "nx", "ny", "nz") {
                    normals.push(normal);
                }
                if let Some(color) = optional_vector(vertex, "red", "green", "blue") {
                    colors.push(color / 255.0);
                }
            }
            // Attributes only count when every vertex carried them.
            if normals.len() == cloud.points.len() {
                cloud.normals = normals;
            }
            if colors.len() == cloud.points.len() {
                cloud.colors = colors;
            }
        }
        Ok(cloud)
    }
}

impl PointCloudWriter for PlyWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut ply = Ply::<DefaultElement>::new();
        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = cloud.len();
        for name in ["x", "y", "z"] {
            vertex_element.properties.add(PropertyDef::new(
                name.to_string(),
                PropertyType::Scalar(ScalarType::Double),
            ));
        }
        if cloud.has_normals() {
            for name in ["nx", "ny", "nz"] {
                vertex_element.properties.add(PropertyDef::new(
                    name.to_string(),
                    PropertyType::Scalar(ScalarType::Double),
                ));
            }
        }
        if cloud.has_colors() {
            for name in ["red", "green", "blue"] {
                vertex_element.properties.add(PropertyDef::new(
                    name.to_string(),
                    PropertyType::Scalar(ScalarType::UChar),
                ));
            }
        }
        ply.header.elements.add(vertex_element);

        let mut vertices = Vec::with_capacity(cloud.len());
        for (i, point) in cloud.points.iter().enumerate() {
            let mut vertex = DefaultElement::new();
            vertex.insert("x".to_string(), Property::Double(point.x));
            vertex.insert("y".to_string(), Property::Double(point.y));
            vertex.insert("z".to_string(), Property::Double(point.z));
            if cloud.has_normals() {
                let normal = cloud.normals[i];
                vertex.insert("nx".to_string(), Property::Double(normal.x));
                vertex.insert("ny".to_string(), Property::Double(normal.y));
                vertex.insert("nz".to_string(), Property::Double(normal.z));
            }
            if cloud.has_colors() {
                let color = cloud.colors[i];
                vertex.insert("red".to_string(), Property::UChar(color_byte(color.x)));
                vertex.insert("green".to_string(), Property::UChar(color_byte(color.y)));
                vertex.insert("blue".to_string(), Property::UChar(color_byte(color.z)));
            }
            vertices.push(vertex);
        }
        ply.payload.insert("vertex".to_string(), vertices);

        Writer::new().write_ply(&mut writer, &mut ply)?;
        Ok(())
    }
}

impl MeshReader for PlyReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(&mut reader)?;

        let mut mesh = TriangleMesh::new();
        if let Some(vertices) = ply.payload.get("vertex") {
            let mut normals = Vec::new();
            for vertex in vertices {
                let x = property_value(vertex, "x")?;
                let y = property_value(vertex, "y")?;
                let z = property_value(vertex, "z")?;
                mesh.vertices.push(Point3d::new(x, y, z));
                if let Some(normal) = optional_vector(vertex, "nx", "ny", "nz") {
                    normals.push(normal);
                }
            }
            if normals.len() == mesh.vertices.len() {
                mesh.vertex_normals = normals;
            }
        }
        if let Some(faces) = ply.payload.get("face") {
            for face in faces {
                let indices = face_indices(face)?;
                if indices.len() >= 3 {
                    mesh.triangles.push([indices[0], indices[1], indices[2]]);
                }
            }
        }
        Ok(mesh)
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut ply = Ply::<DefaultElement>::new();
        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = mesh.vertex_count();
        for name in ["x", "y", "z"] {
            vertex_element.properties.add(PropertyDef::new(
                name.to_string(),
                PropertyType::Scalar(ScalarType::Double),
            ));
        }
        if mesh.has_vertex_normals() {
            for name in ["nx", "ny", "nz"] {
                vertex_element.properties.add(PropertyDef::new(
                    name.to_string(),
                    PropertyType::Scalar(ScalarType::Double),
                ));
            }
        }
        ply.header.elements.add(vertex_element);

        let mut face_element = ElementDef::new("face".to_string());
        face_element.count = mesh.triangle_count();
        face_element.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        ply.header.elements.add(face_element);

        let mut vertices = Vec::with_capacity(mesh.vertex_count());
        for (i, vertex) in mesh.vertices.iter().enumerate() {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(vertex.x));
            element.insert("y".to_string(), Property::Double(vertex.y));
            element.insert("z".to_string(), Property::Double(vertex.z));
            if mesh.has_vertex_normals() {
                let normal = mesh.vertex_normals[i];
                element.insert("nx".to_string(), Property::Double(normal.x));
                element.insert("ny".to_string(), Property::Double(normal.y));
                element.insert("nz".to_string(), Property::Double(normal.z));
            }
            vertices.push(element);
        }
        ply.payload.insert("vertex".to_string(), vertices);

        let mut faces = Vec::with_capacity(mesh.triangle_count());
        for triangle in &mesh.triangles {
            let mut element = DefaultElement::new();
            element.insert(
                "vertex_indices".to_string(),
                Property::ListInt(triangle.iter().map(|&v| v as i32).collect()),
            );
            faces.push(element);
        }
        ply.payload.insert("face".to_string(), faces);

        Writer::new().write_ply(&mut writer, &mut ply)?;
        Ok(())
    }
}

/// Probe a PLY header for the geometry it contains.
pub(crate) fn probe_file_geometry(path: &Path) -> Result<FileGeometry> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let parser = Parser::<DefaultElement>::new();
    let header = parser.read_header(&mut reader)?;
    match header.elements.get("face") {
        Some(face) if face.count > 0 => Ok(FileGeometry::TriangleMesh),
        _ => Ok(FileGeometry::PointCloud),
    }
}

/// Extract a required numeric property from a PLY element.
fn property_value(element: &DefaultElement, name: &str) -> Result<f64> {
    match element.get(name) {
        Some(Property::Float(value)) => Ok(*value as f64),
        Some(Property::Double(value)) => Ok(*value),
        Some(Property::Int(value)) => Ok(*value as f64),
        Some(Property::UInt(value)) => Ok(*value as f64),
        Some(Property::UChar(value)) => Ok(*value as f64),
        _ => Err(Error::InvalidData(format!(
            "property '{}' not found or invalid type",
            name
        ))),
    }
}

fn optional_vector(element: &DefaultElement, x: &str, y: &str, z: &str) -> Option<Vector3d> {
    match (
        property_value(element, x),
        property_value(element, y),
        property_value(element, z),
    ) {
        (Ok(x), Ok(y), Ok(z)) => Some(Vector3d::new(x, y, z)),
        _ => None,
    }
}

fn color_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Extract face indices from a PLY face element.
fn face_indices(element: &DefaultElement) -> Result<Vec<usize>> {
    match element
        .get("vertex_indices")
        .or_else(|| element.get("vertex_index"))
    {
        Some(Property::ListInt(indices)) => {
            Ok(indices.iter().map(|&index| index as usize).collect())
        }
        Some(Property::ListUInt(indices)) => {
            Ok(indices.iter().map(|&index| index as usize).collect())
        }
        _ => Err(Error::InvalidData("face indices not found".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cumulus_core::Vector3d;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_point_cloud_roundtrip() {
        let path = temp_path("cumulus_ply_cloud_roundtrip.ply");
        let mut cloud = PointCloud::from_points(vec![
            Point3d::new(0.0, 0.5, 1.0),
            Point3d::new(-1.25, 2.0, 3.5),
        ]);
        cloud.normals = vec![Vector3d::z(), Vector3d::x()];

        PlyWriter::write_point_cloud(&cloud, &path).unwrap();
        let loaded = PlyReader::read_point_cloud(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(loaded.has_normals());
        for (a, b) in cloud.points.iter().zip(&loaded.points) {
            assert_relative_eq!(*a, *b);
        }
        for (a, b) in cloud.normals.iter().zip(&loaded.normals) {
            assert_relative_eq!(*a, *b);
        }
    }

    #[test]
    fn test_point_cloud_color_roundtrip() {
        let path = temp_path("cumulus_ply_color_roundtrip.ply");
        let mut cloud = PointCloud::from_points(vec![Point3d::origin()]);
        cloud.colors = vec![Vector3d::new(1.0, 0.0, 0.0)];

        PlyWriter::write_point_cloud(&cloud, &path).unwrap();
        let loaded = PlyReader::read_point_cloud(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(loaded.has_colors());
        assert_relative_eq!(loaded.colors[0], Vector3d::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_mesh_roundtrip() {
        let path = temp_path("cumulus_ply_mesh_roundtrip.ply");
        let mesh = TriangleMesh::from_vertices_and_triangles(
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );

        PlyWriter::write_mesh(&mesh, &path).unwrap();
        let probed = probe_file_geometry(&path).unwrap();
        let loaded = PlyReader::read_mesh(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(probed, FileGeometry::TriangleMesh);
        assert_eq!(loaded.vertex_count(), 3);
        assert_eq!(loaded.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_vertex_only_ply_probes_as_point_cloud() {
        let path = temp_path("cumulus_ply_probe_cloud.ply");
        let cloud = PointCloud::from_points(vec![Point3d::origin()]);
        PlyWriter::write_point_cloud(&cloud, &path).unwrap();
        let probed = probe_file_geometry(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(probed, FileGeometry::PointCloud);
    }
}

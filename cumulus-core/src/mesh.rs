//! Triangle mesh data structures and functionality

use crate::point::{default_normal, Point3d, Vector3d};
use crate::traits::{Bounds3D, GeometryKind, Transformable3D};
use crate::transform;
use log::warn;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

/// A triangle mesh: vertices with optional normals and colors, and triangles
/// referencing the vertices by index.
///
/// `vertex_normals`, `vertex_colors` and `triangle_normals` are parallel
/// arrays; an attribute counts as present only when its length matches its
/// owning array exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex coordinates
    pub vertices: Vec<Point3d>,
    /// Vertex normals, parallel to `vertices`
    pub vertex_normals: Vec<Vector3d>,
    /// RGB vertex colors in [0, 1], parallel to `vertices`
    pub vertex_colors: Vec<Vector3d>,
    /// Triangles as vertex index triples
    pub triangles: Vec<[usize; 3]>,
    /// Triangle normals, parallel to `triangles`
    pub triangle_normals: Vec<Vector3d>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and triangles
    pub fn from_vertices_and_triangles(
        vertices: Vec<Point3d>,
        triangles: Vec<[usize; 3]>,
    ) -> Self {
        Self {
            vertices,
            triangles,
            ..Self::default()
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the mesh has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns `true` if the mesh contains vertices
    pub fn has_vertices(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// Returns `true` if the mesh contains triangles
    pub fn has_triangles(&self) -> bool {
        !self.vertices.is_empty() && !self.triangles.is_empty()
    }

    /// Returns `true` if every vertex has a normal
    pub fn has_vertex_normals(&self) -> bool {
        self.has_vertices() && self.vertex_normals.len() == self.vertices.len()
    }

    /// Returns `true` if every vertex has a color
    pub fn has_vertex_colors(&self) -> bool {
        self.has_vertices() && self.vertex_colors.len() == self.vertices.len()
    }

    /// Returns `true` if every triangle has a normal
    pub fn has_triangle_normals(&self) -> bool {
        self.has_triangles() && self.triangle_normals.len() == self.triangles.len()
    }

    /// The geometry variant tag
    pub fn kind(&self) -> GeometryKind {
        GeometryKind::TriangleMesh
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.vertex_normals.clear();
        self.vertex_colors.clear();
        self.triangles.clear();
        self.triangle_normals.clear();
    }

    /// Normalize vertex and triangle normals to unit length; degenerate
    /// normals are replaced by the default normal (0, 0, 1).
    pub fn normalize_normals(&mut self) -> &mut Self {
        for normal in self
            .vertex_normals
            .iter_mut()
            .chain(self.triangle_normals.iter_mut())
        {
            if normal.try_normalize_mut(0.0).is_none() || normal.x.is_nan() {
                *normal = default_normal();
            }
        }
        self
    }

    /// Compute per-triangle normals from the cross product of triangle
    /// edges. Triangles with out-of-range indices get a zero normal and a
    /// warning.
    pub fn compute_triangle_normals(&mut self, normalized: bool) -> &mut Self {
        if !self.has_triangles() {
            warn!("compute_triangle_normals: mesh has no vertices or triangles");
            return self;
        }
        self.triangle_normals.clear();
        self.triangle_normals.reserve(self.triangles.len());
        for (i, triangle) in self.triangles.iter().enumerate() {
            if triangle.iter().any(|&v| v >= self.vertices.len()) {
                warn!("compute_triangle_normals: triangle {} has invalid vertex indices", i);
                self.triangle_normals.push(Vector3d::zeros());
                continue;
            }
            let v0 = self.vertices[triangle[0]];
            let v1 = self.vertices[triangle[1]];
            let v2 = self.vertices[triangle[2]];
            self.triangle_normals.push((v1 - v0).cross(&(v2 - v0)));
        }
        if normalized {
            self.normalize_normals();
        }
        self
    }

    /// Compute per-vertex normals by accumulating the normals of adjacent
    /// triangles.
    pub fn compute_vertex_normals(&mut self, normalized: bool) -> &mut Self {
        if !self.has_triangles() {
            warn!("compute_vertex_normals: mesh has no vertices or triangles");
            return self;
        }
        if !self.has_triangle_normals() {
            self.compute_triangle_normals(false);
        }
        self.vertex_normals.clear();
        self.vertex_normals
            .resize(self.vertices.len(), Vector3d::zeros());
        for (triangle, normal) in self.triangles.iter().zip(&self.triangle_normals) {
            for &vertex in triangle {
                if vertex < self.vertices.len() {
                    self.vertex_normals[vertex] += normal;
                }
            }
        }
        if normalized {
            self.normalize_normals();
        }
        self
    }
}

impl Bounds3D for TriangleMesh {
    fn min_bound(&self) -> Point3d {
        self.vertices
            .iter()
            .fold(None, |acc: Option<Point3d>, p| match acc {
                None => Some(*p),
                Some(m) => Some(Point3d::new(m.x.min(p.x), m.y.min(p.y), m.z.min(p.z))),
            })
            .unwrap_or_else(Point3d::origin)
    }

    fn max_bound(&self) -> Point3d {
        self.vertices
            .iter()
            .fold(None, |acc: Option<Point3d>, p| match acc {
                None => Some(*p),
                Some(m) => Some(Point3d::new(m.x.max(p.x), m.y.max(p.y), m.z.max(p.z))),
            })
            .unwrap_or_else(Point3d::origin)
    }

    fn center(&self) -> Point3d {
        transform::center_of(&self.vertices)
    }
}

impl Transformable3D for TriangleMesh {
    fn transform(&mut self, transformation: &Matrix4<f64>) {
        let has_vertex_normals = self.has_vertex_normals();
        let has_triangle_normals = self.has_triangle_normals();
        transform::transform_points(transformation, &mut self.vertices);
        if has_vertex_normals {
            transform::transform_normals(transformation, &mut self.vertex_normals);
        }
        if has_triangle_normals {
            transform::transform_normals(transformation, &mut self.triangle_normals);
        }
    }

    fn translate(&mut self, translation: &Vector3d, relative: bool) {
        transform::translate_points(translation, &mut self.vertices, relative);
    }

    fn scale(&mut self, scale: f64, center: &Point3d) {
        transform::scale_points(scale, &mut self.vertices, center);
    }

    fn rotate(&mut self, rotation: &Matrix3<f64>, center: &Point3d) {
        let has_vertex_normals = self.has_vertex_normals();
        let has_triangle_normals = self.has_triangle_normals();
        transform::rotate_points(rotation, &mut self.vertices, center);
        if has_vertex_normals {
            transform::rotate_normals(rotation, &mut self.vertex_normals);
        }
        if has_triangle_normals {
            transform::rotate_normals(rotation, &mut self.triangle_normals);
        }
    }
}

//! Transformation helpers shared by the geometry containers

use crate::point::{Point3d, Vector3d};
use log::warn;
use nalgebra::{Matrix3, Matrix4, Vector4};

/// Apply a homogeneous transformation to every point in place.
///
/// Points whose transformed homogeneous coordinate has a near-zero `w`
/// component become NaN.
pub fn transform_points(transformation: &Matrix4<f64>, points: &mut [Point3d]) {
    for point in points.iter_mut() {
        let h = transformation * Vector4::new(point.x, point.y, point.z, 1.0);
        if h.w.abs() > 1e-9 {
            *point = Point3d::new(h.x / h.w, h.y / h.w, h.z / h.w);
        } else {
            warn!("transform_points: transformation produced a near-zero w component");
            *point = Point3d::new(f64::NAN, f64::NAN, f64::NAN);
        }
    }
}

/// Transform normals by the inverse transpose of the linear part of the
/// transformation, renormalizing afterwards.
///
/// A singular linear part falls back to the identity; normals that cannot be
/// renormalized are zeroed.
pub fn transform_normals(transformation: &Matrix4<f64>, normals: &mut [Vector3d]) {
    let linear: Matrix3<f64> = transformation.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_matrix = match linear.try_inverse() {
        Some(inverse) => inverse.transpose(),
        None => {
            warn!("transform_normals: transformation is not invertible, using identity");
            Matrix3::identity()
        }
    };
    for normal in normals.iter_mut() {
        *normal = normal_matrix * *normal;
        if normal.try_normalize_mut(0.0).is_none() {
            normal.fill(0.0);
        }
    }
}

/// Translate every point, either by `translation` (relative) or so the
/// centroid lands on `translation` (absolute).
pub fn translate_points(translation: &Vector3d, points: &mut [Point3d], relative: bool) {
    let offset = if relative {
        *translation
    } else if points.is_empty() {
        Vector3d::zeros()
    } else {
        translation - center_of(points).coords
    };
    for point in points.iter_mut() {
        *point += offset;
    }
}

/// Scale every point about `center`.
pub fn scale_points(scale: f64, points: &mut [Point3d], center: &Point3d) {
    for point in points.iter_mut() {
        *point = center + scale * (*point - center);
    }
}

/// Rotate every point about `center`.
pub fn rotate_points(rotation: &Matrix3<f64>, points: &mut [Point3d], center: &Point3d) {
    for point in points.iter_mut() {
        *point = center + rotation * (*point - center);
    }
}

/// Rotate normals directly; assumes `rotation` is a pure rotation so no
/// renormalization is required.
pub fn rotate_normals(rotation: &Matrix3<f64>, normals: &mut [Vector3d]) {
    for normal in normals.iter_mut() {
        *normal = rotation * *normal;
    }
}

/// Centroid of a set of points; the origin for an empty set.
pub fn center_of(points: &[Point3d]) -> Point3d {
    if points.is_empty() {
        return Point3d::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3d::zeros(), |acc, p| acc + p.coords);
    Point3d::from(sum / points.len() as f64)
}

//! Axis-aligned bounding box

use crate::point::{Point3d, Vector3d};
use crate::traits::{Bounds3D, GeometryKind};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounding box aligned with the coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedBoundingBox {
    /// Minimum corner
    pub min_bound: Point3d,
    /// Maximum corner
    pub max_bound: Point3d,
    /// Display color in [0, 1]
    pub color: Vector3d,
}

impl AxisAlignedBoundingBox {
    /// Create a bounding box from its corners.
    ///
    /// Inverted bounds are corrected component-wise with a warning.
    pub fn new(min_bound: Point3d, max_bound: Point3d) -> Self {
        let (min_bound, max_bound) = if max_bound.x < min_bound.x
            || max_bound.y < min_bound.y
            || max_bound.z < min_bound.z
        {
            warn!(
                "AxisAlignedBoundingBox: max bound {:?} is smaller than min bound {:?} in one or more axes, correcting",
                max_bound, min_bound
            );
            (
                Point3d::new(
                    min_bound.x.min(max_bound.x),
                    min_bound.y.min(max_bound.y),
                    min_bound.z.min(max_bound.z),
                ),
                Point3d::new(
                    min_bound.x.max(max_bound.x),
                    min_bound.y.max(max_bound.y),
                    min_bound.z.max(max_bound.z),
                ),
            )
        } else {
            (min_bound, max_bound)
        };
        Self {
            min_bound,
            max_bound,
            color: Vector3d::new(1.0, 1.0, 1.0),
        }
    }

    /// The bounding box enclosing `points`; a zero box for an empty set.
    pub fn from_points(points: &[Point3d]) -> Self {
        if points.is_empty() {
            warn!("AxisAlignedBoundingBox::from_points: input is empty");
            return Self::new(Point3d::origin(), Point3d::origin());
        }
        let mut min_bound = points[0];
        let mut max_bound = points[0];
        for p in &points[1..] {
            min_bound = Point3d::new(
                min_bound.x.min(p.x),
                min_bound.y.min(p.y),
                min_bound.z.min(p.z),
            );
            max_bound = Point3d::new(
                max_bound.x.max(p.x),
                max_bound.y.max(p.y),
                max_bound.z.max(p.z),
            );
        }
        Self::new(min_bound, max_bound)
    }

    /// A box is empty when its volume is non-positive or its bounds invalid.
    pub fn is_empty(&self) -> bool {
        self.volume() <= 1e-12
            || self.max_bound.x < self.min_bound.x
            || self.max_bound.y < self.min_bound.y
            || self.max_bound.z < self.min_bound.z
    }

    /// The geometry variant tag
    pub fn kind(&self) -> GeometryKind {
        GeometryKind::AxisAlignedBoundingBox
    }

    /// Edge lengths of the box
    pub fn extent(&self) -> Vector3d {
        self.max_bound - self.min_bound
    }

    /// Half the edge lengths
    pub fn half_extent(&self) -> Vector3d {
        self.extent() * 0.5
    }

    /// The largest edge length
    pub fn max_extent(&self) -> f64 {
        self.extent().max()
    }

    /// Volume of the box; zero for invalid bounds.
    pub fn volume(&self) -> f64 {
        let extent = self.extent();
        if extent.x < 0.0 || extent.y < 0.0 || extent.z < 0.0 {
            return 0.0;
        }
        extent.x * extent.y * extent.z
    }

    /// The eight corner points of the box.
    pub fn box_points(&self) -> Vec<Point3d> {
        let extent = self.extent();
        if extent.min() < 0.0 {
            return vec![self.min_bound; 8];
        }
        vec![
            self.min_bound,
            self.min_bound + Vector3d::new(extent.x, 0.0, 0.0),
            self.min_bound + Vector3d::new(0.0, extent.y, 0.0),
            self.min_bound + Vector3d::new(0.0, 0.0, extent.z),
            self.min_bound + Vector3d::new(extent.x, extent.y, 0.0),
            self.min_bound + Vector3d::new(0.0, extent.y, extent.z),
            self.min_bound + Vector3d::new(extent.x, 0.0, extent.z),
            self.max_bound,
        ]
    }

    /// Indices of the points inside or on the boundary of the box.
    pub fn point_indices_within(&self, points: &[Point3d]) -> Vec<usize> {
        const EPSILON: f64 = 1e-9;
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.x >= self.min_bound.x - EPSILON
                    && p.y >= self.min_bound.y - EPSILON
                    && p.z >= self.min_bound.z - EPSILON
                    && p.x <= self.max_bound.x + EPSILON
                    && p.y <= self.max_bound.y + EPSILON
                    && p.z <= self.max_bound.z + EPSILON
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Expand this box to also enclose `other`; empty operands are ignored.
    pub fn merge(&mut self, other: &AxisAlignedBoundingBox) -> &mut Self {
        if self.is_empty() {
            *self = *other;
        } else if !other.is_empty() {
            self.min_bound = Point3d::new(
                self.min_bound.x.min(other.min_bound.x),
                self.min_bound.y.min(other.min_bound.y),
                self.min_bound.z.min(other.min_bound.z),
            );
            self.max_bound = Point3d::new(
                self.max_bound.x.max(other.max_bound.x),
                self.max_bound.y.max(other.max_bound.y),
                self.max_bound.z.max(other.max_bound.z),
            );
        }
        self
    }

    /// Translate the box, either by `translation` (relative) or so its
    /// center lands on `translation` (absolute).
    pub fn translate(&mut self, translation: &Vector3d, relative: bool) -> &mut Self {
        let shift = if relative {
            *translation
        } else {
            translation - self.center().coords
        };
        self.min_bound += shift;
        self.max_bound += shift;
        self
    }

    /// Scale the box about `center`; bounds are re-ordered under a negative
    /// scale factor.
    pub fn scale(&mut self, scale: f64, center: &Point3d) -> &mut Self {
        self.min_bound = center + scale * (self.min_bound - center);
        self.max_bound = center + scale * (self.max_bound - center);
        if scale < 0.0 {
            std::mem::swap(&mut self.min_bound, &mut self.max_bound);
        }
        self
    }
}

impl Default for AxisAlignedBoundingBox {
    fn default() -> Self {
        Self {
            min_bound: Point3d::origin(),
            max_bound: Point3d::origin(),
            color: Vector3d::new(1.0, 1.0, 1.0),
        }
    }
}

impl Bounds3D for AxisAlignedBoundingBox {
    fn min_bound(&self) -> Point3d {
        self.min_bound
    }

    fn max_bound(&self) -> Point3d {
        self.max_bound
    }

    fn center(&self) -> Point3d {
        if self.is_empty() {
            return Point3d::origin();
        }
        Point3d::from((self.min_bound.coords + self.max_bound.coords) * 0.5)
    }

    fn axis_aligned_bounding_box(&self) -> AxisAlignedBoundingBox {
        *self
    }
}

impl fmt::Display for AxisAlignedBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AxisAlignedBoundingBox: min: ({:.4}, {:.4}, {:.4}), max: ({:.4}, {:.4}, {:.4})",
            self.min_bound.x,
            self.min_bound.y,
            self.min_bound.z,
            self.max_bound.x,
            self.max_bound.y,
            self.max_bound.z
        )
    }
}

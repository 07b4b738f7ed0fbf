//! Nearest neighbor search implementations

use crate::features::Feature;
use cumulus_core::{Error, NearestNeighborSearch, PointCloud, Result, SearchParam};
use kiddo::{KdTree, SquaredEuclidean};

/// K-d tree index over fixed-dimension vectors.
///
/// Queries return `(index, squared_distance)` pairs sorted ascending by
/// distance, where indices refer to the insertion order of the input rows.
pub struct KdTreeIndex<const D: usize> {
    tree: KdTree<f64, D>,
    len: usize,
}

impl<const D: usize> KdTreeIndex<D> {
    /// Build an index over a slice of fixed-dimension rows.
    pub fn new(rows: &[[f64; D]]) -> Self {
        let mut tree = KdTree::new();
        for (i, row) in rows.iter().enumerate() {
            tree.add(row, i as u64);
        }
        Self {
            tree,
            len: rows.len(),
        }
    }

    /// Number of indexed rows
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl KdTreeIndex<3> {
    /// Build an index over the positions of a point cloud.
    pub fn from_point_cloud(cloud: &PointCloud) -> Self {
        let mut tree = KdTree::new();
        for (i, point) in cloud.points.iter().enumerate() {
            tree.add(&[point.x, point.y, point.z], i as u64);
        }
        Self {
            tree,
            len: cloud.len(),
        }
    }
}

impl<const D: usize> NearestNeighborSearch<[f64; D]> for KdTreeIndex<D> {
    fn search(&self, query: &[f64; D], param: &SearchParam) -> Vec<(usize, f64)> {
        match *param {
            SearchParam::Knn { k } => self
                .tree
                .nearest_n::<SquaredEuclidean>(query, k)
                .into_iter()
                .map(|n| (n.item as usize, n.distance))
                .collect(),
            SearchParam::Radius { radius } => self
                .tree
                .within::<SquaredEuclidean>(query, radius * radius)
                .into_iter()
                .map(|n| (n.item as usize, n.distance))
                .collect(),
        }
    }
}

/// Nearest-feature index over the columns of a [`Feature`] matrix.
///
/// The feature dimension is a runtime value, so this uses a
/// dynamic-dimension k-d tree rather than the const-generic one.
pub struct FeatureIndex {
    tree: kdtree::KdTree<f64, usize, Vec<f64>>,
    dimension: usize,
}

impl FeatureIndex {
    /// Build an index over the columns of `feature`.
    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let dimension = feature.dimension();
        let mut tree = kdtree::KdTree::new(dimension);
        for i in 0..feature.num() {
            let column: Vec<f64> = feature.data.column(i).iter().copied().collect();
            tree.add(column, i)
                .map_err(|e| Error::InvalidData(format!("invalid feature column {}: {:?}", i, e)))?;
        }
        Ok(Self { tree, dimension })
    }

    /// Dimension of the indexed feature vectors
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The indexed column nearest to `query`, with its squared distance.
    pub fn nearest(&self, query: &[f64]) -> Result<Option<(usize, f64)>> {
        let found = self
            .tree
            .nearest(query, 1, &kdtree::distance::squared_euclidean)
            .map_err(|e| Error::Algorithm(format!("feature search failed: {:?}", e)))?;
        Ok(found.first().map(|&(dist, &index)| (index, dist)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_core::Point3d;

    fn sample_cloud() -> PointCloud {
        PointCloud::from_points(vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
            Point3d::new(1.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn test_knn_sorted_ascending_by_squared_distance() {
        let index = KdTreeIndex::from_point_cloud(&sample_cloud());
        let neighbors = index.knn(&[0.1, 0.0, 0.0], 3);
        assert_eq!(neighbors.len(), 3);
        assert_eq!(neighbors[0].0, 0);
        for pair in neighbors.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
        // Squared distance to the nearest point (0, 0, 0).
        assert!((neighbors[0].1 - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_radius_search_is_bounded() {
        let index = KdTreeIndex::from_point_cloud(&sample_cloud());
        let neighbors = index.radius(&[0.0, 0.0, 0.0], 1.1);
        assert_eq!(neighbors.len(), 3);
        for &(_, dist2) in &neighbors {
            assert!(dist2 <= 1.1 * 1.1);
        }
    }

    #[test]
    fn test_query_point_is_its_own_nearest_neighbor() {
        let index = KdTreeIndex::from_point_cloud(&sample_cloud());
        let neighbors = index.knn(&[1.0, 1.0, 0.0], 1);
        assert_eq!(neighbors[0], (3, 0.0));
    }

    #[test]
    fn test_feature_index_nearest() {
        let mut feature = Feature::new(2, 3);
        for (i, value) in [0.0, 1.0, 5.0].iter().enumerate() {
            feature.data[(0, i)] = *value;
            feature.data[(1, i)] = -*value;
        }
        let index = FeatureIndex::from_feature(&feature).unwrap();
        let nearest = index.nearest(&[4.0, -4.0]).unwrap();
        assert_eq!(nearest.map(|(i, _)| i), Some(2));
    }
}

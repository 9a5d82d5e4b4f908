use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use tabletop_core::PointCloud;

/// A KdTree for radius queries over a 3D point cloud.
///
/// Built on kiddo's `ImmutableKdTree`, which is constructed once in a
/// balanced, cache-friendly layout and cannot be modified afterwards.
/// Items are `u32` indices back into the source cloud.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f32, u32, 3, 32>,
    num_points: usize,
}

impl KdTree {
    pub fn build(cloud: &PointCloud) -> Self {
        let n = cloud.len();
        if n == 0 {
            return Self {
                tree: ImmutableKdTree::new_from_slice(&[]),
                num_points: 0,
            };
        }

        let points: Vec<[f32; 3]> = cloud.iter_points().collect();
        let tree = ImmutableKdTree::new_from_slice(&points);

        Self {
            tree,
            num_points: n,
        }
    }

    pub fn len(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Find all points within `radius` (Euclidean distance) of `query`.
    ///
    /// Returns indices of points where `euclidean_dist <= radius`, sorted
    /// ascending.
    ///
    /// Returns empty if radius <= 0, the tree is empty, radius is
    /// non-finite, or the query contains NaN/inf.
    pub fn radius_search(&self, query: &[f32; 3], radius: f32) -> Vec<usize> {
        if self.is_empty()
            || radius <= 0.0
            || !radius.is_finite()
            || !query.iter().all(|v| v.is_finite())
        {
            return Vec::new();
        }

        let radius_sq = radius * radius;

        // kiddo's `within_unsorted` uses strict `<`. To include points
        // exactly on the boundary (dist == radius), we query with a tiny
        // epsilon added, then post-filter with `<=`.
        let query_radius_sq = radius_sq + f32::EPSILON * radius_sq.max(1.0);

        let mut indices: Vec<usize> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(query, query_radius_sq)
            .into_iter()
            .filter(|nn| nn.distance <= radius_sq)
            .map(|nn| nn.item as usize)
            .collect();

        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::KdTree;
    use proptest::prelude::*;
    use tabletop_core::PointCloud;

    #[test]
    fn radius_search_finds_points() {
        let cloud = PointCloud::from_xyz(vec![0.0, 0.5, 2.0], vec![0.0; 3], vec![0.0; 3]);
        let tree = KdTree::build(&cloud);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.radius_search(&[0.0, 0.0, 0.0], 0.75), vec![0, 1]);
    }

    #[test]
    fn radius_search_empty_cloud() {
        let tree = KdTree::build(&PointCloud::new());
        assert!(tree.is_empty());
        assert!(tree.radius_search(&[0.0, 0.0, 0.0], 10.0).is_empty());
    }

    #[test]
    fn radius_search_negative_radius() {
        let cloud = PointCloud::from_xyz(vec![0.0], vec![0.0], vec![0.0]);
        let tree = KdTree::build(&cloud);
        assert!(tree.radius_search(&[0.0, 0.0, 0.0], -1.0).is_empty());
    }

    #[test]
    fn radius_search_nan_query() {
        let cloud = PointCloud::from_xyz(vec![1.0], vec![2.0], vec![3.0]);
        let tree = KdTree::build(&cloud);
        assert!(tree.radius_search(&[f32::NAN, 0.0, 0.0], 5.0).is_empty());
    }

    #[test]
    fn radius_search_exact_boundary() {
        let cloud = PointCloud::from_xyz(vec![1.0, 5.0], vec![0.0; 2], vec![0.0; 2]);
        let tree = KdTree::build(&cloud);
        let idx = tree.radius_search(&[0.0, 0.0, 0.0], 1.0);
        assert!(
            idx.contains(&0),
            "point at exact boundary should be included, got {:?}",
            idx
        );
        assert!(!idx.contains(&1));
    }

    proptest! {
        #[test]
        fn radius_search_matches_brute_force(
            pts in prop::collection::vec(
                (-1.0f32..1.0f32, -1.0f32..1.0f32, -1.0f32..1.0f32),
                1..300
            ),
            radius in 0.05f32..1.0f32,
        ) {
            let cloud = PointCloud::from_xyz(
                pts.iter().map(|p| p.0).collect(),
                pts.iter().map(|p| p.1).collect(),
                pts.iter().map(|p| p.2).collect(),
            );
            let tree = KdTree::build(&cloud);
            let found = tree.radius_search(&[0.0, 0.0, 0.0], radius);
            let r2 = radius * radius;
            for (i, p) in pts.iter().enumerate() {
                let d2 = p.0 * p.0 + p.1 * p.1 + p.2 * p.2;
                // Skip points within float noise of the boundary.
                if (d2 - r2).abs() < 1e-5 {
                    continue;
                }
                prop_assert_eq!(found.binary_search(&i).is_ok(), d2 < r2, "point {} d2={} r2={}", i, d2, r2);
            }
        }
    }
}

use tabletop_core::PointCloud;

use crate::euclidean_cluster::euclidean_cluster;
use crate::plane::PlaneModel;
use crate::ransac_plane::{fit_plane, RansacParams};

/// A fitted plane and the indices of the points supporting it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    pub model: PlaneModel,
    pub inliers: Vec<usize>,
}

/// Robust plane estimation over a cloud.
///
/// Returns `None` when no plane with at least one inlier exists.
pub trait PlaneEstimator: Send + Sync {
    fn estimate(&self, cloud: &PointCloud) -> Option<PlaneFit>;
}

/// Partitioning of a cloud into spatially contiguous index sets.
///
/// Returned clusters must be pairwise disjoint and in a deterministic order.
pub trait SpatialClusterer: Send + Sync {
    fn extract(&self, cloud: &PointCloud) -> Vec<Vec<usize>>;
}

/// [`PlaneEstimator`] backed by [`fit_plane`].
#[derive(Debug, Clone, Default)]
pub struct RansacPlaneEstimator {
    pub params: RansacParams,
}

impl RansacPlaneEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }
}

impl PlaneEstimator for RansacPlaneEstimator {
    fn estimate(&self, cloud: &PointCloud) -> Option<PlaneFit> {
        let (model, inliers) = fit_plane(cloud, &self.params);
        if inliers.is_empty() {
            return None;
        }
        Some(PlaneFit { model, inliers })
    }
}

/// [`SpatialClusterer`] backed by [`euclidean_cluster`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanClusterer {
    pub tolerance: f32,
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for EuclideanClusterer {
    fn default() -> Self {
        Self {
            tolerance: 0.04,
            min_size: 50,
            max_size: 25_000,
        }
    }
}

impl SpatialClusterer for EuclideanClusterer {
    fn extract(&self, cloud: &PointCloud) -> Vec<Vec<usize>> {
        euclidean_cluster(cloud, self.tolerance, self.min_size, self.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ransac_estimator_reports_missing_plane() {
        let estimator = RansacPlaneEstimator::default();
        assert!(estimator.estimate(&PointCloud::new()).is_none());
    }

    #[test]
    fn ransac_estimator_finds_plane() {
        let cloud = PointCloud::from_xyz(
            vec![0.0, 1.0, 0.0, 1.0, 0.5],
            vec![0.0, 0.0, 1.0, 1.0, 0.5],
            vec![0.2; 5],
        );
        let estimator = RansacPlaneEstimator::new(RansacParams {
            seed: Some(1),
            ..RansacParams::default()
        });
        let fit = estimator.estimate(&cloud).unwrap();
        assert_eq!(fit.inliers, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clusterer_defaults() {
        let c = EuclideanClusterer::default();
        assert_eq!((c.tolerance, c.min_size, c.max_size), (0.04, 50, 25_000));
        let cloud = PointCloud::from_xyz(vec![0.0; 3], vec![0.0; 3], vec![0.0; 3]);
        assert!(c.extract(&cloud).is_empty());
    }
}

use log::debug;
use tabletop_core::PointCloud;

use crate::plane::PlaneModel;
use crate::traits::PlaneEstimator;

/// Result of splitting a cloud into plane inliers and everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSegmentation {
    pub found: bool,
    pub model: PlaneModel,
    pub plane: PointCloud,
    pub foreground: PointCloud,
}

impl PlaneSegmentation {
    fn not_found(frame_id: &str) -> Self {
        Self {
            found: false,
            model: PlaneModel::default(),
            plane: PointCloud::new().with_frame_id(frame_id),
            foreground: PointCloud::new().with_frame_id(frame_id),
        }
    }
}

/// Fits the dominant plane and partitions `cloud` around it.
///
/// `plane` holds the inliers, `foreground` the complement, both in input
/// order. When no plane is found both clouds are empty and `found` is false.
pub fn segment_plane(cloud: &PointCloud, estimator: &dyn PlaneEstimator) -> PlaneSegmentation {
    let Some(fit) = estimator.estimate(cloud) else {
        debug!("plane: none found in {} points", cloud.len());
        return PlaneSegmentation::not_found(&cloud.frame_id);
    };

    let plane = cloud.select(&fit.inliers);
    let foreground = cloud.select_inverse(&fit.inliers);
    debug!(
        "plane: {:?} with {} inliers, {} foreground points",
        fit.model.coefficients(),
        plane.len(),
        foreground.len()
    );

    PlaneSegmentation {
        found: true,
        model: fit.model,
        plane,
        foreground,
    }
}

#![forbid(unsafe_code)]

pub mod euclidean_cluster;
pub mod partition;
pub mod plane;
pub mod proximity;
pub mod ransac_plane;
pub mod traits;

pub use euclidean_cluster::euclidean_cluster;
pub use partition::{segment_plane, PlaneSegmentation};
pub use plane::{AdjustedPlane, PlaneModel, DEFAULT_PLANE_OFFSETS};
pub use proximity::{accept_cluster, evaluate_cluster, ProximityVerdict};
pub use ransac_plane::{fit_plane, ransac_plane_seeded, refine_plane, RansacParams};
pub use traits::{
    EuclideanClusterer, PlaneEstimator, PlaneFit, RansacPlaneEstimator, SpatialClusterer,
};

use tabletop_core::PointCloud;

use crate::plane::AdjustedPlane;

/// Distance statistics of one cluster against the adjusted plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityVerdict {
    pub min_distance: f32,
    pub max_distance: f32,
    pub accepted: bool,
}

/// Measures how close `cluster` comes to `plane`.
///
/// Returns `None` for an empty cluster: there is no minimum to compare, and
/// callers must treat that as a rejection. Otherwise the cluster is accepted
/// iff its closest point is within `tolerance`. Distances are unsigned
/// residuals, so points below the plane count by their magnitude and can
/// never pass the test with a negative value. Non-finite distances are
/// ignored; a cluster with no finite distance is rejected.
pub fn evaluate_cluster(
    cluster: &PointCloud,
    plane: &AdjustedPlane,
    tolerance: f32,
) -> Option<ProximityVerdict> {
    if cluster.is_empty() {
        return None;
    }

    let mut min_distance = f32::INFINITY;
    let mut max_distance = f32::NEG_INFINITY;
    for p in cluster.iter_points() {
        let dist = plane.distance_to_point(&p);
        if !dist.is_finite() {
            continue;
        }
        min_distance = min_distance.min(dist);
        max_distance = max_distance.max(dist);
    }

    Some(ProximityVerdict {
        min_distance,
        max_distance,
        accepted: min_distance.is_finite() && min_distance <= tolerance,
    })
}

/// `true` iff the cluster is non-empty and has a point within `tolerance`
/// of the adjusted plane.
pub fn accept_cluster(cluster: &PointCloud, plane: &AdjustedPlane, tolerance: f32) -> bool {
    evaluate_cluster(cluster, plane, tolerance).is_some_and(|v| v.accepted)
}

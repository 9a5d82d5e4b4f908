use std::collections::VecDeque;

use tabletop_core::PointCloud;
use tabletop_spatial::KdTree;

/// Extracts clusters from a point cloud using Euclidean distance-based
/// connected-component analysis.
///
/// Points whose pairwise distance is less than or equal to `distance_threshold`
/// are considered connected. Each connected component is grown completely
/// before its size is checked, and only components whose size falls within
/// `[min_size, max_size]` are returned. A rejected component is dropped as a
/// whole; none of its points seed or join another cluster.
///
/// Clusters are returned in discovery order (ascending index of the first
/// point of each component), and the indices within each cluster are sorted
/// in ascending order. No index appears in more than one cluster.
pub fn euclidean_cluster(
    cloud: &PointCloud,
    distance_threshold: f32,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    if cloud.is_empty() || distance_threshold <= 0.0 || min_size == 0 || min_size > max_size {
        return Vec::new();
    }

    let tree = KdTree::build(cloud);
    let n = cloud.len();
    let mut visited = vec![false; n];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..n {
        if visited[seed] {
            continue;
        }

        let mut component = Vec::new();
        queue.clear();
        queue.push_back(seed);
        visited[seed] = true;

        while let Some(current) = queue.pop_front() {
            component.push(current);

            for neighbor in tree.radius_search(&cloud.point(current), distance_threshold) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        if component.len() >= min_size && component.len() <= max_size {
            component.sort_unstable();
            clusters.push(component);
        }
    }

    clusters
}

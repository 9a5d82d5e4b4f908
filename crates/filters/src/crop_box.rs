use tabletop_core::{Aabb, PointCloud};

/// Keeps the points inside the inclusive axis-aligned box `[min, max]`.
///
/// No reordering of `min`/`max` is done; an axis with `min > max` rejects
/// every point.
pub fn crop_box(cloud: &PointCloud, min: [f32; 3], max: [f32; 3]) -> PointCloud {
    let bounds = Aabb::from_bounds(min, max);
    let keep: Vec<usize> = cloud
        .iter_points()
        .enumerate()
        .filter(|(_, p)| bounds.contains(p))
        .map(|(i, _)| i)
        .collect();

    cloud.select(&keep)
}

use hashbrown::HashMap;
use tabletop_core::{Colors, PointCloud};

#[derive(Default, Clone, Copy)]
struct VoxelAccum {
    sx: f64,
    sy: f64,
    sz: f64,
    sr: u32,
    sg: u32,
    sb: u32,
    n: u32,
}

/// Replaces all points sharing a cubic voxel of edge `voxel_size` by their
/// centroid.
///
/// Colors, when present, are the per-channel mean rounded to the nearest
/// integer. Output points are ordered by voxel index `(ix, iy, iz)`, so the
/// result is deterministic regardless of input order. Non-finite points are
/// skipped.
///
/// # Panics
///
/// Panics if `voxel_size` is not finite and positive.
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f32) -> PointCloud {
    assert!(
        voxel_size.is_finite() && voxel_size > 0.0,
        "voxel_size must be > 0 and finite"
    );

    let mut out = PointCloud::new().with_frame_id(cloud.frame_id.clone());
    if cloud.is_empty() {
        return out;
    }

    let mut bins: HashMap<(i32, i32, i32), VoxelAccum> = HashMap::new();

    for i in 0..cloud.len() {
        let [px, py, pz] = cloud.point(i);
        if !px.is_finite() || !py.is_finite() || !pz.is_finite() {
            continue;
        }

        let key = (
            (px / voxel_size).floor() as i32,
            (py / voxel_size).floor() as i32,
            (pz / voxel_size).floor() as i32,
        );

        let [r, g, b] = cloud.color(i);
        let entry = bins.entry(key).or_default();
        entry.sx += px as f64;
        entry.sy += py as f64;
        entry.sz += pz as f64;
        entry.sr += r as u32;
        entry.sg += g as u32;
        entry.sb += b as u32;
        entry.n += 1;
    }

    let mut cells: Vec<((i32, i32, i32), VoxelAccum)> = bins.into_iter().collect();
    cells.sort_unstable_by_key(|(key, _)| *key);

    out.x.reserve(cells.len());
    out.y.reserve(cells.len());
    out.z.reserve(cells.len());
    let mut colors = cloud.colors.as_ref().map(|_| Colors::default());

    for (_, a) in cells {
        let n = a.n as f64;
        out.x.push((a.sx / n) as f32);
        out.y.push((a.sy / n) as f32);
        out.z.push((a.sz / n) as f32);
        if let Some(c) = colors.as_mut() {
            let half = a.n / 2;
            c.r.push(((a.sr + half) / a.n) as u8);
            c.g.push(((a.sg + half) / a.n) as u8);
            c.b.push(((a.sb + half) / a.n) as u8);
        }
    }
    out.colors = colors;

    out
}

#[cfg(test)]
mod tests {
    use super::voxel_downsample;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use tabletop_core::{PointCloud, PointXYZRGB};

    #[test]
    fn voxel_downsample_reduces_points() {
        let cloud = PointCloud::from_xyz(
            vec![0.0, 0.5, 0.0, 0.5, 0.0, 0.5, 0.0, 0.5],
            vec![0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.5, 0.5],
            vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5],
        );
        let out = voxel_downsample(&cloud, 1.0);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.x[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(out.y[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(out.z[0], 0.25, epsilon = 1e-6);
        assert!(out.colors.is_none());
    }

    #[test]
    fn voxel_downsample_averages_colors() {
        let cloud = PointCloud::from_points(&[
            PointXYZRGB::new([0.1, 0.1, 0.1], [10, 0, 255]),
            PointXYZRGB::new([0.2, 0.2, 0.2], [21, 1, 255]),
            PointXYZRGB::new([5.0, 5.0, 5.0], [7, 7, 7]),
        ])
        .with_frame_id("cam");
        let out = voxel_downsample(&cloud, 1.0);
        assert_eq!(out.len(), 2);
        // (10 + 21 + 1) / 2 = 16 with round-half-up
        assert_eq!(out.color(0), [16, 1, 255]);
        assert_eq!(out.color(1), [7, 7, 7]);
        assert_eq!(out.frame_id, "cam");
    }

    #[test]
    fn voxel_downsample_is_order_independent() {
        let a = PointCloud::from_xyz(vec![0.0, 3.0, 1.5], vec![0.0; 3], vec![0.0; 3]);
        let b = PointCloud::from_xyz(vec![1.5, 0.0, 3.0], vec![0.0; 3], vec![0.0; 3]);
        assert_eq!(voxel_downsample(&a, 1.0), voxel_downsample(&b, 1.0));
    }

    #[test]
    fn voxel_downsample_skips_non_finite() {
        let cloud = PointCloud::from_xyz(vec![f32::NAN, 1.0], vec![0.0; 2], vec![0.0; 2]);
        let out = voxel_downsample(&cloud, 1.0);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn voxel_downsample_empty_cloud() {
        assert!(voxel_downsample(&PointCloud::new(), 1.0).is_empty());
    }

    #[test]
    #[should_panic]
    fn voxel_downsample_rejects_zero_size() {
        let _ = voxel_downsample(&PointCloud::new(), 0.0);
    }

    proptest! {
        #[test]
        fn voxel_downsample_never_increases_points(
            pts in prop::collection::vec((-100.0f32..100.0f32, -100.0f32..100.0f32, -100.0f32..100.0f32), 1..3000),
            voxel_size in 0.01f32..10.0f32,
        ) {
            let cloud = PointCloud::from_xyz(
                pts.iter().map(|p| p.0).collect(),
                pts.iter().map(|p| p.1).collect(),
                pts.iter().map(|p| p.2).collect(),
            );
            let out = voxel_downsample(&cloud, voxel_size);
            prop_assert!(out.len() <= cloud.len());
        }
    }
}

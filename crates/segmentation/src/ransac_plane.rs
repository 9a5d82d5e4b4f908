use log::debug;
use nalgebra::{Matrix3, SymmetricEigen};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tabletop_core::PointCloud;

use crate::plane::PlaneModel;

/// Parameters of the RANSAC plane search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    /// Maximum point-to-plane distance for an inlier.
    pub distance_threshold: f32,
    /// Number of hypotheses drawn (upper bound, early exit may stop sooner).
    pub max_iterations: usize,
    /// Refit the winning model to all its inliers by least squares.
    pub optimize_coefficients: bool,
    /// RNG seed; `None` draws a fresh seed per call.
    pub seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.02,
            max_iterations: 1000,
            optimize_coefficients: true,
            seed: None,
        }
    }
}

/// Fits a plane to the point cloud using the RANSAC algorithm with a
/// deterministic seed for the random number generator.
///
/// # Algorithm
///
/// 1. Pre-generate all random samples upfront for determinism.
/// 2. Score hypotheses by inlier count, in parallel with rayon on large clouds.
/// 3. Apply adaptive early termination based on inlier ratio (sequential path).
/// 4. Return the best plane model and its inlier indices.
///
/// The returned model's normal points away from the origin. If no non-degenerate
/// hypothesis was found the inlier list is empty.
pub fn ransac_plane_seeded(
    cloud: &PointCloud,
    distance_threshold: f32,
    iterations: usize,
    seed: u64,
) -> (PlaneModel, Vec<usize>) {
    let n = cloud.len();

    if n < 3 {
        return (PlaneModel::default(), Vec::new());
    }

    let points: Vec<[f32; 3]> = cloud.iter_points().collect();

    // Pre-generate all random samples for determinism
    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<(usize, usize, usize)> = (0..iterations)
        .filter_map(|_| sample_three_distinct(n, &mut rng))
        .collect();

    let use_parallel = n >= 10_000 && samples.len() >= 16;

    let best = if use_parallel {
        samples
            .par_iter()
            .filter_map(|&(i0, i1, i2)| {
                let model = fit_plane_from_three_points(&points[i0], &points[i1], &points[i2])?;
                let count = count_inliers(&points, &model, distance_threshold);
                Some((model, count))
            })
            .reduce_with(|a, b| if a.1 >= b.1 { a } else { b })
    } else {
        let mut best: Option<(PlaneModel, usize)> = None;

        for (iter, &(i0, i1, i2)) in samples.iter().enumerate() {
            let model = match fit_plane_from_three_points(&points[i0], &points[i1], &points[i2]) {
                Some(m) => m,
                None => continue,
            };

            let inlier_count = count_inliers(&points, &model, distance_threshold);

            if best.map_or(true, |(_, c)| inlier_count > c) {
                best = Some((model, inlier_count));

                // Adaptive early termination
                let w = inlier_count as f64 / n as f64;
                if w > 0.5 {
                    let needed = (1.0 - 0.999f64).ln() / (1.0 - w.powi(3)).ln();
                    if (iter as f64) > needed {
                        debug!("ransac: early exit after {} of {} hypotheses", iter + 1, samples.len());
                        break;
                    }
                }
            }
        }

        best
    };

    match best {
        Some((model, _)) => {
            let inliers = select_inliers(&points, &model, distance_threshold);
            (model, inliers)
        }
        None => (PlaneModel::default(), Vec::new()),
    }
}

/// RANSAC followed by the optional least-squares refinement.
///
/// With refinement on, the inliers are re-selected against the refined
/// model, which is what the caller partitions by.
pub fn fit_plane(cloud: &PointCloud, params: &RansacParams) -> (PlaneModel, Vec<usize>) {
    let seed = params
        .seed
        .unwrap_or_else(|| rand::thread_rng().next_u64());
    let (model, inliers) = ransac_plane_seeded(
        cloud,
        params.distance_threshold,
        params.max_iterations,
        seed,
    );

    if !params.optimize_coefficients || inliers.is_empty() {
        return (model, inliers);
    }

    let points: Vec<[f32; 3]> = cloud.iter_points().collect();
    match refine_plane(&points, &inliers) {
        Some(refined) => {
            let refined_inliers = select_inliers(&points, &refined, params.distance_threshold);
            debug!(
                "ransac: refined {:?} -> {:?}, inliers {} -> {}",
                model.coefficients(),
                refined.coefficients(),
                inliers.len(),
                refined_inliers.len()
            );
            (refined, refined_inliers)
        }
        None => (model, inliers),
    }
}

/// Total least-squares plane through the given inliers.
///
/// The normal is the eigenvector of the inlier covariance with the smallest
/// eigenvalue. Returns `None` for fewer than four inliers or a degenerate
/// (non-finite) solution.
pub fn refine_plane(points: &[[f32; 3]], inliers: &[usize]) -> Option<PlaneModel> {
    if inliers.len() <= 3 {
        return None;
    }

    let count = inliers.len() as f64;
    let mut centroid = [0.0f64; 3];
    for &i in inliers {
        for axis in 0..3 {
            centroid[axis] += points[i][axis] as f64;
        }
    }
    for c in &mut centroid {
        *c /= count;
    }

    let mut cov = Matrix3::<f64>::zeros();
    for &i in inliers {
        let d = [
            points[i][0] as f64 - centroid[0],
            points[i][1] as f64 - centroid[1],
            points[i][2] as f64 - centroid[2],
        ];
        for r in 0..3 {
            for c in 0..3 {
                cov[(r, c)] += d[r] * d[c];
            }
        }
    }

    let eigen = SymmetricEigen::new(cov);
    let (min_idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let n = eigen.eigenvectors.column(min_idx);
    let d = -(n[0] * centroid[0] + n[1] * centroid[1] + n[2] * centroid[2]);

    let model = PlaneModel::from_coefficients([n[0] as f32, n[1] as f32, n[2] as f32, d as f32])?;
    if !model.d.is_finite() {
        return None;
    }
    Some(model.oriented_away_from_origin())
}

fn select_inliers(points: &[[f32; 3]], model: &PlaneModel, threshold: f32) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| model.distance_to_point(p) <= threshold)
        .map(|(j, _)| j)
        .collect()
}

/// Count inliers sequentially.
#[inline]
fn count_inliers(points: &[[f32; 3]], model: &PlaneModel, threshold: f32) -> usize {
    points
        .iter()
        .filter(|p| model.distance_to_point(p) <= threshold)
        .count()
}

/// Samples 3 distinct indices in [0, n).
fn sample_three_distinct(n: usize, rng: &mut StdRng) -> Option<(usize, usize, usize)> {
    if n < 3 {
        return None;
    }
    let i0 = rng.gen_range(0..n);
    let mut i1 = rng.gen_range(0..n);
    let mut attempts = 0;
    while i1 == i0 {
        if attempts > 100 {
            return None;
        }
        i1 = rng.gen_range(0..n);
        attempts += 1;
    }
    let mut i2 = rng.gen_range(0..n);
    attempts = 0;
    while i2 == i0 || i2 == i1 {
        if attempts > 100 {
            return None;
        }
        i2 = rng.gen_range(0..n);
        attempts += 1;
    }
    Some((i0, i1, i2))
}

/// Fits a plane through 3 points, returning `None` if they are collinear.
fn fit_plane_from_three_points(p0: &[f32; 3], p1: &[f32; 3], p2: &[f32; 3]) -> Option<PlaneModel> {
    let v1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    let v2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

    // Cross product: v1 x v2
    let nx = v1[1] * v2[2] - v1[2] * v2[1];
    let ny = v1[2] * v2[0] - v1[0] * v2[2];
    let nz = v1[0] * v2[1] - v1[1] * v2[0];

    let len = (nx * nx + ny * ny + nz * nz).sqrt();

    if len < 1e-10 || !len.is_finite() {
        return None;
    }

    let normal = [nx / len, ny / len, nz / len];
    let d = -(normal[0] * p0[0] + normal[1] * p0[1] + normal[2] * p0[2]);

    Some(PlaneModel { normal, d }.oriented_away_from_origin())
}

//! Seeded RANSAC around the normalized DLT homography.

use super::{HomographyEstimator, HomographyFit};
use crate::core::error::SelectError;
use crate::core::geometry::project_point;
use nalgebra::{DMatrix, Matrix3, Point2};
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

const MIN_SAMPLES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// 每次估计都用该种子重建 RNG，结果与扫描顺序无关
    pub seed: u64,
    pub max_iterations: usize,
    pub confidence: f64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 2000,
            confidence: 0.995,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> Result<(), SelectError> {
        if self.max_iterations == 0 {
            return Err(SelectError::InvalidConfig(
                "ransac.max_iterations must be positive".to_string(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(SelectError::InvalidConfig(format!(
                "ransac.confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

pub struct RansacHomographyEstimator {
    config: RansacConfig,
}

impl RansacHomographyEstimator {
    pub fn new() -> Self {
        Self::with_config(RansacConfig::default())
    }

    pub fn with_config(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(RansacConfig {
            seed,
            ..Default::default()
        })
    }
}

impl Default for RansacHomographyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl HomographyEstimator for RansacHomographyEstimator {
    fn estimate(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
        reproj_threshold: f64,
    ) -> Option<HomographyFit> {
        let n = src.len();
        if n < MIN_SAMPLES || dst.len() != n {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let all_indices: Vec<usize> = (0..n).collect();
        let mut sample = [0usize; MIN_SAMPLES];

        let mut best: Option<(Matrix3<f64>, usize)> = None;
        let mut max_iters = self.config.max_iterations;
        let mut iters = 0;

        while iters < max_iters {
            iters += 1;
            all_indices
                .as_slice()
                .choose_multiple(&mut rng, MIN_SAMPLES)
                .enumerate()
                .for_each(|(k, &idx)| sample[k] = idx);

            if has_collinear_triple(src, &sample) || has_collinear_triple(dst, &sample) {
                continue;
            }

            let sample_src: Vec<_> = sample.iter().map(|&i| src[i]).collect();
            let sample_dst: Vec<_> = sample.iter().map(|&i| dst[i]).collect();
            let Some(model) = dlt_homography(&sample_src, &sample_dst) else {
                continue;
            };

            let count = count_inliers(&model, src, dst, reproj_threshold);
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((model, count));
                max_iters = adaptive_iterations(
                    self.config.confidence,
                    count as f64 / n as f64,
                    iters,
                    self.config.max_iterations,
                );
            }
        }

        let (model, _) = best?;
        let mut matrix = model;
        let mut inliers = inlier_mask(&model, src, dst, reproj_threshold);

        // 用全部内点重新拟合，只在内点不减少时采用
        let (in_src, in_dst): (Vec<_>, Vec<_>) = inliers
            .iter()
            .enumerate()
            .filter(|(_, &inlier)| inlier)
            .map(|(i, _)| (src[i], dst[i]))
            .unzip();
        if let Some(refined) = dlt_homography(&in_src, &in_dst) {
            let refined_mask = inlier_mask(&refined, src, dst, reproj_threshold);
            if count_true(&refined_mask) >= count_true(&inliers) {
                matrix = refined;
                inliers = refined_mask;
            }
        }

        if count_true(&inliers) < MIN_SAMPLES {
            return None;
        }

        Some(HomographyFit { matrix, inliers })
    }
}

/// Normalized DLT: Hartley-normalize both point sets, take the right singular
/// vector of the smallest singular value, de-normalize and scale `H[2,2]` to 1.
pub fn dlt_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = src.len();
    if n < MIN_SAMPLES || dst.len() != n {
        return None;
    }

    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    // 4 点时只有 8 行，补零行使 SVD 给出完整的 V
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let null_row = svd.singular_values.imin();
    let h = v_t.row(null_row);

    let h_n = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let mut h_mat = t_dst.try_inverse()? * h_n * t_src;

    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    }
    if h_mat.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(h_mat)
}

/// Zero-mean, average distance sqrt(2).
fn normalize_points(points: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| Point2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((normalized, t))
}

fn has_collinear_triple(points: &[Point2<f64>], sample: &[usize; MIN_SAMPLES]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|t| {
        let (a, b, c) = (points[sample[t[0]]], points[sample[t[1]]], points[sample[t[2]]]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        cross.abs() < 1e-6
    })
}

fn reprojection_error(h: &Matrix3<f64>, src: &Point2<f64>, dst: &Point2<f64>) -> f64 {
    let p = project_point(h, src);
    let err = ((p.x - dst.x).powi(2) + (p.y - dst.y).powi(2)).sqrt();
    if err.is_finite() {
        err
    } else {
        f64::INFINITY
    }
}

fn inlier_mask(h: &Matrix3<f64>, src: &[Point2<f64>], dst: &[Point2<f64>], thresh: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(h, s, d) <= thresh)
        .collect()
}

fn count_inliers(h: &Matrix3<f64>, src: &[Point2<f64>], dst: &[Point2<f64>], thresh: f64) -> usize {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| reprojection_error(h, s, d) <= thresh)
        .count()
}

fn count_true(mask: &[bool]) -> usize {
    mask.iter().filter(|&&b| b).count()
}

fn adaptive_iterations(
    confidence: f64,
    inlier_ratio: f64,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(MIN_SAMPLES as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let needed = ((1.0 - confidence).ln() / denom).ceil() as usize;
    needed.clamp(iters_so_far, max_iters)
}

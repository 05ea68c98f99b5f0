use super::{Descriptor, FeatureDetector, FeatureSet, Keypoint};
use crate::core::error::SelectError;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// 描述子网格边长（8x8 = 64 维）
const DESCRIPTOR_GRID: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub max_features: usize,
    /// Harris 窗口边长（奇数）
    pub block_size: usize,
    pub harris_k: f32,
    /// 相对最大响应的阈值比例
    pub quality_level: f32,
    /// Half side of the descriptor patch; a multiple of 4.
    pub descriptor_radius: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_features: 2000,
            block_size: 5,
            harris_k: 0.04,
            quality_level: 0.01,
            descriptor_radius: 8,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), SelectError> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(SelectError::InvalidConfig(format!(
                "detector.block_size must be odd and >= 3, got {}",
                self.block_size
            )));
        }
        if self.descriptor_radius < 4 || self.descriptor_radius % 4 != 0 {
            return Err(SelectError::InvalidConfig(format!(
                "detector.descriptor_radius must be a positive multiple of 4, got {}",
                self.descriptor_radius
            )));
        }
        if !(self.quality_level > 0.0 && self.quality_level < 1.0) {
            return Err(SelectError::InvalidConfig(format!(
                "detector.quality_level must be in (0, 1), got {}",
                self.quality_level
            )));
        }
        Ok(())
    }
}

/// Harris 角点 + 归一化块描述子
///
/// Corners are scored with the Harris response over a `block_size` window of
/// Sobel gradients, thinned by 3x3 non-maximum suppression and cut at
/// `quality_level * max_response`. Each corner is described by the mean
/// intensities of an 8x8 grid over its patch, zero-mean and unit-norm, so
/// descriptors compare under Euclidean distance and tolerate brightness and
/// contrast changes between neighbouring frames.
pub struct HarrisPatchDetector {
    config: DetectorConfig,
}

impl HarrisPatchDetector {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    fn harris_responses(&self, image: &GrayImage) -> Vec<f32> {
        let w = image.width() as usize;
        let h = image.height() as usize;
        let (gx, gy) = sobel(image);

        let mut ixx = vec![0.0f32; w * h];
        let mut iyy = vec![0.0f32; w * h];
        let mut ixy = vec![0.0f32; w * h];
        for i in 0..w * h {
            ixx[i] = gx[i] * gx[i];
            iyy[i] = gy[i] * gy[i];
            ixy[i] = gx[i] * gy[i];
        }

        let half = self.config.block_size / 2;
        let k = self.config.harris_k;
        let mut responses = vec![0.0f32; w * h];

        for y in (half + 1)..(h - half - 1) {
            for x in (half + 1)..(w - half - 1) {
                let mut sxx = 0.0f32;
                let mut syy = 0.0f32;
                let mut sxy = 0.0f32;
                for wy in (y - half)..=(y + half) {
                    let row = wy * w;
                    for wx in (x - half)..=(x + half) {
                        sxx += ixx[row + wx];
                        syy += iyy[row + wx];
                        sxy += ixy[row + wx];
                    }
                }
                let det = sxx * syy - sxy * sxy;
                let trace = sxx + syy;
                responses[y * w + x] = det - k * trace * trace;
            }
        }

        responses
    }

    fn describe(&self, image: &GrayImage, x: usize, y: usize) -> Option<Descriptor> {
        let radius = self.config.descriptor_radius;
        let cell = 2 * radius / DESCRIPTOR_GRID;
        let w = image.width() as usize;
        let pixels = image.as_raw();

        let x0 = x - radius;
        let y0 = y - radius;
        let mut desc = Vec::with_capacity(DESCRIPTOR_GRID * DESCRIPTOR_GRID);
        for gy in 0..DESCRIPTOR_GRID {
            for gx in 0..DESCRIPTOR_GRID {
                let mut sum = 0u32;
                for py in (y0 + gy * cell)..(y0 + (gy + 1) * cell) {
                    let row = py * w;
                    for px in (x0 + gx * cell)..(x0 + (gx + 1) * cell) {
                        sum += pixels[row + px] as u32;
                    }
                }
                desc.push(sum as f32 / (cell * cell) as f32);
            }
        }

        let mean = desc.iter().sum::<f32>() / desc.len() as f32;
        desc.iter_mut().for_each(|v| *v -= mean);
        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < 1e-3 {
            return None;
        }
        desc.iter_mut().for_each(|v| *v /= norm);
        Some(desc)
    }
}

impl Default for HarrisPatchDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureDetector for HarrisPatchDetector {
    fn detect(&self, image: &GrayImage) -> FeatureSet {
        let w = image.width() as usize;
        let h = image.height() as usize;
        let radius = self.config.descriptor_radius;
        let half = self.config.block_size / 2;

        if w < 2 * radius + 1 || h < 2 * radius + 1 || w < 2 * half + 5 || h < 2 * half + 5 {
            return FeatureSet::default();
        }

        let responses = self.harris_responses(image);
        let max_response = responses.iter().copied().fold(0.0f32, f32::max);
        if max_response <= 0.0 {
            return FeatureSet::default();
        }
        let threshold = self.config.quality_level * max_response;

        // 描述子块必须完整落在图像内，且 3x3 邻域已有响应
        let x_lo = radius.max(half + 2);
        let y_lo = radius.max(half + 2);
        let x_hi = (w - radius + 1).min(w - half - 2);
        let y_hi = (h - radius + 1).min(h - half - 2);

        let mut corners = Vec::new();
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let response = responses[y * w + x];
                if response <= threshold {
                    continue;
                }
                let is_max = (y - 1..=y + 1).all(|ny| {
                    (x - 1..=x + 1).all(|nx| (nx == x && ny == y) || responses[ny * w + nx] <= response)
                });
                if is_max {
                    corners.push((x, y, response));
                }
            }
        }

        corners.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        for (x, y, response) in corners {
            if keypoints.len() >= self.config.max_features {
                break;
            }
            if let Some(desc) = self.describe(image, x, y) {
                keypoints.push(Keypoint {
                    x: x as f32,
                    y: y as f32,
                    response,
                });
                descriptors.push(desc);
            }
        }

        FeatureSet::new(keypoints, descriptors)
    }
}

fn sobel(image: &GrayImage) -> (Vec<f32>, Vec<f32>) {
    let w = image.width() as usize;
    let h = image.height() as usize;
    let p = image.as_raw();
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let at = |dx: isize, dy: isize| -> f32 {
                let idx = (y as isize + dy) as usize * w + (x as isize + dx) as usize;
                p[idx] as f32
            };
            gx[y * w + x] = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1))
                - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
            gy[y * w + x] = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1))
                - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
        }
    }

    (gx, gy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(width: u32, height: u32, square: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if ((x / square) + (y / square)) % 2 == 0 {
                Luma([220])
            } else {
                Luma([30])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let detector = HarrisPatchDetector::new();
        let features = detector.detect(&GrayImage::from_pixel(64, 64, Luma([128])));
        assert!(features.is_empty());
        assert!(features.descriptors.is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_features() {
        let detector = HarrisPatchDetector::new();
        let features = detector.detect(&checkerboard(10, 10, 3));
        assert!(features.is_empty());
    }

    #[test]
    fn test_checkerboard_corners() {
        let detector = HarrisPatchDetector::new();
        let features = detector.detect(&checkerboard(96, 96, 16));

        assert!(features.len() >= 9, "got {} keypoints", features.len());
        assert_eq!(features.keypoints.len(), features.descriptors.len());

        let radius = DetectorConfig::default().descriptor_radius as f32;
        for (kp, desc) in features.keypoints.iter().zip(&features.descriptors) {
            assert!(kp.x >= radius && kp.x <= 96.0 - radius);
            assert!(kp.y >= radius && kp.y <= 96.0 - radius);
            assert_eq!(desc.len(), 64);
            let norm: f32 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_respects_max_features() {
        let detector = HarrisPatchDetector::with_config(DetectorConfig {
            max_features: 4,
            ..Default::default()
        });
        let features = detector.detect(&checkerboard(128, 128, 12));
        assert_eq!(features.len(), 4);
        for pair in features.keypoints.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }
    }

    #[test]
    fn test_validate() {
        assert!(DetectorConfig::default().validate().is_ok());
        let even_block = DetectorConfig {
            block_size: 4,
            ..Default::default()
        };
        assert!(even_block.validate().is_err());
        let odd_radius = DetectorConfig {
            descriptor_radius: 6,
            ..Default::default()
        };
        assert!(odd_radius.validate().is_err());
    }
}

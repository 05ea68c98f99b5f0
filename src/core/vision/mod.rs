//! 视觉后端接口
//!
//! Keypoint detection, descriptor matching and robust homography estimation
//! sit behind three traits so the caches never depend on a concrete backend.
//! The default implementations are plain CPU code: Harris corners with patch
//! descriptors, exact k-NN matching and DLT inside a seeded RANSAC loop.

pub mod detector;
pub mod matcher;
pub mod ransac;

pub use detector::{DetectorConfig, HarrisPatchDetector};
pub use matcher::BruteForceMatcher;
pub use ransac::{RansacConfig, RansacHomographyEstimator};

use image::GrayImage;
use nalgebra::{Matrix3, Point2};
use std::sync::Arc;
use thiserror::Error;

pub type Descriptor = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub response: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, response: 0.0 }
    }

    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// Keypoints of one frame with one descriptor per keypoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> Self {
        debug_assert_eq!(keypoints.len(), descriptors.len());
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// One nearest-neighbour candidate of a query descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatcherError {
    #[error("need at least {needed} train descriptors, got {got}")]
    TooFewTrainDescriptors { needed: usize, got: usize },
    #[error("descriptor length mismatch: {query} vs {train}")]
    DimensionMismatch { query: usize, train: usize },
}

/// Result of a robust homography fit: the matrix plus one inlier flag per
/// input correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyFit {
    pub matrix: Matrix3<f64>,
    pub inliers: Vec<bool>,
}

impl HomographyFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }
}

pub trait FeatureDetector: Send + Sync {
    /// Zero keypoints is a valid result.
    fn detect(&self, image: &GrayImage) -> FeatureSet;
}

pub trait DescriptorMatcher: Send + Sync {
    /// Returns up to `k` candidates per query descriptor, nearest first.
    fn knn_match(
        &self,
        query: &[Descriptor],
        train: &[Descriptor],
        k: usize,
    ) -> Result<Vec<Vec<KnnMatch>>, MatcherError>;
}

pub trait HomographyEstimator: Send + Sync {
    /// Maps `src` onto `dst`; `None` when no model can be fitted.
    fn estimate(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
        reproj_threshold: f64,
    ) -> Option<HomographyFit>;
}

/// The three backend capabilities used by one cache stack.
#[derive(Clone)]
pub struct VisionBackend {
    pub detector: Arc<dyn FeatureDetector>,
    pub matcher: Arc<dyn DescriptorMatcher>,
    pub estimator: Arc<dyn HomographyEstimator>,
}

impl VisionBackend {
    pub fn new(
        detector: Arc<dyn FeatureDetector>,
        matcher: Arc<dyn DescriptorMatcher>,
        estimator: Arc<dyn HomographyEstimator>,
    ) -> Self {
        Self {
            detector,
            matcher,
            estimator,
        }
    }

    pub fn with_configs(detector: &DetectorConfig, ransac: &RansacConfig) -> Self {
        Self::new(
            Arc::new(HarrisPatchDetector::with_config(detector.clone())),
            Arc::new(BruteForceMatcher::new()),
            Arc::new(RansacHomographyEstimator::with_config(ransac.clone())),
        )
    }
}

impl Default for VisionBackend {
    fn default() -> Self {
        Self::with_configs(&DetectorConfig::default(), &RansacConfig::default())
    }
}

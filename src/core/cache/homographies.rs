use super::{
    CacheStats, CorrespondenceSet, EmptyReason, FramePair, MatchCache, MemoCache, OverlapProvider,
};
use crate::core::debug;
use crate::core::error::SelectError;
use crate::core::geometry::{footprint_overlap, Quad};
use crate::core::source::{ColorMode, FrameId};
use crate::core::vision::HomographyEstimator;
use image::RgbImage;
use log::debug;
use nalgebra::{Matrix3, Point2};
use std::sync::Arc;

/// Pairs with this many correspondences or fewer are not estimated.
pub const MIN_MATCH_COUNT: usize = 10;
/// 目标帧像素单位
pub const REPROJ_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Homography {
    /// Maps source-frame pixels into the target frame.
    Estimated {
        matrix: Matrix3<f64>,
        inliers: Vec<bool>,
    },
    Undetermined,
}

impl Homography {
    pub fn matrix(&self) -> Option<&Matrix3<f64>> {
        match self {
            Homography::Estimated { matrix, .. } => Some(matrix),
            Homography::Undetermined => None,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, Homography::Undetermined)
    }
}

/// Result of one `overlap` call.
#[derive(Debug, Clone)]
pub struct OverlapReport {
    /// Covered fraction of the target frame; 0 when the pair is undetermined.
    pub ratio: f64,
    pub correspondences: Arc<CorrespondenceSet>,
    /// Source corners projected into the target frame, before clamping.
    pub footprint: Option<Quad>,
    pub debug: Option<RgbImage>,
}

/// 帧对单应缓存，并提供重叠率计算
pub struct HomographyCache {
    matches: MatchCache,
    estimator: Arc<dyn HomographyEstimator>,
    memo: MemoCache<FramePair, Homography>,
    render_debug: bool,
}

impl HomographyCache {
    pub fn new(matches: MatchCache, estimator: Arc<dyn HomographyEstimator>) -> Self {
        Self {
            matches,
            estimator,
            memo: MemoCache::new(),
            render_debug: false,
        }
    }

    pub fn with_debug(mut self, render_debug: bool) -> Self {
        self.render_debug = render_debug;
        self
    }

    pub fn get(&mut self, pair: &FramePair) -> Result<Arc<Homography>, SelectError> {
        if let Some(h) = self.memo.lookup(pair) {
            return Ok(h);
        }

        let correspondences = self.matches.get(pair)?;
        let homography = if correspondences.len() > MIN_MATCH_COUNT {
            let (src, dst) = self.matched_points(pair, &correspondences)?;
            match self.estimator.estimate(&src, &dst, REPROJ_THRESHOLD) {
                Some(fit) => Homography::Estimated {
                    matrix: fit.matrix,
                    inliers: fit.inliers,
                },
                None => Homography::Undetermined,
            }
        } else {
            Homography::Undetermined
        };

        Ok(self.memo.insert(pair.clone(), homography))
    }

    pub fn overlap(&mut self, source: &FrameId, target: &FrameId) -> Result<OverlapReport, SelectError> {
        let pair = FramePair::new(source.clone(), target.clone());
        let homography = self.get(&pair)?;
        let source_size = self.frame_size(source)?;

        let Homography::Estimated { matrix, inliers } = homography.as_ref() else {
            debug!("overlap {} = 0 (undetermined)", pair);
            return Ok(OverlapReport {
                ratio: 0.0,
                correspondences: Arc::new(CorrespondenceSet::Empty(EmptyReason::Undetermined)),
                footprint: None,
                debug: self
                    .render_debug
                    .then(|| debug::blank_canvas(source_size.0, source_size.1)),
            });
        };

        let target_size = self.frame_size(target)?;
        let (ratio, footprint) = footprint_overlap(matrix, source_size, target_size);
        let correspondences = self.matches.get(&pair)?;
        debug!("overlap {} = {:.4}", pair, ratio);

        let canvas = if self.render_debug {
            Some(self.render(&pair, &correspondences, inliers, &footprint)?)
        } else {
            None
        };

        Ok(OverlapReport {
            ratio,
            correspondences,
            footprint: Some(footprint),
            debug: canvas,
        })
    }

    pub fn evict_frame(&mut self, id: &FrameId) {
        let features = self.matches.features_mut();
        features.evict(id);
        features.frames_mut().evict(id);
    }

    pub fn evict_pair(&mut self, pair: &FramePair) {
        self.memo.evict(pair);
        self.matches.evict(pair);
    }

    /// Whether any layer still holds the image or features of `id`.
    pub fn contains_frame(&self, id: &FrameId) -> bool {
        let features = self.matches.features();
        features.contains(id) || features.frames().contains(id)
    }

    /// Whether any layer still holds the correspondences or homography of `pair`.
    pub fn contains_pair(&self, pair: &FramePair) -> bool {
        self.memo.contains(pair) || self.matches.contains(pair)
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.memo.stats()
    }

    pub fn matches(&self) -> &MatchCache {
        &self.matches
    }

    pub fn matches_mut(&mut self) -> &mut MatchCache {
        &mut self.matches
    }

    fn frame_size(&mut self, id: &FrameId) -> Result<(u32, u32), SelectError> {
        let image = self.matches.features_mut().frames_mut().get(id)?;
        Ok((image.width(), image.height()))
    }

    fn matched_points(
        &mut self,
        pair: &FramePair,
        correspondences: &CorrespondenceSet,
    ) -> Result<(Vec<Point2<f64>>, Vec<Point2<f64>>), SelectError> {
        let features = self.matches.features_mut();
        let query = features.get(&pair.source)?;
        let train = features.get(&pair.target)?;
        Ok(correspondences
            .as_slice()
            .iter()
            .map(|c| (query.keypoints[c.query_idx].point(), train.keypoints[c.train_idx].point()))
            .unzip())
    }

    fn render(
        &mut self,
        pair: &FramePair,
        correspondences: &CorrespondenceSet,
        inliers: &[bool],
        footprint: &Quad,
    ) -> Result<RgbImage, SelectError> {
        let (src, dst) = self.matched_points(pair, correspondences)?;
        let lines: Vec<_> = src
            .into_iter()
            .zip(dst)
            .zip(inliers)
            .filter(|(_, &inlier)| inlier)
            .map(|(line, _)| line)
            .collect();

        let source = self.matches.features_mut().frames_mut().source_mut();
        let source_rgb = source.read(&pair.source, ColorMode::Color)?.to_rgb8();
        let target_rgb = source.read(&pair.target, ColorMode::Color)?.to_rgb8();
        Ok(debug::render_overlap(&source_rgb, &target_rgb, footprint, &lines))
    }
}

impl OverlapProvider for HomographyCache {
    fn frame_ids(&self) -> &[FrameId] {
        self.matches.features().frames().source().frame_ids()
    }

    fn overlap(&mut self, source: &FrameId, target: &FrameId) -> Result<OverlapReport, SelectError> {
        HomographyCache::overlap(self, source, target)
    }

    fn evict_frame(&mut self, id: &FrameId) {
        HomographyCache::evict_frame(self, id)
    }

    fn evict_pair(&mut self, pair: &FramePair) {
        HomographyCache::evict_pair(self, pair)
    }
}

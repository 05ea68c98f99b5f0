use super::{CacheStats, FrameCache, MemoCache};
use crate::core::error::SelectError;
use crate::core::source::FrameId;
use crate::core::vision::{FeatureDetector, FeatureSet};
use log::debug;
use std::sync::Arc;

/// 每帧特征缓存（基于灰度图）
pub struct FeatureCache {
    frames: FrameCache,
    detector: Arc<dyn FeatureDetector>,
    memo: MemoCache<FrameId, FeatureSet>,
}

impl FeatureCache {
    pub fn new(frames: FrameCache, detector: Arc<dyn FeatureDetector>) -> Self {
        Self {
            frames,
            detector,
            memo: MemoCache::new(),
        }
    }

    pub fn get(&mut self, id: &FrameId) -> Result<Arc<FeatureSet>, SelectError> {
        if let Some(features) = self.memo.lookup(id) {
            return Ok(features);
        }

        let image = self.frames.get(id)?;
        let features = match image.as_luma8() {
            Some(gray) => self.detector.detect(gray),
            None => self.detector.detect(&image.to_luma8()),
        };
        debug!("{} keypoints in {}", features.len(), id);

        Ok(self.memo.insert(id.clone(), features))
    }

    pub fn evict(&mut self, id: &FrameId) -> bool {
        self.memo.evict(id)
    }

    pub fn contains(&self, id: &FrameId) -> bool {
        self.memo.contains(id)
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

    pub fn frames(&self) -> &FrameCache {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameCache {
        &mut self.frames
    }
}

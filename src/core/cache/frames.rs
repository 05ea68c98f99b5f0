use super::{CacheStats, MemoCache};
use crate::core::error::SelectError;
use crate::core::source::{ColorMode, FrameId, ImageSource};
use image::DynamicImage;
use log::debug;
use std::sync::Arc;

/// Decoded frames, one decode mode per cache.
pub struct FrameCache {
    source: ImageSource,
    mode: ColorMode,
    memo: MemoCache<FrameId, DynamicImage>,
}

impl FrameCache {
    pub fn new(source: ImageSource, mode: ColorMode) -> Self {
        Self {
            source,
            mode,
            memo: MemoCache::new(),
        }
    }

    pub fn get(&mut self, id: &FrameId) -> Result<Arc<DynamicImage>, SelectError> {
        if let Some(image) = self.memo.lookup(id) {
            return Ok(image);
        }
        let image = self.source.read(id, self.mode)?;
        debug!("decoded {} ({}x{})", id, image.width(), image.height());
        Ok(self.memo.insert(id.clone(), image))
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

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Uncached access, e.g. for colour reads while the cache decodes grayscale.
    pub fn source_mut(&mut self) -> &mut ImageSource {
        &mut self.source
    }
}

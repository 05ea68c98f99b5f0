//! 分层记忆缓存
//!
//! Frame → features → correspondences → homography. Every layer owns the one
//! below it and computes lazily on first lookup. Entries are only dropped
//! through `evict`, which the selection scan calls as it moves past a frame.

pub mod features;
pub mod frames;
pub mod homographies;
pub mod matches;

pub use features::FeatureCache;
pub use frames::FrameCache;
pub use homographies::{Homography, HomographyCache, OverlapReport};
pub use matches::{Correspondence, CorrespondenceSet, EmptyReason, FramePair, MatchCache};

use super::error::SelectError;
use super::source::FrameId;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Key-value store with explicit eviction. Values are shared as `Arc` so a
/// caller can keep using a value after the entry is evicted.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: HashMap<K, Arc<V>>,
    stats: CacheStats,
}

impl<K: Eq + Hash, V> MemoCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Stored value for `key`; counts a hit or a miss.
    pub fn lookup(&mut self, key: &K) -> Option<Arc<V>> {
        match self.entries.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(Arc::clone(value))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    pub fn evict(&mut self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.evictions += 1;
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K: Eq + Hash, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// What the selection scan needs from the cache stack.
pub trait OverlapProvider {
    /// Frame ids of the whole source in sequence order.
    fn frame_ids(&self) -> &[FrameId];

    fn overlap(&mut self, source: &FrameId, target: &FrameId) -> Result<OverlapReport, SelectError>;

    /// Drops the image and feature entries of `id`.
    fn evict_frame(&mut self, id: &FrameId);

    /// Drops the correspondence and homography entries of `pair`.
    fn evict_pair(&mut self, pair: &FramePair);
}

use super::{CacheStats, FeatureCache, MemoCache};
use crate::core::error::SelectError;
use crate::core::source::FrameId;
use crate::core::vision::{DescriptorMatcher, KnnMatch, MatcherError};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Lowe 比率阈值（固定）
pub const RATIO: f32 = 0.7;
/// A source frame needs more keypoints than this to be matched.
pub const MIN_QUERY_KEYPOINTS: usize = 8;
const K: usize = 2;

/// Ordered frame pair; `source` comes before `target` in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramePair {
    pub source: FrameId,
    pub target: FrameId,
}

impl FramePair {
    pub fn new(source: FrameId, target: FrameId) -> Self {
        debug_assert!(source < target, "pair {source} -> {target} is out of order");
        Self { source, target }
    }
}

impl fmt::Display for FramePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.source, self.target)
    }
}

/// A source keypoint matched to a target keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmptyReason {
    TooFewKeypoints { found: usize },
    MatcherFailed(MatcherError),
    /// No homography could be estimated for the pair.
    Undetermined,
}

/// Ratio-filtered matches of one pair. `Matched` may still hold zero entries.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrespondenceSet {
    Matched(Vec<Correspondence>),
    Empty(EmptyReason),
}

impl CorrespondenceSet {
    pub fn as_slice(&self) -> &[Correspondence] {
        match self {
            CorrespondenceSet::Matched(matches) => matches,
            CorrespondenceSet::Empty(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// 帧对匹配缓存
pub struct MatchCache {
    features: FeatureCache,
    matcher: Arc<dyn DescriptorMatcher>,
    memo: MemoCache<FramePair, CorrespondenceSet>,
}

impl MatchCache {
    pub fn new(features: FeatureCache, matcher: Arc<dyn DescriptorMatcher>) -> Self {
        Self {
            features,
            matcher,
            memo: MemoCache::new(),
        }
    }

    pub fn get(&mut self, pair: &FramePair) -> Result<Arc<CorrespondenceSet>, SelectError> {
        if let Some(set) = self.memo.lookup(pair) {
            return Ok(set);
        }

        let query = self.features.get(&pair.source)?;
        let set = if query.len() <= MIN_QUERY_KEYPOINTS {
            CorrespondenceSet::Empty(EmptyReason::TooFewKeypoints { found: query.len() })
        } else {
            let train = self.features.get(&pair.target)?;
            match self.matcher.knn_match(&query.descriptors, &train.descriptors, K) {
                Ok(knn) => CorrespondenceSet::Matched(ratio_filter(&knn)),
                Err(e) => {
                    warn!("⚠️ matcher failed for {}: {}, treating as no matches", pair, e);
                    CorrespondenceSet::Empty(EmptyReason::MatcherFailed(e))
                }
            }
        };
        debug!("{} correspondences for {}", set.len(), pair);

        Ok(self.memo.insert(pair.clone(), set))
    }

    pub fn evict(&mut self, pair: &FramePair) -> bool {
        self.memo.evict(pair)
    }

    pub fn contains(&self, pair: &FramePair) -> bool {
        self.memo.contains(pair)
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

    pub fn features(&self) -> &FeatureCache {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureCache {
        &mut self.features
    }
}

fn ratio_filter(knn: &[Vec<KnnMatch>]) -> Vec<Correspondence> {
    knn.iter()
        .filter_map(|candidates| match candidates.as_slice() {
            [best, second, ..] if best.distance < RATIO * second.distance => Some(Correspondence {
                query_idx: best.query_idx,
                train_idx: best.train_idx,
                distance: best.distance,
            }),
            _ => None,
        })
        .collect()
}

use super::{Descriptor, DescriptorMatcher, KnnMatch, MatcherError};
use rayon::prelude::*;

/// 暴力 k 近邻匹配（欧氏距离）
///
/// Exact search, parallel over query descriptors. Asking for more neighbours
/// than there are train descriptors is an error, matching how index-based
/// matchers refuse to build on too few points.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl BruteForceMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn knn_match(
        &self,
        query: &[Descriptor],
        train: &[Descriptor],
        k: usize,
    ) -> Result<Vec<Vec<KnnMatch>>, MatcherError> {
        if k == 0 || query.is_empty() {
            return Ok(vec![Vec::new(); query.len()]);
        }
        if train.len() < k {
            return Err(MatcherError::TooFewTrainDescriptors {
                needed: k,
                got: train.len(),
            });
        }

        let dim = train[0].len();
        if let Some(bad) = train.iter().find(|t| t.len() != dim) {
            return Err(MatcherError::DimensionMismatch {
                query: dim,
                train: bad.len(),
            });
        }
        if let Some(bad) = query.iter().find(|q| q.len() != dim) {
            return Err(MatcherError::DimensionMismatch {
                query: bad.len(),
                train: dim,
            });
        }

        let matches = query
            .par_iter()
            .enumerate()
            .map(|(query_idx, q)| {
                let mut best: Vec<KnnMatch> = Vec::with_capacity(k + 1);
                for (train_idx, t) in train.iter().enumerate() {
                    let distance = euclidean(q, t);
                    if best.len() == k && distance >= best[k - 1].distance {
                        continue;
                    }
                    let pos = best.partition_point(|m| m.distance <= distance);
                    best.insert(
                        pos,
                        KnnMatch {
                            query_idx,
                            train_idx,
                            distance,
                        },
                    );
                    best.truncate(k);
                }
                best
            })
            .collect();

        Ok(matches)
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

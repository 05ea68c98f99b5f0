use super::state_machine::{ScanAction, ScanConfig, ScanState};
use crate::core::cache::{FramePair, OverlapProvider, OverlapReport};
use crate::core::error::SelectError;
use crate::core::source::FrameId;
use image::RgbImage;
use log::{debug, info};
use serde::Serialize;

/// One kept transition of the path: `target` is the first frame after
/// `source` whose overlap fell below the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: FrameId,
    pub target: FrameId,
    pub overlap: f64,
}

/// 选帧结果图
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapGraph {
    pub start: FrameId,
    pub edges: Vec<Edge>,
}

impl OverlapGraph {
    /// First anchor followed by every cut target.
    pub fn path(&self) -> Vec<FrameId> {
        std::iter::once(self.start.clone())
            .chain(self.edges.iter().map(|edge| edge.target.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord {
    pub anchor: FrameId,
    pub target: FrameId,
    pub overlap: f64,
    pub correspondences: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub probed_pairs: u64,
    pub cuts: u64,
    pub evicted_frames: u64,
    pub evicted_pairs: u64,
}

/// Everything one scan produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub graph: OverlapGraph,
    pub probes: Vec<ProbeRecord>,
    /// Debug canvases of the cut pairs, when the provider renders them.
    pub debug_images: Vec<(FramePair, RgbImage)>,
    pub stats: SelectionStats,
}

/// 贪心单遍扫描
///
/// Probes `(anchor, anchor + 1), (anchor, anchor + 2), ...` until the overlap
/// drops below the threshold, keeps that frame as the next anchor and tells
/// the provider to drop everything the finished window cached. The scan never
/// revisits an earlier target, so the result is one deterministic greedy path.
pub struct SelectionEngine<P: OverlapProvider> {
    provider: P,
    start: usize,
    config: ScanConfig,
    evict_on_cut: bool,
}

impl<P: OverlapProvider> SelectionEngine<P> {
    /// Scans frames `[start, end)` of the provider's sequence.
    pub fn new(provider: P, start: usize, end: usize, overlap_threshold: f64) -> Self {
        Self {
            provider,
            start,
            config: ScanConfig {
                overlap_threshold,
                range_end: end,
            },
            evict_on_cut: true,
        }
    }

    pub fn with_eviction(mut self, evict_on_cut: bool) -> Self {
        self.evict_on_cut = evict_on_cut;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    pub fn run(&mut self) -> Result<ScanOutcome, SelectError> {
        let ids = self.provider.frame_ids().to_vec();
        let end = self.config.range_end;
        if self.start >= end || end > ids.len() {
            return Err(SelectError::InvalidConfig(format!(
                "frame range [{}, {}) does not fit a sequence of {} frames",
                self.start,
                end,
                ids.len()
            )));
        }

        info!(
            "🎯 selection start: frames [{}, {}), threshold {}",
            self.start, end, self.config.overlap_threshold
        );

        let mut state = ScanState::new(self.start);
        let mut pending: Option<OverlapReport> = None;
        let mut edges = Vec::new();
        let mut probes = Vec::new();
        let mut debug_images = Vec::new();
        let mut stats = SelectionStats::default();

        loop {
            let overlap = pending.as_ref().map(|report| report.ratio);
            let (next, action) = state.transition(overlap, &self.config);

            match action {
                ScanAction::Probe { anchor, target } => {
                    let report = self.provider.overlap(&ids[anchor], &ids[target])?;
                    debug!(
                        "probe {} -> {}: overlap {:.4}",
                        ids[anchor], ids[target], report.ratio
                    );
                    stats.probed_pairs += 1;
                    probes.push(ProbeRecord {
                        anchor: ids[anchor].clone(),
                        target: ids[target].clone(),
                        overlap: report.ratio,
                        correspondences: report.correspondences.len(),
                    });
                    pending = Some(report);
                }
                ScanAction::RecordCut { anchor, target } => {
                    let report = pending.take();
                    let overlap = report.as_ref().map_or(0.0, |r| r.ratio);
                    if let Some(canvas) = report.and_then(|r| r.debug) {
                        debug_images.push((FramePair::new(ids[anchor].clone(), ids[target].clone()), canvas));
                    }
                    debug!("✂️ cut {} -> {} (overlap {:.4})", ids[anchor], ids[target], overlap);

                    edges.push(Edge {
                        source: ids[anchor].clone(),
                        target: ids[target].clone(),
                        overlap,
                    });
                    stats.cuts += 1;

                    if self.evict_on_cut {
                        self.evict_window(&ids, anchor, target, &mut stats);
                    }
                }
                ScanAction::Continue => {}
                ScanAction::Finish => break,
            }

            state = next;
        }

        let graph = OverlapGraph {
            start: ids[self.start].clone(),
            edges,
        };
        info!(
            "✅ selection done: kept {} of {} frames ({} probes)",
            graph.edges.len() + 1,
            end - self.start,
            stats.probed_pairs
        );

        Ok(ScanOutcome {
            graph,
            probes,
            debug_images,
            stats,
        })
    }

    /// Releases the window of a cut `(anchor, target)`: the anchor's frame
    /// data, every probed pair of the anchor and every frame strictly between.
    /// The target stays cached as the next anchor.
    fn evict_window(&mut self, ids: &[FrameId], anchor: usize, target: usize, stats: &mut SelectionStats) {
        self.provider.evict_frame(&ids[anchor]);
        stats.evicted_frames += 1;

        for k in anchor + 1..=target {
            self.provider
                .evict_pair(&FramePair::new(ids[anchor].clone(), ids[k].clone()));
            stats.evicted_pairs += 1;
        }
        for id in &ids[anchor + 1..target] {
            self.provider.evict_frame(id);
            stats.evicted_frames += 1;
        }
        debug!(
            "🧹 evicted window {}..{} ({} pairs)",
            ids[anchor],
            ids[target],
            target - anchor
        );
    }
}

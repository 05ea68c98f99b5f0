//! 稀疏关键帧选择器

use crate::core::cache::{FeatureCache, FrameCache, FramePair, HomographyCache, MatchCache};
use crate::core::config::SelectionConfig;
use crate::core::error::SelectError;
use crate::core::source::{FrameId, ImageSource};
use crate::core::vision::VisionBackend;
use crate::selection::{OverlapGraph, ProbeRecord, SelectionEngine, SelectionStats};
use image::RgbImage;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 关键帧选择入口
///
/// ```ignore
/// let selector = SparseFrameSelector::open("P01_01.tar", SelectionConfig::with_threshold(0.8))?;
/// let selection = selector.select()?;
/// write_frame_list("out/P01_01.txt", &selection.frames)?;
/// ```
pub struct SparseFrameSelector {
    source: PathBuf,
    config: SelectionConfig,
    backend: VisionBackend,
    frame_count: usize,
}

impl SparseFrameSelector {
    /// Validates `config` and the source kind up front.
    pub fn open(source: impl AsRef<Path>, config: SelectionConfig) -> Result<Self, SelectError> {
        config.validate()?;
        let source = source.as_ref().to_path_buf();
        let frame_count = ImageSource::open(&source, &config)?.len();
        config.frame_range(frame_count)?;

        info!("🎬 SparseFrameSelector: {} ({} frames)", source.display(), frame_count);
        let backend = VisionBackend::with_configs(&config.detector, &config.ransac);
        Ok(Self {
            source,
            config,
            backend,
            frame_count,
        })
    }

    pub fn with_backend(mut self, backend: VisionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Runs one scan over a fresh cache stack.
    pub fn select(&self) -> Result<Selection, SelectError> {
        let source = ImageSource::open(&self.source, &self.config)?;
        let (start, end) = self.config.frame_range(source.len())?;

        let frames = FrameCache::new(source, self.config.color_mode);
        let features = FeatureCache::new(frames, self.backend.detector.clone());
        let matches = MatchCache::new(features, self.backend.matcher.clone());
        let homographies =
            HomographyCache::new(matches, self.backend.estimator.clone()).with_debug(self.config.debug);

        let mut engine = SelectionEngine::new(homographies, start, end, self.config.overlap_threshold)
            .with_eviction(self.config.evict_on_cut);
        let outcome = engine.run()?;

        Ok(Selection {
            source: self.source.clone(),
            overlap_threshold: self.config.overlap_threshold,
            frames: outcome.graph.path(),
            graph: outcome.graph,
            probes: outcome.probes,
            debug_images: outcome.debug_images,
            stats: outcome.stats,
        })
    }

    /// Copies the original bytes of `frames` into `dst_dir`.
    pub fn export(&self, frames: &[FrameId], dst_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, SelectError> {
        export_frames(&self.source, &self.config, frames, dst_dir)
    }
}

impl Drop for SparseFrameSelector {
    fn drop(&mut self) {
        info!("🗑️ SparseFrameSelector: released {}", self.source.display());
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub source: PathBuf,
    pub overlap_threshold: f64,
    /// Kept frames in sequence order.
    pub frames: Vec<FrameId>,
    pub graph: OverlapGraph,
    pub probes: Vec<ProbeRecord>,
    pub debug_images: Vec<(FramePair, RgbImage)>,
    pub stats: SelectionStats,
}

impl Selection {
    pub fn file_names(&self) -> Vec<&str> {
        self.frames.iter().map(|id| id.file_name()).collect()
    }

    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            source: self.source.display().to_string(),
            overlap_threshold: self.overlap_threshold,
            frames: self.file_names().into_iter().map(String::from).collect(),
            edges: self
                .graph
                .edges
                .iter()
                .map(|edge| EdgeSummary {
                    source: edge.source.file_name().to_string(),
                    target: edge.target.file_name().to_string(),
                    overlap: edge.overlap,
                })
                .collect(),
            probed_pairs: self.stats.probed_pairs,
            evicted_frames: self.stats.evicted_frames,
            evicted_pairs: self.stats.evicted_pairs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub source: String,
    pub target: String,
    pub overlap: f64,
}

/// JSON 摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub source: String,
    pub overlap_threshold: f64,
    pub frames: Vec<String>,
    pub edges: Vec<EdgeSummary>,
    pub probed_pairs: u64,
    pub evicted_frames: u64,
    pub evicted_pairs: u64,
}

/// Writes the base names of `frames`, one per line, creating parent
/// directories as needed.
pub fn write_frame_list(path: impl AsRef<Path>, frames: &[FrameId]) -> Result<(), SelectError> {
    let path = path.as_ref();
    create_parent(path)?;
    let text: String = frames.iter().map(|id| format!("{}\n", id.file_name())).collect();
    fs::write(path, text)?;
    info!("📝 wrote {} frame names to {}", frames.len(), path.display());
    Ok(())
}

pub fn write_summary(path: impl AsRef<Path>, selection: &Selection) -> Result<(), SelectError> {
    let path = path.as_ref();
    create_parent(path)?;
    let json = serde_json::to_string_pretty(&selection.summary())?;
    fs::write(path, json)?;
    Ok(())
}

/// Opens `source` without decoding anything and copies the original bytes
/// of each frame into `dst_dir` under its base name.
pub fn export_frames(
    source: impl AsRef<Path>,
    config: &SelectionConfig,
    frames: &[FrameId],
    dst_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, SelectError> {
    let mut source = ImageSource::open(source, config)?;
    let dst_dir = dst_dir.as_ref();
    let written = frames
        .iter()
        .map(|id| source.export(id, dst_dir))
        .collect::<Result<Vec<_>, _>>()?;
    info!("📦 exported {} frames to {}", written.len(), dst_dir.display());
    Ok(written)
}

fn create_parent(path: &Path) -> Result<(), SelectError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

//! 选帧配置

use super::error::SelectError;
use super::source::ColorMode;
use super::vision::{DetectorConfig, RansacConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.9;
pub const DEFAULT_ARCHIVE_MEMBER_PATTERN: &str = r"frame_.*\.jpg";

/// Selection run configuration.
///
/// Every field has a default, so a JSON5 document only needs to name the
/// values it overrides:
///
/// ```ignore
/// let config = SelectionConfig::from_json5("{ overlap_threshold: 0.8, downscale_factor: 2 }")?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// 低于该重叠率时切出新关键帧
    pub overlap_threshold: f64,
    pub frame_range_min: usize,
    /// 不含上界；`None` 表示到序列末尾
    pub frame_range_max: Option<usize>,
    pub downscale_factor: u32,
    pub color_mode: ColorMode,
    pub evict_on_cut: bool,
    pub debug: bool,
    pub frame_extensions: Vec<String>,
    pub archive_member_pattern: String,
    pub detector: DetectorConfig,
    pub ransac: RansacConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            frame_range_min: 0,
            frame_range_max: None,
            downscale_factor: 1,
            color_mode: ColorMode::Grayscale,
            evict_on_cut: true,
            debug: false,
            frame_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            archive_member_pattern: DEFAULT_ARCHIVE_MEMBER_PATTERN.to_string(),
            detector: DetectorConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl SelectionConfig {
    pub fn from_json5(text: &str) -> Result<Self, SelectError> {
        let config: SelectionConfig = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SelectError> {
        let text = fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            overlap_threshold: threshold,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SelectError> {
        if !(self.overlap_threshold > 0.0 && self.overlap_threshold <= 1.0) {
            return Err(SelectError::InvalidConfig(format!(
                "overlap_threshold must be in (0, 1], got {}",
                self.overlap_threshold
            )));
        }
        if self.downscale_factor == 0 {
            return Err(SelectError::InvalidConfig(
                "downscale_factor must be a positive integer".to_string(),
            ));
        }
        if let Some(max) = self.frame_range_max {
            if max <= self.frame_range_min {
                return Err(SelectError::InvalidConfig(format!(
                    "frame range [{}, {}) is empty",
                    self.frame_range_min, max
                )));
            }
        }
        if self.frame_extensions.is_empty() {
            return Err(SelectError::InvalidConfig(
                "frame_extensions must not be empty".to_string(),
            ));
        }
        self.detector.validate()?;
        self.ransac.validate()?;
        Regex::new(&self.archive_member_pattern)?;
        Ok(())
    }

    /// Resolves the configured range against a sequence of `len` frames.
    pub fn frame_range(&self, len: usize) -> Result<(usize, usize), SelectError> {
        let end = self.frame_range_max.map_or(len, |max| max.min(len));
        if self.frame_range_min >= end {
            return Err(SelectError::InvalidConfig(format!(
                "frame range [{}, {}) is empty for a sequence of {} frames",
                self.frame_range_min, end, len
            )));
        }
        Ok((self.frame_range_min, end))
    }
}

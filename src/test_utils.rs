//! Synthetic frame sequences for tests.
//!
//! Frame `n` is a flat PNG whose gray value is `10 * n`. `GridDetector` reads
//! that value back and reports the points of a fixed world grid as seen by a
//! camera that moved `n * dx` pixels to the right, so pairwise homographies
//! are exact translations and overlaps are known in closed form.
//!
//! `write_textured_frames` renders real pixels instead, for running the
//! default detector end to end.

use crate::core::config::SelectionConfig;
use crate::core::source::ImageSource;
use crate::core::vision::{FeatureDetector, FeatureSet, Keypoint};
use image::{GrayImage, Luma};
use std::fs::File;
use std::path::{Path, PathBuf};

const GRID_STEP: f32 = 20.0;
const GRID_ORIGIN: f32 = 10.0;

pub(crate) fn write_frames(dir: &Path, frames: usize, width: u32, height: u32) {
    for n in 0..frames {
        GrayImage::from_pixel(width, height, Luma([(n * 10) as u8]))
            .save(dir.join(format!("frame_{n:04}.png")))
            .unwrap();
    }
}

/// Crops of one blocky world texture, frame `n` shifted `n * dx` pixels right.
pub(crate) fn write_textured_frames(dir: &Path, frames: usize, width: u32, height: u32, dx: u32) {
    const BLOCK: u32 = 6;
    for n in 0..frames {
        let shift = n as u32 * dx;
        GrayImage::from_fn(width, height, |x, y| Luma([texel((x + shift) / BLOCK, y / BLOCK)]))
            .save(dir.join(format!("frame_{n:04}.png")))
            .unwrap();
    }
}

fn texel(bx: u32, by: u32) -> u8 {
    let mut h = bx.wrapping_mul(73_856_093) ^ by.wrapping_mul(19_349_663);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h & 0xff) as u8
}

/// Writes a `.tar` holding `members` in the given order.
pub(crate) fn write_tar(dir: &Path, members: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("P01_01.tar");
    let mut builder = tar::Builder::new(File::create(&path).unwrap());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.finish().unwrap();
    path
}

pub(crate) fn synthetic_source(frames: usize, width: u32, height: u32) -> (tempfile::TempDir, ImageSource) {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), frames, width, height);
    let source = ImageSource::open(dir.path(), &SelectionConfig::default()).unwrap();
    (dir, source)
}

pub(crate) struct GridDetector {
    dx: f32,
    columns: usize,
    limit: Option<usize>,
}

impl GridDetector {
    pub(crate) fn new(dx: f32) -> Self {
        Self {
            dx,
            columns: 40,
            limit: None,
        }
    }

    pub(crate) fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    pub(crate) fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl FeatureDetector for GridDetector {
    fn detect(&self, image: &GrayImage) -> FeatureSet {
        let n = (image.get_pixel(0, 0)[0] / 10) as f32;
        let shift = n * self.dx;
        let (w, h) = (image.width() as f32, image.height() as f32);

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        let rows = ((h - GRID_ORIGIN) / GRID_STEP).ceil().max(0.0) as usize;
        for r in 0..rows {
            for c in 0..self.columns {
                let x = GRID_ORIGIN + c as f32 * GRID_STEP - shift;
                let y = GRID_ORIGIN + r as f32 * GRID_STEP;
                if x < 0.0 || x > w - 1.0 {
                    continue;
                }
                keypoints.push(Keypoint::new(x, y));
                descriptors.push(vec![(r * self.columns + c) as f32]);
            }
        }

        if let Some(limit) = self.limit {
            keypoints.truncate(limit);
            descriptors.truncate(limit);
        }
        FeatureSet::new(keypoints, descriptors)
    }
}

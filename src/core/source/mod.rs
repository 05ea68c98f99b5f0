//! 帧来源：目录或 tar 归档
//!
//! `ImageSource` resolves the ordered frame list once at open time and decodes
//! individual frames on demand. Two stores back it: one file per frame in a
//! directory, or named members of a `.tar` archive read by random access.

pub mod archive;
pub mod directory;

pub use archive::ArchiveStore;
pub use directory::DirectoryStore;

use super::config::SelectionConfig;
use super::error::SelectError;
use image::imageops::FilterType;
use image::DynamicImage;
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifier of one frame: a file path or an archive member name.
///
/// Ordering is plain string ordering and defines the sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(Arc<str>);

impl FrameId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base file name, used when exporting and when writing frame lists.
    pub fn file_name(&self) -> &str {
        Path::new(self.as_str())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.as_str())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Grayscale,
    Color,
}

/// Raw access to the encoded frames of one source.
pub trait FrameStore: Send {
    /// Frame ids in sequence order.
    fn frame_ids(&self) -> &[FrameId];

    fn read_encoded(&mut self, id: &FrameId) -> Result<Vec<u8>, SelectError>;

    /// Writes the original bytes of `id` into `dst_dir` under its base name.
    fn export(&mut self, id: &FrameId, dst_dir: &Path) -> Result<PathBuf, SelectError>;
}

pub struct ImageSource {
    root: PathBuf,
    store: Box<dyn FrameStore>,
    downscale: u32,
}

impl ImageSource {
    /// Opens `path` as a frame directory or a `.tar` archive.
    pub fn open(path: impl AsRef<Path>, config: &SelectionConfig) -> Result<Self, SelectError> {
        let path = path.as_ref();
        let store: Box<dyn FrameStore> = if path.is_dir() {
            Box::new(DirectoryStore::open(path, &config.frame_extensions)?)
        } else if path.is_file() && is_tar(path) {
            let pattern = Regex::new(&config.archive_member_pattern)?;
            Box::new(ArchiveStore::open(path, &pattern)?)
        } else {
            return Err(SelectError::UnsupportedSourceKind(path.to_path_buf()));
        };

        info!(
            "📂 ImageSource: {} frames in {}",
            store.frame_ids().len(),
            path.display()
        );

        Ok(Self::from_store(path, store, config.downscale_factor))
    }

    pub fn from_store(root: impl Into<PathBuf>, store: Box<dyn FrameStore>, downscale: u32) -> Self {
        Self {
            root: root.into(),
            store,
            downscale: downscale.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frame_ids(&self) -> &[FrameId] {
        self.store.frame_ids()
    }

    pub fn len(&self) -> usize {
        self.frame_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_ids().is_empty()
    }

    pub fn downscale(&self) -> u32 {
        self.downscale
    }

    /// Decodes one frame, downscaled by the source factor.
    pub fn read(&mut self, id: &FrameId, mode: ColorMode) -> Result<DynamicImage, SelectError> {
        let bytes = self.store.read_encoded(id)?;
        decode_frame(&bytes, self.downscale, mode)
    }

    pub fn read_encoded(&mut self, id: &FrameId) -> Result<Vec<u8>, SelectError> {
        self.store.read_encoded(id)
    }

    pub fn export(&mut self, id: &FrameId, dst_dir: impl AsRef<Path>) -> Result<PathBuf, SelectError> {
        self.store.export(id, dst_dir.as_ref())
    }
}

fn is_tar(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tar"))
}

fn decode_frame(bytes: &[u8], downscale: u32, mode: ColorMode) -> Result<DynamicImage, SelectError> {
    let mut img = image::load_from_memory(bytes)?;

    if downscale > 1 {
        let width = (img.width() / downscale).max(1);
        let height = (img.height() / downscale).max(1);
        img = img.resize_exact(width, height, FilterType::Triangle);
    }

    Ok(match mode {
        ColorMode::Grayscale => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorMode::Color => DynamicImage::ImageRgb8(img.to_rgb8()),
    })
}

/// Position of `id` in a sorted id list.
pub(crate) fn lookup(ids: &[FrameId], id: &FrameId) -> Result<usize, SelectError> {
    ids.binary_search(id)
        .map_err(|_| SelectError::FrameNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_tar;
    use image::{GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage};
    use std::fs;
    use std::io::Cursor;

    fn write_rgb_frame(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let mut img = RgbImage::new(width, height);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = if x < width / 2 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) };
        }
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_frame_id_file_name() {
        assert_eq!(FrameId::new("/data/P01/frame_0001.jpg").file_name(), "frame_0001.jpg");
        assert_eq!(FrameId::new("./P01/frame_0002.jpg").file_name(), "frame_0002.jpg");
        assert_eq!(FrameId::new("frame_0003.jpg").file_name(), "frame_0003.jpg");
    }

    #[test]
    fn test_frame_id_ordering() {
        let mut ids = vec![
            FrameId::new("frame_0010.jpg"),
            FrameId::new("frame_0002.jpg"),
            FrameId::new("frame_0001.jpg"),
        ];
        ids.sort();
        let names: Vec<_> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, ["frame_0001.jpg", "frame_0002.jpg", "frame_0010.jpg"]);
    }

    #[test]
    fn test_unsupported_source_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("video.mp4");
        fs::write(&file, b"not a frame source").unwrap();

        let config = SelectionConfig::default();
        assert!(matches!(
            ImageSource::open(&file, &config),
            Err(SelectError::UnsupportedSourceKind(_))
        ));
        assert!(matches!(
            ImageSource::open(dir.path().join("missing"), &config),
            Err(SelectError::UnsupportedSourceKind(_))
        ));
    }

    #[test]
    fn test_read_color_keeps_rgb_order() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_frame(dir.path(), "frame_0000.png", 40, 20);

        let mut source = ImageSource::open(dir.path(), &SelectionConfig::default()).unwrap();
        let id = source.frame_ids()[0].clone();
        let img = source.read(&id, ColorMode::Color).unwrap().to_rgb8();

        assert_eq!(img.dimensions(), (40, 20));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(39, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_read_downscaled_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_frame(dir.path(), "frame_0000.png", 40, 20);

        let config = SelectionConfig {
            downscale_factor: 2,
            ..Default::default()
        };
        let mut source = ImageSource::open(dir.path(), &config).unwrap();
        let id = source.frame_ids()[0].clone();
        let img = source.read(&id, ColorMode::Grayscale).unwrap();

        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
        assert_eq!((img.width(), img.height()), (20, 10));
    }

    #[test]
    fn test_downscale_never_collapses_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_frame(dir.path(), "frame_0000.png", 6, 3);

        let config = SelectionConfig {
            downscale_factor: 8,
            ..Default::default()
        };
        let mut source = ImageSource::open(dir.path(), &config).unwrap();
        let id = source.frame_ids()[0].clone();
        let img = source.read(&id, ColorMode::Color).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    fn jpeg(value: u8, width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(95))
            .unwrap();
        bytes
    }

    #[test]
    fn test_read_from_archive() {
        let dir = tempfile::tempdir().unwrap();
        let (dark, light) = (jpeg(40, 32, 16), jpeg(200, 32, 16));
        let path = write_tar(
            dir.path(),
            &[
                ("P01_01/frame_0000000002.jpg", &light[..]),
                ("P01_01/frame_0000000001.jpg", &dark[..]),
                ("P01_01/notes.txt", &b"skip"[..]),
            ],
        );

        let config = SelectionConfig {
            downscale_factor: 2,
            ..Default::default()
        };
        let mut source = ImageSource::open(&path, &config).unwrap();
        assert_eq!(source.len(), 2);
        let ids = source.frame_ids().to_vec();

        let second = source.read(&ids[1], ColorMode::Grayscale).unwrap().to_luma8();
        assert_eq!(second.dimensions(), (16, 8));
        assert!(second.pixels().all(|p| p[0].abs_diff(200) <= 3));

        let first = source.read(&ids[0], ColorMode::Color).unwrap().to_rgb8();
        assert!(first.pixels().all(|p| p[0].abs_diff(40) <= 3));
        assert_eq!(source.read_encoded(&ids[0]).unwrap(), dark);
    }

    #[test]
    fn test_unknown_frame_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_rgb_frame(dir.path(), "frame_0000.png", 8, 8);

        let mut source = ImageSource::open(dir.path(), &SelectionConfig::default()).unwrap();
        let missing = FrameId::new("frame_9999.png");
        assert!(matches!(
            source.read(&missing, ColorMode::Grayscale),
            Err(SelectError::FrameNotFound(_))
        ));
    }
}

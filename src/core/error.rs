use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Unsupported source kind: {0} (expected a frame directory or a .tar archive)")]
    UnsupportedSourceKind(PathBuf),
    #[error("Frame not found: {0}")]
    FrameNotFound(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] json5::Error),
    #[error("Invalid archive member pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

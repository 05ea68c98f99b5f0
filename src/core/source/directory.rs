use super::{lookup, FrameId, FrameStore};
use crate::core::error::SelectError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// 目录帧源：每帧一个文件
pub struct DirectoryStore {
    root: PathBuf,
    ids: Vec<FrameId>,
}

impl DirectoryStore {
    /// Lists the files of `root` whose extension is in `extensions`
    /// (case-insensitive), sorted by full path.
    pub fn open(root: &Path, extensions: &[String]) -> Result<Self, SelectError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_file() || !has_extension(&path, extensions) {
                continue;
            }
            ids.push(FrameId::new(path.to_string_lossy().into_owned()));
        }
        ids.sort();

        debug!("DirectoryStore: {} frames under {}", ids.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            ids,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FrameStore for DirectoryStore {
    fn frame_ids(&self) -> &[FrameId] {
        &self.ids
    }

    fn read_encoded(&mut self, id: &FrameId) -> Result<Vec<u8>, SelectError> {
        lookup(&self.ids, id)?;
        Ok(fs::read(id.as_str())?)
    }

    fn export(&mut self, id: &FrameId, dst_dir: &Path) -> Result<PathBuf, SelectError> {
        lookup(&self.ids, id)?;
        fs::create_dir_all(dst_dir)?;
        let dst = dst_dir.join(id.file_name());
        fs::copy(id.as_str(), &dst)?;
        Ok(dst)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

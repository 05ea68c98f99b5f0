use super::{lookup, FrameId, FrameStore};
use crate::core::error::SelectError;
use log::debug;
use regex::Regex;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
struct MemberSpan {
    offset: u64,
    size: u64,
}

/// tar 归档帧源
///
/// Member offsets are indexed once at open time; a frame read seeks straight
/// to the member data, so nothing is extracted to disk.
pub struct ArchiveStore {
    path: PathBuf,
    file: File,
    ids: Vec<FrameId>,
    // parallel to `ids`
    spans: Vec<MemberSpan>,
}

impl ArchiveStore {
    pub fn open(path: &Path, member_pattern: &Regex) -> Result<Self, SelectError> {
        let mut members = Vec::new();
        let mut archive = tar::Archive::new(File::open(path)?);

        for entry in archive.entries()? {
            let entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path()?.to_string_lossy().into_owned();
            if !member_pattern.is_match(&name) {
                continue;
            }
            let span = MemberSpan {
                offset: entry.raw_file_position(),
                size: entry.size(),
            };
            members.push((FrameId::new(name), span));
        }
        // 同名成员以归档中最后一份为准
        members.reverse();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members.dedup_by(|dup, kept| dup.0 == kept.0);

        debug!(
            "ArchiveStore: {} matching members in {}",
            members.len(),
            path.display()
        );

        let (ids, spans) = members.into_iter().unzip();
        Ok(Self {
            path: path.to_path_buf(),
            file: File::open(path)?,
            ids,
            spans,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameStore for ArchiveStore {
    fn frame_ids(&self) -> &[FrameId] {
        &self.ids
    }

    fn read_encoded(&mut self, id: &FrameId) -> Result<Vec<u8>, SelectError> {
        let span = self.spans[lookup(&self.ids, id)?];
        let mut buf = vec![0u8; span.size as usize];
        self.file.seek(SeekFrom::Start(span.offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn export(&mut self, id: &FrameId, dst_dir: &Path) -> Result<PathBuf, SelectError> {
        let bytes = self.read_encoded(id)?;
        fs::create_dir_all(dst_dir)?;
        let dst = dst_dir.join(id.file_name());
        fs::write(&dst, bytes)?;
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_ARCHIVE_MEMBER_PATTERN;
    use crate::test_utils::write_tar;

    fn default_pattern() -> Regex {
        Regex::new(DEFAULT_ARCHIVE_MEMBER_PATTERN).unwrap()
    }

    #[test]
    fn test_indexes_matching_members_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tar(
            dir.path(),
            &[
                ("P01_01/frame_0000000002.jpg", &b"second"[..]),
                ("P01_01/frame_0000000001.jpg", &b"first"[..]),
                ("P01_01/readme.txt", &b"skip"[..]),
                ("P01_01/thumb_0001.jpg", &b"skip"[..]),
            ],
        );

        let store = ArchiveStore::open(&path, &default_pattern()).unwrap();
        let names: Vec<_> = store.frame_ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(
            names,
            ["P01_01/frame_0000000001.jpg", "P01_01/frame_0000000002.jpg"]
        );
    }

    #[test]
    fn test_random_access_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tar(
            dir.path(),
            &[
                ("frame_0001.jpg", &b"aaaa"[..]),
                ("frame_0002.jpg", &[7u8; 50][..]),
                ("frame_0003.jpg", &b"cc"[..]),
            ],
        );

        let mut store = ArchiveStore::open(&path, &default_pattern()).unwrap();
        let ids = store.frame_ids().to_vec();

        assert_eq!(store.read_encoded(&ids[2]).unwrap(), b"cc");
        assert_eq!(store.read_encoded(&ids[0]).unwrap(), b"aaaa");
        assert_eq!(store.read_encoded(&ids[1]).unwrap(), vec![7u8; 50]);
    }

    #[test]
    fn test_export_writes_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tar(dir.path(), &[("P01_01/frame_0042.jpg", &b"jpeg"[..])]);

        let mut store = ArchiveStore::open(&path, &default_pattern()).unwrap();
        let id = store.frame_ids()[0].clone();
        let out = dir.path().join("out");
        let written = store.export(&id, &out).unwrap();

        assert_eq!(written, out.join("frame_0042.jpg"));
        assert_eq!(fs::read(written).unwrap(), b"jpeg");
    }

    #[test]
    fn test_duplicate_member_keeps_last_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tar(
            dir.path(),
            &[
                ("frame_0001.jpg", &b"old"[..]),
                ("frame_0002.jpg", &b"other"[..]),
                ("frame_0001.jpg", &b"new"[..]),
            ],
        );

        let mut store = ArchiveStore::open(&path, &default_pattern()).unwrap();
        let ids = store.frame_ids().to_vec();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.read_encoded(&ids[0]).unwrap(), b"new");
        assert_eq!(store.read_encoded(&ids[1]).unwrap(), b"other");
    }

    #[test]
    fn test_unknown_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tar(dir.path(), &[("frame_0001.jpg", &b"a"[..])]);

        let mut store = ArchiveStore::open(&path, &default_pattern()).unwrap();
        assert!(matches!(
            store.read_encoded(&FrameId::new("frame_0002.jpg")),
            Err(SelectError::FrameNotFound(_))
        ));
    }
}

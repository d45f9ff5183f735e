//! Tar+gzip payload packing and unpacking.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One top-level entry of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    /// Path on disk.
    pub source: PathBuf,
    /// Path inside the archive.
    pub name: String,
}

impl PayloadEntry {
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }
}

/// Lists every top-level file and directory of `dir` as payload entries,
/// sorted by name. Names in `skip` are left out.
pub fn entries_of_dir(dir: &Path, skip: &[&str]) -> io::Result<Vec<PayloadEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if skip.contains(&name.as_str()) {
            continue;
        }
        entries.push(PayloadEntry::new(entry.path(), name));
    }
    entries.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(entries)
}

/// Packs entries into an anonymous temp file. Returns the rewound file and
/// its length.
pub fn pack_to_tempfile(entries: &[PayloadEntry]) -> io::Result<(File, u64)> {
    let file = tempfile::tempfile()?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    for entry in entries {
        if entry.source.is_dir() {
            builder.append_dir_all(&entry.name, &entry.source)?;
        } else {
            builder.append_path_with_name(&entry.source, &entry.name)?;
        }
    }
    let mut file = builder.into_inner()?.finish()?;
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok((file, len))
}

/// Unpacks a tar+gzip stream into `destination`, which must exist.
pub fn unpack<R: Read>(reader: R, destination: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    archive.unpack(destination)
}

//! Whole-file archive operations.
//!
//! # Responsibility
//! - Weave a basket source directory into a `.baskets` file.
//! - Unweave a `.baskets` file into a directory.
//! - Inspect an archive header without extracting anything.
//!
//! # Invariants
//! - Destination and version checks happen before any byte is written.
//! - A failed extraction removes the destination directory.
//! - Archives are written through a temp file next to the destination.

use super::header::{write_container, BlockInfo, CompatLists, ContainerHeader, ContainerReader};
use super::payload::{entries_of_dir, pack_to_tempfile, unpack};
use super::preview::{placeholder_preview, preview_from_file};
use super::version::{check_compatibility, Compatibility, CURRENT_ARCHIVE_VERSION};
use super::{ArchiveError, IoErrorCode};
use std::fs;
use std::io::{BufRead, Seek, Write};
use std::path::{Path, PathBuf};

/// File name of the preview kept next to extracted content.
pub const PREVIEW_FILE_NAME: &str = "preview.png";

/// Knobs for [`extract_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Refuse to replace an existing destination.
    pub protect_destination: bool,
    /// Write the preview block as `preview.png` in the destination.
    pub keep_preview: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            protect_destination: true,
            keep_preview: true,
        }
    }
}

/// Successful extraction result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub destination: PathBuf,
    pub version: Option<String>,
    /// `PossiblyCompatibleBasketVersion` when saving back may lose data.
    pub warning: Option<IoErrorCode>,
    /// Path of the kept preview, if any.
    pub preview: Option<PathBuf>,
}

/// Header facts of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub version: Option<String>,
    pub compat: CompatLists,
    pub blocks: Vec<BlockInfo>,
    pub compatibility: Compatibility,
}

/// Packs a basket source directory into an archive at `destination`.
///
/// Every top-level entry of `source` except `preview.png` goes into the
/// payload. `preview` is fitted to 256x256; a missing or undecodable preview
/// is replaced by a placeholder.
pub fn create_archive_from_source(
    source: &Path,
    preview: Option<&Path>,
    destination: &Path,
    protect_destination: bool,
) -> Result<(), ArchiveError> {
    log::info!(
        "event=archive_weave module=archive status=start source={} destination={}",
        source.display(),
        destination.display()
    );
    let result = weave(source, preview, destination, protect_destination);
    match &result {
        Ok(()) => log::info!("event=archive_weave module=archive status=ok"),
        Err(err) => log::error!(
            "event=archive_weave module=archive status=error error_code={}",
            err.code().as_str()
        ),
    }
    result
}

fn weave(
    source: &Path,
    preview: Option<&Path>,
    destination: &Path,
    protect_destination: bool,
) -> Result<(), ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::resource(
            source,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source is not a directory"),
        ));
    }
    if protect_destination && destination.exists() {
        return Err(ArchiveError::DestinationExists(destination.to_path_buf()));
    }

    let entries = entries_of_dir(source, &[PREVIEW_FILE_NAME])
        .map_err(|err| ArchiveError::resource(source, err))?;
    let (payload, payload_len) =
        pack_to_tempfile(&entries).map_err(|err| ArchiveError::resource(source, err))?;
    let preview_bytes = preview_bytes(preview, None)?;

    write_archive_file(
        destination,
        protect_destination,
        None,
        &preview_bytes,
        payload,
        payload_len,
    )
}

/// Preview bytes for an archive: the fitted image, or a placeholder.
pub(crate) fn preview_bytes(
    preview: Option<&Path>,
    placeholder_color: Option<&str>,
) -> Result<Vec<u8>, ArchiveError> {
    if let Some(path) = preview {
        match preview_from_file(path) {
            Ok(bytes) => return Ok(bytes),
            Err(err) => log::warn!(
                "event=archive_preview module=archive status=warn reason=undecodable path={} error={}",
                path.display(),
                err
            ),
        }
    }
    placeholder_preview(placeholder_color).map_err(|err| {
        ArchiveError::resource(
            PREVIEW_FILE_NAME,
            std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Writes a container to `destination` through a sibling temp file.
pub(crate) fn write_archive_file(
    destination: &Path,
    protect_destination: bool,
    compat: Option<&CompatLists>,
    preview: &[u8],
    mut payload: fs::File,
    payload_len: u64,
) -> Result<(), ArchiveError> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|err| ArchiveError::resource(destination, err))?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file_mut());
        write_container(
            &mut writer,
            CURRENT_ARCHIVE_VERSION,
            compat,
            preview,
            &mut payload,
            payload_len,
        )
        .map_err(|err| ArchiveError::resource(destination, err))?;
        writer
            .flush()
            .map_err(|err| ArchiveError::resource(destination, err))?;
    }
    let persisted = if protect_destination {
        temp.persist_noclobber(destination)
    } else {
        temp.persist(destination)
    };
    persisted.map_err(|err| {
        if err.error.kind() == std::io::ErrorKind::AlreadyExists {
            ArchiveError::DestinationExists(destination.to_path_buf())
        } else {
            ArchiveError::resource(destination, err.error)
        }
    })?;
    Ok(())
}

/// Extracts an archive into `destination`.
///
/// The header is scanned and the version gate applied before the
/// destination is touched. `PossiblyCompatibleBasketVersion` is reported
/// through [`ExtractOutcome::warning`].
pub fn extract_archive(
    path: &Path,
    destination: &Path,
    options: ExtractOptions,
) -> Result<ExtractOutcome, ArchiveError> {
    log::info!(
        "event=archive_extract module=archive status=start path={} destination={}",
        path.display(),
        destination.display()
    );
    let result = unweave(path, destination, options);
    match &result {
        Ok(outcome) => log::info!(
            "event=archive_extract module=archive status=ok version={} warning={}",
            outcome.version.as_deref().unwrap_or("none"),
            outcome.warning.map(|code| code.as_str()).unwrap_or("none")
        ),
        Err(err) => log::error!(
            "event=archive_extract module=archive status=error error_code={}",
            err.code().as_str()
        ),
    }
    result
}

fn unweave(
    path: &Path,
    destination: &Path,
    options: ExtractOptions,
) -> Result<ExtractOutcome, ArchiveError> {
    if options.protect_destination && destination.exists() {
        return Err(ArchiveError::DestinationExists(destination.to_path_buf()));
    }

    let mut reader = ContainerReader::open(path)?;
    let header = reader.scan()?;
    let warning = gate(&header)?;

    if destination.exists() {
        fs::remove_dir_all(destination).map_err(|err| ArchiveError::resource(destination, err))?;
    }
    fs::create_dir_all(destination).map_err(|err| ArchiveError::resource(destination, err))?;

    match fill_destination(&mut reader, &header, destination, options.keep_preview) {
        Ok(preview) => Ok(ExtractOutcome {
            destination: destination.to_path_buf(),
            version: header.version.clone(),
            warning,
            preview,
        }),
        Err(err) => {
            if let Err(cleanup) = fs::remove_dir_all(destination) {
                log::warn!(
                    "event=archive_cleanup module=archive status=error path={} error={}",
                    destination.display(),
                    cleanup
                );
            }
            Err(err)
        }
    }
}

/// Applies the version gate. `Ok(Some(..))` carries the warning code.
pub(crate) fn gate(header: &ContainerHeader) -> Result<Option<IoErrorCode>, ArchiveError> {
    match check_compatibility(
        header.version.as_deref(),
        &header.compat.read_compatible,
        &header.compat.write_compatible,
    ) {
        Compatibility::Compatible => Ok(None),
        Compatibility::PossiblyCompatible => {
            log::warn!(
                "event=archive_version module=archive status=warn version={} error_code={}",
                header.version.as_deref().unwrap_or("none"),
                IoErrorCode::PossiblyCompatibleBasketVersion.as_str()
            );
            Ok(Some(IoErrorCode::PossiblyCompatibleBasketVersion))
        }
        Compatibility::Incompatible => Err(ArchiveError::IncompatibleVersion {
            version: header.version.clone().unwrap_or_default(),
        }),
    }
}

/// Writes the preview (optionally) and unpacks the payload into `destination`.
pub(crate) fn fill_destination<R: BufRead + Seek>(
    reader: &mut ContainerReader<R>,
    header: &ContainerHeader,
    destination: &Path,
    keep_preview: bool,
) -> Result<Option<PathBuf>, ArchiveError> {
    let mut kept = None;
    if keep_preview {
        if let Some(block) = header.preview() {
            let bytes = reader.read_block(block)?;
            let target = destination.join(PREVIEW_FILE_NAME);
            fs::write(&target, bytes).map_err(|err| ArchiveError::resource(&target, err))?;
            kept = Some(target);
        }
    }
    let payload = header
        .payload()
        .ok_or_else(|| ArchiveError::corrupted("no archive block"))?;
    let block = reader.block_reader(payload)?;
    unpack(block, destination)
        .map_err(|err| ArchiveError::corrupted(format!("payload unreadable: {err}")))?;
    Ok(kept)
}

/// Scans an archive header without extracting anything.
pub fn inspect_archive(path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let mut reader = ContainerReader::open(path)?;
    let header = reader.scan()?;
    let compatibility = check_compatibility(
        header.version.as_deref(),
        &header.compat.read_compatible,
        &header.compat.write_compatible,
    );
    Ok(ArchiveSummary {
        version: header.version,
        compat: header.compat,
        blocks: header.blocks,
        compatibility,
    })
}

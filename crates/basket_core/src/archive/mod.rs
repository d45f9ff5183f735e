//! `.baskets` archive container codec.
//!
//! # Responsibility
//! - Read and write the length-prefixed container: a magic line, `key:value`
//!   header lines, a preview PNG block and a tar+gzip payload block.
//! - Gate extraction on the archive version before touching the disk.
//! - Map every failure to one [`IoErrorCode`].
//!
//! # Invariants
//! - A declared block size never exceeds the bytes left in the file.
//! - Failed extractions leave no destination directory behind.
//!
//! # See also
//! - `crate::service::archive_service` for basket import/export.

pub mod codec;
pub mod header;
pub mod payload;
pub mod preview;
pub mod source;
pub mod version;

pub use codec::{
    create_archive_from_source, extract_archive, inspect_archive, ArchiveSummary,
    ExtractOptions, ExtractOutcome,
};
pub use version::{check_compatibility, Compatibility, CURRENT_ARCHIVE_VERSION};

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Outcome taxonomy of archive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoErrorCode {
    NoError,
    NotABasketArchive,
    CorruptedBasketArchive,
    DestinationExists,
    IncompatibleBasketVersion,
    PossiblyCompatibleBasketVersion,
    FailedToOpenResource,
}

impl IoErrorCode {
    /// Stable snake_case code for log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "no_error",
            Self::NotABasketArchive => "not_a_basket_archive",
            Self::CorruptedBasketArchive => "corrupted_basket_archive",
            Self::DestinationExists => "destination_exists",
            Self::IncompatibleBasketVersion => "incompatible_basket_version",
            Self::PossiblyCompatibleBasketVersion => "possibly_compatible_basket_version",
            Self::FailedToOpenResource => "failed_to_open_resource",
        }
    }

    /// Human-readable message shown to users.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoError => "No error.",
            Self::NotABasketArchive => "This file is not a basket archive.",
            Self::CorruptedBasketArchive => "This file is corrupted. It can not be opened.",
            Self::DestinationExists => "The destination path already exists.",
            Self::IncompatibleBasketVersion => "This file supplied file format is not supported",
            Self::PossiblyCompatibleBasketVersion => {
                "This file was created with a more recent version of BasKet Note Pads. \
                 It might not be fully supported"
            }
            Self::FailedToOpenResource => "Failed to open a file resource.",
        }
    }

    /// Whether the code is a warning that lets the operation proceed.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::PossiblyCompatibleBasketVersion)
    }
}

impl Display for IoErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors from archive read/write operations.
#[derive(Debug)]
pub enum ArchiveError {
    /// A file or directory could not be opened, created or written.
    FailedToOpenResource {
        path: PathBuf,
        source: std::io::Error,
    },
    /// First line is not the archive magic.
    NotABasketArchive,
    /// Header or payload is damaged.
    Corrupted { reason: String },
    /// Destination exists and overwriting was not allowed.
    DestinationExists(PathBuf),
    /// Archive was written by a newer, incompatible version.
    IncompatibleVersion { version: String },
}

impl ArchiveError {
    pub fn code(&self) -> IoErrorCode {
        match self {
            Self::FailedToOpenResource { .. } => IoErrorCode::FailedToOpenResource,
            Self::NotABasketArchive => IoErrorCode::NotABasketArchive,
            Self::Corrupted { .. } => IoErrorCode::CorruptedBasketArchive,
            Self::DestinationExists(_) => IoErrorCode::DestinationExists,
            Self::IncompatibleVersion { .. } => IoErrorCode::IncompatibleBasketVersion,
        }
    }

    pub(crate) fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FailedToOpenResource {
            path: path.into(),
            source,
        }
    }
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailedToOpenResource { path, source } => {
                write!(f, "{} ({}: {source})", self.code(), path.display())
            }
            Self::Corrupted { reason } => write!(f, "{} ({reason})", self.code()),
            Self::DestinationExists(path) => write!(f, "{} ({})", self.code(), path.display()),
            Self::IncompatibleVersion { version } => {
                write!(f, "{} (version {version})", self.code())
            }
            Self::NotABasketArchive => write!(f, "{}", self.code()),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FailedToOpenResource { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchiveError, IoErrorCode};

    #[test]
    fn every_error_maps_to_one_code_and_message() {
        let err = ArchiveError::corrupted("block runs past end of file");
        assert_eq!(err.code(), IoErrorCode::CorruptedBasketArchive);
        assert_eq!(err.code().as_str(), "corrupted_basket_archive");
        assert!(err.to_string().starts_with("This file is corrupted."));
        assert!(IoErrorCode::PossiblyCompatibleBasketVersion.is_warning());
        assert!(!IoErrorCode::IncompatibleBasketVersion.is_warning());
    }
}

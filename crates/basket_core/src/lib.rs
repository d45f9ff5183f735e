//! Core domain logic for BasKet note pads.
//! This crate owns the basket/note model, its XML files and the `.baskets`
//! archive format.

pub mod archive;
pub mod context;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod xml;

pub use archive::{
    create_archive_from_source, extract_archive, inspect_archive, ArchiveError, ArchiveSummary,
    Compatibility, ExtractOptions, ExtractOutcome, IoErrorCode, CURRENT_ARCHIVE_VERSION,
};
pub use context::AppContext;
pub use logging::{default_log_level, init_logging, LogSpec, LogTarget, LoggingError};
pub use model::basket::{Basket, BasketNode, BasketProperties, BasketTree, Disposition};
pub use model::note::{Note, NoteContent, NoteId, NoteKind, NoteTree, NoteTreeError};
pub use model::tag::{State, Tag};
pub use repo::basket_repo::{BasketRepository, FsBasketRepository, StoreError, StoreResult};
pub use service::archive_service::{ArchiveService, ArchiveServiceError, ImportReport};
pub use service::tag_service::{TagRemoval, TagService, TagServiceError};
pub use service::tree_service::{TreeService, TreeServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, CURRENT_ARCHIVE_VERSION};

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
        assert!(!CURRENT_ARCHIVE_VERSION.is_empty());
    }
}

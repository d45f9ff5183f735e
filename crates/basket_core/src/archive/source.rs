//! Basket source directory validation.
//!
//! A source directory is what an extracted archive looks like:
//! `baskets/baskets.xml` with a `basketTree` root whose top-level `basket`
//! elements each name an existing folder under `baskets/`.

use crate::xml::document::read_document;
use crate::xml::tree_index::{normalize_folder_name, TREE_ROOT};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Why a directory is not a usable basket source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceProblem {
    NotADirectory(PathBuf),
    MissingTreeIndex(PathBuf),
    UnreadableTreeIndex(String),
    MissingFolderName,
    MissingBasketFolder(String),
}

impl Display for SourceProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADirectory(path) => write!(f, "not a directory: {}", path.display()),
            Self::MissingTreeIndex(path) => write!(f, "missing tree index: {}", path.display()),
            Self::UnreadableTreeIndex(reason) => write!(f, "unreadable tree index: {reason}"),
            Self::MissingFolderName => write!(f, "a basket entry has no folderName"),
            Self::MissingBasketFolder(name) => write!(f, "basket folder not found: {name}"),
        }
    }
}

impl Error for SourceProblem {}

/// Checks that `dir` is a well-formed basket source.
pub fn validate_source(dir: &Path) -> Result<(), SourceProblem> {
    if !dir.is_dir() {
        return Err(SourceProblem::NotADirectory(dir.to_path_buf()));
    }
    let baskets_dir = dir.join("baskets");
    let index = baskets_dir.join("baskets.xml");
    if !index.is_file() {
        return Err(SourceProblem::MissingTreeIndex(index));
    }
    let root = read_document(&index, TREE_ROOT)
        .map_err(|err| SourceProblem::UnreadableTreeIndex(err.to_string()))?;
    for basket in root.children_named("basket") {
        let folder = normalize_folder_name(&basket.attr_or("folderName", ""));
        if folder.is_empty() {
            return Err(SourceProblem::MissingFolderName);
        }
        if !baskets_dir.join(&folder).is_dir() {
            return Err(SourceProblem::MissingBasketFolder(folder));
        }
    }
    Ok(())
}

/// Boolean form of [`validate_source`].
pub fn is_basket_source_valid(dir: &Path) -> bool {
    validate_source(dir).is_ok()
}

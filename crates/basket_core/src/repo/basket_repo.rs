//! Basket repository contract and filesystem implementation.
//!
//! # Responsibility
//! - Persist the basket tree index and per-basket descriptors under one
//!   store root.
//! - Allocate fresh, collision-free basket folder names.
//!
//! # Invariants
//! - Every write of an XML file goes through temp file + rename.
//! - A folder name returned by `new_folder_name` is reserved on disk.
//!
//! # See also
//! - `crate::xml` for the document formats.

use super::files::FOLDER_NAME_RE;
use crate::model::basket::{Basket, BasketProperties, BasketTree};
use crate::xml::basket_file::{load_basket_file, save_basket_file};
use crate::xml::tree_index::{load_tree_file, save_tree_file};
use crate::xml::XmlError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of a basket descriptor inside its folder.
pub const BASKET_FILE_NAME: &str = ".basket";
/// Tree index file name inside `baskets/`.
pub const TREE_FILE_NAME: &str = "baskets.xml";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the filesystem store.
#[derive(Debug)]
pub enum StoreError {
    Xml(XmlError),
    Io { path: PathBuf, source: io::Error },
    BasketNotFound(String),
    InvalidFolderName(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "store io error at {}: {source}", path.display()),
            Self::BasketNotFound(folder) => write!(f, "basket not found: {folder}"),
            Self::InvalidFolderName(folder) => write!(f, "invalid basket folder name: {folder}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::BasketNotFound(_) | Self::InvalidFolderName(_) => None,
        }
    }
}

impl From<XmlError> for StoreError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Repository interface for basket persistence.
pub trait BasketRepository {
    /// Store root holding `baskets/`, `tags.xml` and resource folders.
    fn root(&self) -> &Path;
    fn load_tree(&self) -> StoreResult<BasketTree>;
    fn save_tree(&self, tree: &BasketTree) -> StoreResult<()>;
    fn load_basket(&self, folder: &str) -> StoreResult<Basket>;
    fn save_basket(&self, folder: &str, basket: &Basket) -> StoreResult<()>;
    /// Allocates and reserves a `basket<N>-<suffix>` folder.
    fn new_folder_name(&self) -> StoreResult<String>;
    fn remove_basket_folder(&self, folder: &str) -> StoreResult<()>;
    fn basket_path(&self, folder: &str) -> PathBuf;

    fn tags_path(&self) -> PathBuf {
        self.root().join("tags.xml")
    }

    fn tag_emblems_dir(&self) -> PathBuf {
        self.root().join("tag-emblems")
    }

    fn basket_icons_dir(&self) -> PathBuf {
        self.root().join("basket-icons")
    }

    fn backgrounds_dir(&self) -> PathBuf {
        self.root().join("backgrounds")
    }
}

/// Filesystem-backed basket repository.
#[derive(Debug, Clone)]
pub struct FsBasketRepository {
    root: PathBuf,
}

impl FsBasketRepository {
    /// Opens a store root, creating `baskets/` when missing.
    pub fn try_new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let baskets = root.join("baskets");
        fs::create_dir_all(&baskets).map_err(|err| StoreError::io(&baskets, err))?;
        Ok(Self { root })
    }

    pub fn baskets_dir(&self) -> PathBuf {
        self.root.join("baskets")
    }

    pub fn tree_path(&self) -> PathBuf {
        self.baskets_dir().join(TREE_FILE_NAME)
    }

    fn checked_folder<'a>(&self, folder: &'a str) -> StoreResult<&'a str> {
        if FOLDER_NAME_RE.is_match(folder) {
            Ok(folder)
        } else {
            Err(StoreError::InvalidFolderName(folder.to_string()))
        }
    }
}

impl BasketRepository for FsBasketRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load_tree(&self) -> StoreResult<BasketTree> {
        Ok(load_tree_file(&self.tree_path())?)
    }

    fn save_tree(&self, tree: &BasketTree) -> StoreResult<()> {
        save_tree_file(&self.tree_path(), tree)?;
        log::debug!(
            "event=tree_save module=store status=ok baskets={}",
            tree.basket_count()
        );
        Ok(())
    }

    fn load_basket(&self, folder: &str) -> StoreResult<Basket> {
        let folder = self.checked_folder(folder)?;
        let path = self.basket_path(folder).join(BASKET_FILE_NAME);
        if !path.is_file() {
            return Err(StoreError::BasketNotFound(folder.to_string()));
        }
        let defaults = BasketProperties::named(folder);
        Ok(load_basket_file(&path, &defaults)?)
    }

    fn save_basket(&self, folder: &str, basket: &Basket) -> StoreResult<()> {
        let folder = self.checked_folder(folder)?;
        let dir = self.basket_path(folder);
        fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
        save_basket_file(&dir.join(BASKET_FILE_NAME), basket)?;
        Ok(())
    }

    fn new_folder_name(&self) -> StoreResult<String> {
        let baskets = self.baskets_dir();
        let existing = fs::read_dir(&baskets)
            .map_err(|err| StoreError::io(&baskets, err))?
            .count();
        let mut number = existing + 1;
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let name = format!("basket{number}-{}", &suffix[..8]);
            let path = baskets.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok(name),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => number += 1,
                Err(err) => return Err(StoreError::io(&path, err)),
            }
        }
    }

    fn remove_basket_folder(&self, folder: &str) -> StoreResult<()> {
        let folder = self.checked_folder(folder)?;
        let path = self.basket_path(folder);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(&path, err)),
        }
    }

    fn basket_path(&self, folder: &str) -> PathBuf {
        self.baskets_dir().join(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::{BasketRepository, FsBasketRepository, StoreError};
    use crate::model::basket::{Basket, BasketNode, BasketProperties, BasketTree};

    #[test]
    fn new_folder_names_are_unique_and_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsBasketRepository::try_new(dir.path()).unwrap();
        let first = repo.new_folder_name().unwrap();
        let second = repo.new_folder_name().unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("basket1-"));
        assert!(second.starts_with("basket2-"));
        assert!(repo.basket_path(&first).is_dir());
    }

    #[test]
    fn basket_and_tree_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsBasketRepository::try_new(dir.path()).unwrap();
        let folder = repo.new_folder_name().unwrap();
        let basket = Basket::new(BasketProperties::named("Inbox"));
        repo.save_basket(&folder, &basket).unwrap();

        let mut tree = BasketTree::new();
        tree.roots.push(BasketNode::new(folder.clone(), basket.properties.clone()));
        repo.save_tree(&tree).unwrap();

        assert_eq!(repo.load_basket(&folder).unwrap().properties.name, "Inbox");
        assert_eq!(repo.load_tree().unwrap(), tree);
    }

    #[test]
    fn traversal_folder_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsBasketRepository::try_new(dir.path()).unwrap();
        assert!(matches!(
            repo.load_basket("../etc"),
            Err(StoreError::InvalidFolderName(_))
        ));
        assert!(matches!(
            repo.load_basket("missing"),
            Err(StoreError::BasketNotFound(_))
        ));
        repo.remove_basket_folder("missing").unwrap();
    }
}

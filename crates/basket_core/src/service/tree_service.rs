//! Basket tree use-case service.
//!
//! # Responsibility
//! - Validate basket hierarchy invariants above the repository layer.
//! - Provide basket create, rename, move, delete, fold and list operations.
//!
//! # Invariants
//! - Parent basket must exist when provided.
//! - Move operations must not create parent-child cycles.
//! - The tree index is saved before basket folders are removed, so a failed
//!   removal leaves orphan folders rather than dangling entries.

use crate::model::basket::{Basket, BasketNode, BasketProperties, Disposition};
use crate::repo::basket_repo::{BasketRepository, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from basket tree service operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Display name is blank after trim.
    InvalidDisplayName,
    /// Target basket does not exist in the tree.
    BasketNotFound(String),
    /// Parent basket does not exist in the tree.
    ParentNotFound(String),
    /// Move operation would create a cycle.
    CycleDetected { folder: String, parent: String },
    /// Repository-level failure.
    Store(StoreError),
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDisplayName => write!(f, "display name must not be blank"),
            Self::BasketNotFound(folder) => write!(f, "basket not found: {folder}"),
            Self::ParentNotFound(folder) => write!(f, "parent basket not found: {folder}"),
            Self::CycleDetected { folder, parent } => write!(
                f,
                "move would create cycle: basket {folder} under parent {parent}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TreeServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::BasketNotFound(folder) => Self::BasketNotFound(folder),
            other => Self::Store(other),
        }
    }
}

/// Basket tree service facade.
pub struct TreeService<R: BasketRepository> {
    repo: R,
}

impl<R: BasketRepository> TreeService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates an empty basket under optional parent. Returns its tree node.
    pub fn create_basket(
        &self,
        parent: Option<&str>,
        name: impl Into<String>,
        disposition: Disposition,
    ) -> Result<BasketNode, TreeServiceError> {
        let name = normalize_display_name(name.into())?;
        let mut tree = self.repo.load_tree()?;
        if let Some(parent) = parent {
            if tree.find(parent).is_none() {
                return Err(TreeServiceError::ParentNotFound(parent.to_string()));
            }
        }

        let folder = self.repo.new_folder_name()?;
        let properties = BasketProperties {
            disposition,
            ..BasketProperties::named(name)
        };
        let node = BasketNode::new(folder.clone(), properties.clone());
        let result = self
            .repo
            .save_basket(&folder, &Basket::new(properties))
            .and_then(|()| {
                tree.attach(parent, node.clone(), None);
                self.repo.save_tree(&tree)
            });
        if let Err(err) = result {
            if let Err(cleanup) = self.repo.remove_basket_folder(&folder) {
                log::warn!(
                    "event=basket_create_cleanup module=service status=error folder={folder} error={cleanup}"
                );
            }
            log::error!(
                "event=basket_create module=service status=error folder={folder} error={err}"
            );
            return Err(err.into());
        }

        log::info!("event=basket_create module=service status=ok folder={folder}");
        Ok(node)
    }

    /// Lists child baskets under optional parent.
    pub fn list_children(&self, parent: Option<&str>) -> Result<Vec<BasketNode>, TreeServiceError> {
        let tree = self.repo.load_tree()?;
        match parent {
            None => Ok(tree.roots),
            Some(folder) => tree
                .find(folder)
                .map(|node| node.children.clone())
                .ok_or_else(|| TreeServiceError::ParentNotFound(folder.to_string())),
        }
    }

    pub fn find(&self, folder: &str) -> Result<Option<BasketNode>, TreeServiceError> {
        Ok(self.repo.load_tree()?.find(folder).cloned())
    }

    /// Renames one basket in its descriptor and in the tree index.
    pub fn rename_basket(
        &self,
        folder: &str,
        name: impl Into<String>,
    ) -> Result<(), TreeServiceError> {
        let name = normalize_display_name(name.into())?;
        let mut tree = self.repo.load_tree()?;
        let node = tree
            .find_mut(folder)
            .ok_or_else(|| TreeServiceError::BasketNotFound(folder.to_string()))?;

        let mut basket = self.repo.load_basket(folder)?;
        basket.properties.name = name.clone();
        self.repo.save_basket(folder, &basket)?;
        node.properties.name = name;
        self.repo.save_tree(&tree)?;
        Ok(())
    }

    /// Moves one basket under optional parent and optional sibling index.
    pub fn move_basket(
        &self,
        folder: &str,
        new_parent: Option<&str>,
        index: Option<usize>,
    ) -> Result<(), TreeServiceError> {
        let mut tree = self.repo.load_tree()?;
        let node = tree
            .find(folder)
            .ok_or_else(|| TreeServiceError::BasketNotFound(folder.to_string()))?;

        if let Some(parent) = new_parent {
            if node.folder_names().iter().any(|name| name == parent) {
                return Err(TreeServiceError::CycleDetected {
                    folder: folder.to_string(),
                    parent: parent.to_string(),
                });
            }
            if tree.find(parent).is_none() {
                return Err(TreeServiceError::ParentNotFound(parent.to_string()));
            }
        }

        let node = tree
            .detach(folder)
            .ok_or_else(|| TreeServiceError::BasketNotFound(folder.to_string()))?;
        if !tree.attach(new_parent, node, index) {
            return Err(TreeServiceError::ParentNotFound(
                new_parent.unwrap_or_default().to_string(),
            ));
        }
        self.repo.save_tree(&tree)?;
        Ok(())
    }

    /// Deletes a basket with its child baskets. Returns removed folder names.
    pub fn delete_basket(&self, folder: &str) -> Result<Vec<String>, TreeServiceError> {
        let mut tree = self.repo.load_tree()?;
        let node = tree
            .detach(folder)
            .ok_or_else(|| TreeServiceError::BasketNotFound(folder.to_string()))?;
        self.repo.save_tree(&tree)?;

        let removed = node.folder_names();
        for name in &removed {
            self.repo.remove_basket_folder(name)?;
        }
        log::info!(
            "event=basket_delete module=service status=ok folder={folder} removed={}",
            removed.len()
        );
        Ok(removed)
    }

    pub fn set_folded(&self, folder: &str, folded: bool) -> Result<(), TreeServiceError> {
        let mut tree = self.repo.load_tree()?;
        tree.find_mut(folder)
            .ok_or_else(|| TreeServiceError::BasketNotFound(folder.to_string()))?
            .folded = folded;
        self.repo.save_tree(&tree)?;
        Ok(())
    }
}

fn normalize_display_name(value: String) -> Result<String, TreeServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeServiceError::InvalidDisplayName);
    }
    Ok(trimmed.to_string())
}

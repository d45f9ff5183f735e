//! Tag deletion use cases.
//!
//! # Responsibility
//! - Remove a tag or one of its states from the registry and from every
//!   note of every basket in the store.
//!
//! # Invariants
//! - Baskets are rewritten before `tags.xml`; the registry in the context
//!   changes only after both were saved.
//! - Baskets that do not reference a removed state are not rewritten.

use crate::context::tags::TagError;
use crate::context::AppContext;
use crate::repo::basket_repo::{BasketRepository, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from tag service operations.
#[derive(Debug)]
pub enum TagServiceError {
    Tag(TagError),
    Store(StoreError),
}

impl Display for TagServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TagServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tag(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<TagError> for TagServiceError {
    fn from(value: TagError) -> Self {
        Self::Tag(value)
    }
}

impl From<StoreError> for TagServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// What a deletion touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRemoval {
    /// State ids removed from the registry.
    pub states: Vec<String>,
    /// Folders of the baskets that were rewritten.
    pub baskets: Vec<String>,
    /// Number of state references dropped from notes.
    pub notes: usize,
}

/// Tag service facade.
pub struct TagService<R: BasketRepository> {
    repo: R,
}

impl<R: BasketRepository> TagService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Deletes a tag with all its states.
    pub fn delete_tag(
        &self,
        ctx: &mut AppContext,
        name: &str,
    ) -> Result<TagRemoval, TagServiceError> {
        let mut registry = ctx.tags.clone();
        let states = registry.remove_tag(name)?;
        let removal = self.cascade(states)?;
        registry.save(&self.repo.tags_path())?;
        ctx.tags = registry;
        log::info!(
            "event=tag_delete module=service status=ok states={} baskets={}",
            removal.states.len(),
            removal.baskets.len()
        );
        Ok(removal)
    }

    /// Deletes one state. A tag left without states goes with it.
    pub fn delete_state(
        &self,
        ctx: &mut AppContext,
        state_id: &str,
    ) -> Result<TagRemoval, TagServiceError> {
        let mut registry = ctx.tags.clone();
        let states = registry.remove_state(state_id)?;
        let removal = self.cascade(states)?;
        registry.save(&self.repo.tags_path())?;
        ctx.tags = registry;
        log::info!(
            "event=tag_state_delete module=service status=ok baskets={}",
            removal.baskets.len()
        );
        Ok(removal)
    }

    /// Drops `states` from every note of every basket.
    fn cascade(&self, states: Vec<String>) -> Result<TagRemoval, TagServiceError> {
        let mut removal = TagRemoval {
            states,
            ..TagRemoval::default()
        };
        for folder in self.repo.load_tree()?.folder_names() {
            let mut basket = self.repo.load_basket(&folder)?;
            let dropped: usize = removal
                .states
                .iter()
                .map(|id| basket.notes.remove_state(id))
                .sum();
            if dropped == 0 {
                continue;
            }
            if let Err(err) = self.repo.save_basket(&folder, &basket) {
                log::error!(
                    "event=tag_delete module=service status=error folder={folder} error={err}"
                );
                return Err(err.into());
            }
            removal.notes += dropped;
            removal.baskets.push(folder);
        }
        Ok(removal)
    }
}

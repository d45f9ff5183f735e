//! Application context shared by services.
//!
//! # Responsibility
//! - Own the tag registry and the background cache of one store root.
//! - Replace process-wide singletons with one explicit value.
//!
//! # See also
//! - `crate::service::archive_service` for the main consumer.

pub mod backgrounds;
pub mod tags;

use crate::repo::basket_repo::BasketRepository;
use backgrounds::BackgroundCache;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use tags::{TagError, TagRegistry};

/// Errors while loading an application context.
#[derive(Debug)]
pub enum ContextError {
    Tags(TagError),
    Backgrounds { path: PathBuf, source: io::Error },
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tags(err) => write!(f, "{err}"),
            Self::Backgrounds { path, source } => {
                write!(f, "cannot scan backgrounds at {}: {source}", path.display())
            }
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tags(err) => Some(err),
            Self::Backgrounds { source, .. } => Some(source),
        }
    }
}

impl From<TagError> for ContextError {
    fn from(value: TagError) -> Self {
        Self::Tags(value)
    }
}

/// Tag registry + background cache for one store root.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub tags: TagRegistry,
    pub backgrounds: BackgroundCache,
}

impl AppContext {
    pub fn new(tags: TagRegistry, backgrounds: BackgroundCache) -> Self {
        Self { tags, backgrounds }
    }

    /// Loads the store's `tags.xml` and scans its `backgrounds/`.
    pub fn load<R: BasketRepository>(repo: &R) -> Result<Self, ContextError> {
        let tags = TagRegistry::load(&repo.tags_path())?;
        let dir = repo.backgrounds_dir();
        let backgrounds = BackgroundCache::scan(&dir)
            .map_err(|source| ContextError::Backgrounds { path: dir, source })?;
        Ok(Self { tags, backgrounds })
    }
}

//! XML codecs for basket descriptors, the basket tree index and tags.
//!
//! # Responsibility
//! - Map the persisted XML schema to the domain model and back.
//! - Degrade gracefully on partial or hand-edited files: missing optional
//!   values fall back to defaults, unknown elements are ignored.
//!
//! # See also
//! - `crate::model`

pub mod basket_file;
pub mod document;
pub mod tags_file;
pub mod tree_index;

use crate::model::note::NoteTreeError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Errors from reading or writing XML documents.
#[derive(Debug)]
pub enum XmlError {
    /// File could not be read or written.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Document is not well-formed.
    Malformed { position: u64, message: String },
    /// Document has no root element.
    MissingRoot,
    /// Root element has an unexpected name.
    UnexpectedRoot { expected: String, found: String },
    /// Note elements could not be placed in the note tree.
    InvalidTree(NoteTreeError),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "xml io error at {}: {source}", path.display()),
            Self::Malformed { position, message } => {
                write!(f, "malformed xml at byte {position}: {message}")
            }
            Self::MissingRoot => write!(f, "xml document has no root element"),
            Self::UnexpectedRoot { expected, found } => {
                write!(f, "expected root element `{expected}`, found `{found}`")
            }
            Self::InvalidTree(err) => write!(f, "invalid note tree: {err}"),
        }
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidTree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteTreeError> for XmlError {
    fn from(value: NoteTreeError) -> Self {
        Self::InvalidTree(value)
    }
}

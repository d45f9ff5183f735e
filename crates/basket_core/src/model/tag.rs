//! Tags and tag states.
//!
//! # Responsibility
//! - Describe user-defined tags and the visual/textual states they own.
//!
//! # Invariants
//! - State ids are unique across every tag of one registry.
//! - A tag owns at least one state once it has been loaded or created.

use serde::{Deserialize, Serialize};

/// One visual/textual variant of a tag. Notes reference states by `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    pub name: String,
    /// Emblem icon name or path; empty for none.
    pub emblem: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike_out: bool,
    pub text_color: Option<String>,
    pub font_name: String,
    /// Point size; `None` keeps the basket font size.
    pub font_size: Option<u32>,
    pub background_color: Option<String>,
    /// Text prefix used when exporting notes as plain text.
    pub text_equivalent: String,
    pub on_all_text_lines: bool,
    pub allow_cross_references: bool,
}

impl State {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            allow_cross_references: true,
            ..Self::default()
        }
    }

    /// Same look and text as `other`, ignoring ids.
    pub fn is_similar(&self, other: &State) -> bool {
        let mut left = self.clone();
        left.id.clear();
        let mut right = other.clone();
        right.id.clear();
        left == right
    }
}

/// A named, shortcut-able label owning ordered states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub shortcut: String,
    /// Whether new sibling notes inherit this tag.
    pub inherited_by_siblings: bool,
    pub states: Vec<State>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn state_ids(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|state| state.id.as_str())
    }

    /// Same name and pairwise similar states.
    pub fn is_similar(&self, other: &Tag) -> bool {
        self.name == other.name
            && self.states.len() == other.states.len()
            && self
                .states
                .iter()
                .zip(&other.states)
                .all(|(left, right)| left.is_similar(right))
    }
}

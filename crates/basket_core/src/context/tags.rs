//! Tag registry.
//!
//! # Responsibility
//! - Own the loaded tags and answer state lookups by id.
//! - Merge tags imported from an archive into the local set.
//!
//! # Invariants
//! - State ids are unique across all registered tags.
//! - Removal returns the removed state ids; `TagService` cascades them
//!   through every note tree of the store.

use crate::model::tag::{State, Tag};
use crate::xml::tags_file::{load_tags_file, save_tags_file, TagsDocument};
use crate::xml::XmlError;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Imported state id -> local state id, for ids that changed on merge.
pub type MergedStates = HashMap<String, String>;

/// Errors from tag registry operations.
#[derive(Debug)]
pub enum TagError {
    Xml(XmlError),
    /// Tag has no state.
    EmptyTag(String),
    /// State id already used by another state.
    DuplicateStateId(String),
    TagNotFound(String),
    StateNotFound(String),
}

impl Display for TagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(err) => write!(f, "{err}"),
            Self::EmptyTag(name) => write!(f, "tag has no state: {name}"),
            Self::DuplicateStateId(id) => write!(f, "duplicate tag state id: {id}"),
            Self::TagNotFound(name) => write!(f, "tag not found: {name}"),
            Self::StateNotFound(id) => write!(f, "tag state not found: {id}"),
        }
    }
}

impl Error for TagError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<XmlError> for TagError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

/// Registered tags and the state id counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRegistry {
    tags: Vec<Tag>,
    next_state_uid: u64,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            next_state_uid: 1,
        }
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `tags.xml`; a missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self, TagError> {
        let document = load_tags_file(path)?;
        let mut registry = Self {
            tags: Vec::new(),
            next_state_uid: document.next_state_uid.max(1),
        };
        for tag in document.tags {
            registry.add_tag(tag)?;
        }
        log::debug!(
            "event=tags_load module=context status=ok tags={}",
            registry.tags.len()
        );
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<(), TagError> {
        save_tags_file(path, &self.document())?;
        Ok(())
    }

    /// Snapshot of the registry as a tags document.
    pub fn document(&self) -> TagsDocument {
        TagsDocument {
            next_state_uid: self.next_state_uid,
            tags: self.tags.clone(),
        }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn state_for_id(&self, id: &str) -> Option<&State> {
        self.tags.iter().find_map(|tag| tag.state(id))
    }

    pub fn tag_for_state(&self, id: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.state(id).is_some())
    }

    /// Allocates a fresh `tag_state_<n>` id.
    pub fn next_state_id(&mut self) -> String {
        loop {
            let id = format!("tag_state_{}", self.next_state_uid);
            self.next_state_uid += 1;
            if self.state_for_id(&id).is_none() {
                return id;
            }
        }
    }

    /// Registers a tag. States with an empty id get a fresh one.
    pub fn add_tag(&mut self, mut tag: Tag) -> Result<(), TagError> {
        if tag.states.is_empty() {
            return Err(TagError::EmptyTag(tag.name));
        }
        let mut seen = HashSet::new();
        for state in &mut tag.states {
            if state.id.is_empty() {
                state.id = self.next_state_id();
            }
            if !seen.insert(state.id.clone()) || self.state_for_id(&state.id).is_some() {
                return Err(TagError::DuplicateStateId(state.id.clone()));
            }
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Removes a tag by name. Returns its state ids.
    pub fn remove_tag(&mut self, name: &str) -> Result<Vec<String>, TagError> {
        let index = self
            .tags
            .iter()
            .position(|tag| tag.name == name)
            .ok_or_else(|| TagError::TagNotFound(name.to_string()))?;
        let tag = self.tags.remove(index);
        Ok(tag.states.into_iter().map(|state| state.id).collect())
    }

    /// Removes one state. A tag left without states is removed as well.
    pub fn remove_state(&mut self, id: &str) -> Result<Vec<String>, TagError> {
        let tag_index = self
            .tags
            .iter()
            .position(|tag| tag.state(id).is_some())
            .ok_or_else(|| TagError::StateNotFound(id.to_string()))?;
        let tag = &mut self.tags[tag_index];
        tag.states.retain(|state| state.id != id);
        if tag.states.is_empty() {
            self.tags.remove(tag_index);
        }
        Ok(vec![id.to_string()])
    }

    /// Merges imported tags.
    ///
    /// A tag similar to a local one (same name, same states) reuses the
    /// local state ids. Other tags are added; any colliding state id gets a
    /// fresh `tag_state_<n>` id.
    pub fn merge(&mut self, imported: Vec<Tag>) -> MergedStates {
        let mut merged = MergedStates::new();
        for mut tag in imported {
            if let Some(local) = self.tags.iter().find(|local| local.is_similar(&tag)) {
                for (theirs, ours) in tag.states.iter().zip(&local.states) {
                    if theirs.id != ours.id {
                        merged.insert(theirs.id.clone(), ours.id.clone());
                    }
                }
                continue;
            }
            let mut seen = HashSet::new();
            for state in &mut tag.states {
                if state.id.is_empty()
                    || self.state_for_id(&state.id).is_some()
                    || !seen.insert(state.id.clone())
                {
                    let fresh = self.next_state_id();
                    if !state.id.is_empty() {
                        merged.insert(state.id.clone(), fresh.clone());
                    }
                    seen.insert(fresh.clone());
                    state.id = fresh;
                }
            }
            self.tags.push(tag);
        }
        log::info!(
            "event=tags_merge module=context status=ok renamed_states={}",
            merged.len()
        );
        merged
    }

    /// Tags owning at least one of `state_ids`, in registry order.
    pub fn used_tags(&self, state_ids: &[String]) -> Vec<Tag> {
        let used: HashSet<&str> = state_ids.iter().map(String::as_str).collect();
        self.tags
            .iter()
            .filter(|tag| tag.state_ids().any(|id| used.contains(id)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{TagError, TagRegistry};
    use crate::model::tag::{State, Tag};

    fn tag(name: &str, ids: &[&str]) -> Tag {
        let mut tag = Tag::new(name);
        for id in ids {
            tag.states.push(State::new(*id, format!("{name} {id}")));
        }
        tag
    }

    #[test]
    fn similar_tags_map_to_local_ids() {
        let mut registry = TagRegistry::new();
        registry.add_tag(tag("Todo", &["todo_a"])).unwrap();

        let mut imported = tag("Todo", &["other_id"]);
        imported.states[0].name = "Todo todo_a".to_string();
        let merged = registry.merge(vec![imported]);

        assert_eq!(registry.tags().len(), 1);
        assert_eq!(merged.get("other_id").map(String::as_str), Some("todo_a"));
    }

    #[test]
    fn colliding_ids_get_fresh_state_ids() {
        let mut registry = TagRegistry::new();
        registry.add_tag(tag("Work", &["s1"])).unwrap();

        let merged = registry.merge(vec![tag("Home", &["s1", "s2"])]);
        let fresh = merged.get("s1").unwrap();
        assert!(fresh.starts_with("tag_state_"));
        assert!(!merged.contains_key("s2"));
        assert_eq!(registry.tag_for_state(fresh).unwrap().name, "Home");
        assert_eq!(registry.tag_for_state("s1").unwrap().name, "Work");
    }

    #[test]
    fn removal_reports_cascaded_state_ids() {
        let mut registry = TagRegistry::new();
        registry.add_tag(tag("Work", &["s1", "s2"])).unwrap();
        assert!(matches!(
            registry.add_tag(tag("Dup", &["s2"])),
            Err(TagError::DuplicateStateId(_))
        ));

        assert_eq!(registry.remove_state("s1").unwrap(), vec!["s1"]);
        assert_eq!(registry.remove_state("s2").unwrap(), vec!["s2"]);
        assert!(registry.tags().is_empty());
        assert!(matches!(
            registry.remove_tag("Work"),
            Err(TagError::TagNotFound(_))
        ));
    }

    #[test]
    fn used_tags_keep_whole_tags() {
        let mut registry = TagRegistry::new();
        registry.add_tag(tag("Work", &["s1", "s2"])).unwrap();
        registry.add_tag(tag("Home", &["s3"])).unwrap();
        let used = registry.used_tags(&["s2".to_string()]);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].states.len(), 2);
    }
}
